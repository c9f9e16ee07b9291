//! Pagination cursor tokens.
//!
//! A scan resumes from a previous run's last accepted name by handing the
//! store a page-continuation token derived from that name: a fixed tag
//! byte, the name's UTF-8 byte length as a base-128 varint, the raw UTF-8
//! bytes, all base64-encoded for transport.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bf_error::{BfError, Result};

/// Tag byte opening every cursor record.
const CURSOR_TAG: u8 = 0x0a;

/// Maximum object-name length the store accepts, in UTF-8 bytes.
pub const MAX_NAME_BYTES: usize = 1024;

/// Encodes a page-continuation token from the last accepted name.
///
/// Names longer than [`MAX_NAME_BYTES`] cannot name a real object and are
/// rejected as configuration errors before encoding.
pub fn page_token(name: &str) -> Result<String> {
    let utf8 = name.as_bytes();
    if utf8.len() > MAX_NAME_BYTES {
        return Err(BfError::config(format!(
            "last_path '{name}' is too long to encode, maximum allowed is {MAX_NAME_BYTES} bytes"
        )));
    }

    let mut record = Vec::with_capacity(1 + 2 + utf8.len());
    record.push(CURSOR_TAG);
    encode_varint(utf8.len() as u32, &mut record);
    record.extend_from_slice(utf8);

    Ok(STANDARD.encode(record))
}

/// Base-128 varint: low 7 bits per byte, continuation bit set on all but
/// the final byte.
fn encode_varint(mut value: u32, out: &mut Vec<u8>) {
    loop {
        let bits = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            out.push(bits | 0x80);
        } else {
            out.push(bits);
            break;
        }
    }
}
