//! On-demand name materialization from the compressed listing blob.

use std::io::Read;

use bf_error::{BfError, Result};
use flate2::read::GzDecoder;

use crate::listing::Entry;

/// Cursor over one task's names within a shared listing blob.
///
/// Decoding is forward-biased: fetching names in increasing index order
/// advances a sequential decompression cursor, which is the common case
/// since tasks are read in discovery order. Requesting an index behind the
/// cursor rewinds to the start of the blob and scans forward again, which
/// is correct but costly.
///
/// The cursor holds private decompression state; workers must not share
/// one reader. Open a fresh reader per task via
/// [`FileListing::task`](crate::FileListing::task).
pub struct TaskReader<'a> {
    data: &'a [u8],
    entries: &'a [Entry],
    decoder: GzDecoder<&'a [u8]>,
    position: u32,
    rewinds: u32,
}

impl<'a> TaskReader<'a> {
    pub(crate) fn new(data: &'a [u8], entries: &'a [Entry]) -> Self {
        Self {
            data,
            entries,
            decoder: GzDecoder::new(data),
            position: 0,
            rewinds: 0,
        }
    }

    /// Number of entries in this task.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the task holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The task's entries, in discovery order.
    pub fn entries(&self) -> &[Entry] {
        self.entries
    }

    /// Number of times the cursor restarted from the head of the blob.
    pub fn rewind_count(&self) -> u32 {
        self.rewinds
    }

    /// Returns the name of the `i`-th entry of this task.
    ///
    /// Rewinds first when the entry's index precedes the cursor, then
    /// skips records until the cursor reaches it.
    pub fn get(&mut self, i: usize) -> Result<String> {
        let entry = self.entries.get(i).copied().ok_or_else(|| {
            BfError::config(format!(
                "entry {i} out of range for task of {} entries",
                self.entries.len()
            ))
        })?;

        if entry.index < self.position {
            self.decoder = GzDecoder::new(self.data);
            self.position = 0;
            self.rewinds += 1;
        }

        while self.position < entry.index {
            self.read_raw()?;
        }
        // now the cursor sits on the requested record
        let raw = self.read_raw()?;
        String::from_utf8(raw).map_err(|e| {
            BfError::Corrupt(format!(
                "listing record at index {} is not valid UTF-8: {e}",
                entry.index
            ))
        })
    }

    /// Materializes all of this task's names, in order.
    pub fn to_vec(&mut self) -> Result<Vec<String>> {
        (0..self.entries.len()).map(|i| self.get(i)).collect()
    }

    fn read_raw(&mut self) -> Result<Vec<u8>> {
        let mut prefix = [0u8; 4];
        self.decoder.read_exact(&mut prefix).map_err(|e| {
            BfError::Corrupt(format!(
                "unexpected end of listing blob reading length prefix at record {}: {e}",
                self.position
            ))
        })?;

        let len = u32::from_be_bytes(prefix) as usize;
        let mut record = vec![0u8; len];
        self.decoder.read_exact(&mut record).map_err(|e| {
            BfError::Corrupt(format!(
                "unexpected end of listing blob, record {} declared {len} bytes: {e}",
                self.position
            ))
        })?;

        self.position += 1;
        Ok(record)
    }
}
