//! Remote-store access for bucketflow: discovery, cursors and streaming.
//!
//! This crate provides the S3-facing half of the pipeline:
//! - Client configuration with LocalStack support ([`ClientConfig`],
//!   [`create_client`])
//! - Paginated, retried object scanning that feeds a listing builder
//!   ([`scan_objects`], [`list_files`])
//! - Pagination cursor tokens derived from the last accepted name
//!   ([`cursor::page_token`])
//! - Per-task byte streaming with transparent reopen-at-offset recovery
//!   ([`ObjectStreamProvider`], [`ResumableReader`])
//!
//! Every remote call goes through `bf-retry`'s policy; error
//! classification lives in `bf-error` and stays free of SDK types thanks
//! to the mapping in this crate.

mod client;
pub mod cursor;
mod discover;
mod provider;
mod resume;
mod sdk;

pub use client::{ClientConfig, create_client};
pub use discover::{DiscoveredObject, DiscoveryConfig, list_files, scan_objects};
pub use provider::{ObjectStreamProvider, OpenedObject};
pub use resume::{ByteReader, Reopen, ResumableReader, S3Reopener};
