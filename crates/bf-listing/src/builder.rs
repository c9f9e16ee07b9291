//! Accumulates discovered object names into a [`FileListing`].

use std::io::Write;

use anyhow::Context;
use bf_error::{BfError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use regex::Regex;

use crate::listing::{Entry, FileListing};

/// Builder for a [`FileListing`].
///
/// Names are filtered through an optional pattern, capped by a total count
/// limit, and appended to a growing compressed stream as 4-byte big-endian
/// length prefixes followed by the UTF-8 bytes. [`build`](Self::build)
/// finalizes the stream and partitions the accumulated entries into tasks.
///
/// The builder is single-producer: one enumeration loop drives sequential
/// [`add`](Self::add) calls, and `build` consumes the builder, handing the
/// immutable snapshot off to readers. Callers that scan from several tasks
/// concurrently must serialize access themselves.
///
/// The enumeration loop feeding the builder is expected to skip zero-size
/// objects (storage "directory marker" placeholders); the builder itself
/// does not special-case size 0.
pub struct ListingBuilder {
    encoder: GzEncoder<Vec<u8>>,
    entries: Vec<Entry>,
    last: Option<String>,
    pattern: Option<Regex>,
    limit: usize,
    min_task_size: u64,
}

impl Default for ListingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingBuilder {
    /// Creates a builder that accepts every name, with no count limit and
    /// one task per entry.
    pub fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            entries: Vec::new(),
            last: None,
            pattern: None,
            limit: usize::MAX,
            min_task_size: 0,
        }
    }

    /// Set the path-match pattern.
    ///
    /// The pattern is a regular expression tested against each candidate
    /// name with substring-search semantics (an unanchored find, not a
    /// full match). Invalid patterns are configuration errors.
    pub fn with_path_match_pattern(mut self, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern)
            .map_err(|e| BfError::config(format!("invalid path_match_pattern '{pattern}': {e}")))?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Set the maximum number of entries to accept.
    pub fn with_total_file_count_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the cumulative-size threshold that closes a task.
    ///
    /// With the default of 0, every entry becomes its own task.
    pub fn with_min_task_size(mut self, bytes: u64) -> Self {
        self.min_task_size = bytes;
        self
    }

    /// Number of entries accepted so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries have been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True while the accepted-entry count is below the limit.
    ///
    /// Enumeration loops use this to short-circuit further remote
    /// pagination once the listing is full.
    pub fn needs_more(&self) -> bool {
        self.entries.len() < self.limit
    }

    /// Offers a discovered name to the listing.
    ///
    /// Returns false, leaving the listing unchanged, when the count limit
    /// is already reached or the name fails the pattern test. Otherwise
    /// the name is assigned the next index, appended to the compressed
    /// stream, and remembered as the running resume cursor.
    pub fn add(&mut self, path: &str, size: u64) -> Result<bool> {
        if !self.needs_more() {
            return Ok(false);
        }

        if let Some(pattern) = &self.pattern
            && !pattern.is_match(path)
        {
            return Ok(false);
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry { index, size });

        let bytes = path.as_bytes();
        self.encoder
            .write_all(&(bytes.len() as u32).to_be_bytes())
            .and_then(|_| self.encoder.write_all(bytes))
            .context("writing name record to listing stream")?;

        self.last = Some(path.to_string());
        Ok(true)
    }

    /// Finalizes the compressed stream and partitions the entries.
    pub fn build(self) -> Result<FileListing> {
        let data = self
            .encoder
            .finish()
            .context("finalizing listing stream")?;

        Ok(FileListing {
            data,
            tasks: split_tasks(&self.entries, self.min_task_size),
            last: self.last,
        })
    }
}

/// Groups entries into contiguous runs of at least `min_task_size`
/// cumulative bytes.
///
/// A run closes as soon as the threshold is met; the final run closes
/// regardless of size when input is exhausted, so it may be smaller than
/// the threshold.
fn split_tasks(all: &[Entry], min_task_size: u64) -> Vec<Vec<Entry>> {
    let mut tasks = Vec::new();
    let mut current = Vec::new();
    let mut current_size = 0u64;

    for entry in all {
        current.push(*entry);
        current_size += entry.size;
        if current_size >= min_task_size {
            tasks.push(std::mem::take(&mut current));
            current_size = 0;
        }
    }
    if !current.is_empty() {
        tasks.push(current);
    }
    tasks
}
