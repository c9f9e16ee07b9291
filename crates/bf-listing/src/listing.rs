//! Listing data model and persisted form.

use serde::{Deserialize, Serialize};

use crate::reader::TaskReader;

/// One discovered object's position and size within a listing.
///
/// `index` is the 0-based position in discovery order; indices within one
/// listing are contiguous and strictly increasing. `size` is the object's
/// byte length at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// 0-based position in discovery order
    pub index: u32,

    /// Size of the object in bytes
    pub size: u64,
}

/// The finalized, immutable result of a bucket scan.
///
/// Holds a gzip-compressed blob of length-prefixed UTF-8 object names in
/// discovery order, the partitioning of the entries into tasks, and the
/// last accepted name (the resume cursor for the next incremental scan).
///
/// Concatenating the entry runs across all tasks reproduces the full
/// discovery order with no gaps or duplicates. Produced exactly once by
/// [`ListingBuilder::build`](crate::ListingBuilder::build) and read-only
/// afterwards, so it is safe to share across workers; each worker opens
/// its own [`TaskReader`] cursor.
///
/// The serialized field names (`data`, `tasks`, `last`) are a stable
/// contract for saved job state handed back to the orchestrating
/// framework between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListing {
    pub(crate) data: Vec<u8>,
    pub(crate) tasks: Vec<Vec<Entry>>,
    pub(crate) last: Option<String>,
}

impl FileListing {
    /// Number of tasks the entries were partitioned into.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Total number of entries across all tasks.
    pub fn len(&self) -> usize {
        self.tasks.iter().map(|t| t.len()).sum()
    }

    /// True when the listing accepted no entries.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The entry runs, one per task, in discovery order.
    pub fn tasks(&self) -> &[Vec<Entry>] {
        &self.tasks
    }

    /// Opens a reader over one task's names.
    ///
    /// Returns `None` when `index` is out of range. Each call returns a
    /// fresh cursor; cursors hold private decompression state and are not
    /// shareable.
    pub fn task(&self, index: usize) -> Option<TaskReader<'_>> {
        let entries = self.tasks.get(index)?;
        Some(TaskReader::new(&self.data, entries))
    }

    /// The resume cursor for the next incremental scan.
    ///
    /// Returns the last accepted name, falling back to `previous` (the
    /// prior run's cursor) when this scan accepted nothing.
    pub fn last_path(&self, previous: Option<&str>) -> Option<String> {
        self.last
            .clone()
            .or_else(|| previous.map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListingBuilder;

    #[test]
    fn test_entry_serialization() {
        let entry = Entry { index: 3, size: 1024 };

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"index":3,"size":1024}"#);

        let parsed: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_listing_persisted_field_names() {
        let mut builder = ListingBuilder::new();
        builder.add("logs/a.csv", 10).unwrap();
        let listing = builder.build().unwrap();

        let json = serde_json::to_value(&listing).unwrap();
        assert!(json.get("data").is_some());
        assert!(json.get("tasks").is_some());
        assert_eq!(json.get("last").unwrap(), "logs/a.csv");
    }

    #[test]
    fn test_listing_roundtrip_through_json() {
        let mut builder = ListingBuilder::new();
        builder.add("a/1.csv", 100).unwrap();
        builder.add("a/2.csv", 50).unwrap();
        let listing = builder.build().unwrap();

        let json = serde_json::to_string(&listing).unwrap();
        let restored: FileListing = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.task_count(), listing.task_count());
        assert_eq!(restored.last_path(None), Some("a/2.csv".to_string()));

        let mut names = Vec::new();
        for i in 0..restored.task_count() {
            names.extend(restored.task(i).unwrap().to_vec().unwrap());
        }
        assert_eq!(names, vec!["a/1.csv", "a/2.csv"]);
    }

    #[test]
    fn test_last_path_falls_back_to_previous() {
        let empty = ListingBuilder::new().build().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.last_path(None), None);
        assert_eq!(
            empty.last_path(Some("prior/run.csv")),
            Some("prior/run.csv".to_string())
        );

        let mut builder = ListingBuilder::new();
        builder.add("new.csv", 1).unwrap();
        let listing = builder.build().unwrap();
        assert_eq!(
            listing.last_path(Some("prior/run.csv")),
            Some("new.csv".to_string())
        );
    }

    #[test]
    fn test_task_out_of_range() {
        let listing = ListingBuilder::new().build().unwrap();
        assert!(listing.task(0).is_none());
    }
}
