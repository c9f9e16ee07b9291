//! Paginated object discovery feeding the listing builder.

use async_stream::try_stream;
use aws_sdk_s3::Client;
use bf_error::{BfError, Result};
use bf_listing::{FileListing, ListingBuilder};
use bf_retry::{RetryConfig, with_retry};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use tracing::debug;

use crate::cursor;
use crate::sdk::storage_error;

/// An object discovered during a bucket scan.
#[derive(Debug, Clone)]
pub struct DiscoveredObject {
    /// The object key (full path within the bucket)
    pub key: String,

    /// Size of the object in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,
}

/// Configuration for one discovery run.
///
/// One flat struct with documented defaults; validation happens in the
/// functions that consume it, not in inherited contracts.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Bucket to scan
    pub bucket: String,

    /// Optional key prefix narrowing the scan
    pub prefix: Option<String>,

    /// Last name accepted by the previous run; the scan resumes from the
    /// following page
    pub last_path: Option<String>,

    /// Regular expression tested against each key with substring-search
    /// semantics (default: match everything)
    pub path_match_pattern: String,

    /// Cap on accepted entries (default: effectively unbounded)
    pub total_file_count_limit: usize,

    /// Cumulative-size threshold closing a task (default 0: one task per
    /// entry)
    pub min_task_size: u64,

    /// Retry tunables applied to every page fetch
    pub retry: RetryConfig,
}

impl DiscoveryConfig {
    /// Create a configuration for the given bucket, with defaults for
    /// everything else.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            last_path: None,
            path_match_pattern: ".*".to_string(),
            total_file_count_limit: usize::MAX,
            min_task_size: 0,
            retry: RetryConfig::default(),
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the resume cursor from a previous run.
    pub fn with_last_path(mut self, last_path: impl Into<String>) -> Self {
        self.last_path = Some(last_path.into());
        self
    }

    /// Set the path-match pattern.
    pub fn with_path_match_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_match_pattern = pattern.into();
        self
    }

    /// Set the accepted-entry cap.
    pub fn with_total_file_count_limit(mut self, limit: usize) -> Self {
        self.total_file_count_limit = limit;
        self
    }

    /// Set the task size threshold.
    pub fn with_min_task_size(mut self, bytes: u64) -> Self {
        self.min_task_size = bytes;
        self
    }

    /// Set the retry tunables.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Scan objects under a bucket/prefix as a stream, handling pagination.
///
/// Each page fetch goes through the retry policy. Directory markers (keys
/// ending with `/`) and zero-size placeholder objects are skipped; they
/// are not data files.
///
/// Dropping the stream stops the pagination, which is how consumers
/// short-circuit once their listing is full.
pub fn scan_objects(
    client: Client,
    bucket: String,
    prefix: Option<String>,
    start_token: Option<String>,
    retry: RetryConfig,
) -> impl Stream<Item = Result<DiscoveredObject>> {
    try_stream! {
        let mut continuation_token = start_token;

        loop {
            let mut req = client.list_objects_v2().bucket(&bucket);

            if let Some(ref prefix) = prefix {
                req = req.prefix(prefix);
            }

            if let Some(ref token) = continuation_token {
                req = req.continuation_token(token);
            }

            let operation = format!("list s3://{bucket}");
            let resp = with_retry(&retry, &operation, || {
                let req = req.clone();
                async move { req.send().await.map_err(storage_error) }
            })
            .await?;

            for obj in resp.contents() {
                let key = obj.key().unwrap_or_default();

                if key.is_empty() || key.ends_with('/') {
                    continue;
                }

                let size = obj.size().unwrap_or(0);
                if size <= 0 {
                    debug!(key, "skipping zero-size object");
                    continue;
                }

                let last_modified = obj
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));

                yield DiscoveredObject {
                    key: key.to_string(),
                    size: size as u64,
                    last_modified,
                };
            }

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(String::from);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
    }
}

/// Runs a discovery pass and builds the listing.
///
/// Derives the start token from `last_path`, pages through the bucket,
/// feeds matching names to a [`ListingBuilder`], and stops paginating as
/// soon as the entry cap is reached. Fatal listing failures surface as
/// configuration errors naming the bucket, prefix and cursor.
pub async fn list_files(client: &Client, config: &DiscoveryConfig) -> Result<FileListing> {
    let start_token = match &config.last_path {
        Some(path) => Some(cursor::page_token(path)?),
        None => None,
    };

    let mut builder = ListingBuilder::new()
        .with_path_match_pattern(&config.path_match_pattern)?
        .with_total_file_count_limit(config.total_file_count_limit)
        .with_min_task_size(config.min_task_size);

    debug!(
        bucket = %config.bucket,
        prefix = ?config.prefix,
        last_path = ?config.last_path,
        "starting bucket scan"
    );

    let stream = scan_objects(
        client.clone(),
        config.bucket.clone(),
        config.prefix.clone(),
        start_token,
        config.retry.clone(),
    );
    pin_mut!(stream);

    let mut accepted = 0u64;
    let mut filtered = 0u64;

    while let Some(result) = stream.next().await {
        let obj = match result {
            Ok(obj) => obj,
            Err(e @ BfError::Config { .. }) => {
                return Err(BfError::config_with(
                    format!(
                        "files listing failed: bucket:{}, prefix:{:?}, last_path:{:?}",
                        config.bucket, config.prefix, config.last_path
                    ),
                    e,
                ));
            }
            Err(e) => return Err(e),
        };

        if builder.add(&obj.key, obj.size)? {
            accepted += 1;
            debug!(
                key = %obj.key,
                size = obj.size,
                updated = ?obj.last_modified,
                "discovered object"
            );
        } else {
            filtered += 1;
            debug!(key = %obj.key, "filtered out");
        }

        if !builder.needs_more() {
            debug!(
                limit = config.total_file_count_limit,
                "reached total file count limit"
            );
            break;
        }
    }

    debug!(accepted, filtered, "bucket scan complete");

    builder.build()
}
