//! Byte-stream provider for one task's objects.

use std::sync::Arc;

use aws_sdk_s3::Client;
use bf_error::Result;
use bf_retry::{RetryConfig, with_retry};
use tracing::debug;

use crate::resume::{ByteReader, ResumableReader, S3Reopener};
use crate::sdk::storage_error;

/// One opened object, ready for streaming.
pub struct OpenedObject {
    /// Display path of the object (`s3://bucket/key`)
    pub path: String,

    /// Object size from the GET response, when the store reported one
    pub size_hint: Option<u64>,

    /// The object's byte stream, wrapped for reopen-at-offset recovery
    pub reader: ResumableReader,
}

impl std::fmt::Debug for OpenedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedObject")
            .field("path", &self.path)
            .field("size_hint", &self.size_hint)
            .finish()
    }
}

/// Opens readable byte streams for a task's objects, one at a time.
///
/// Backed by the task's materialized names in discovery order. The
/// default mode iterates every name; historical task assignment sometimes
/// put exactly one object in a task, and
/// [`with_single_shot(true)`](Self::with_single_shot) reproduces that
/// contract by signalling end-of-task after the first open.
///
/// Used by exactly one worker at a time; opening and reading need no
/// internal synchronization.
pub struct ObjectStreamProvider {
    client: Client,
    bucket: String,
    names: std::vec::IntoIter<String>,
    retry: RetryConfig,
    single_shot: bool,
    ranged: bool,
    opened: bool,
}

impl ObjectStreamProvider {
    /// Creates a provider over one task's object names.
    pub fn new(client: Client, bucket: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            names: names.into_iter(),
            retry: RetryConfig::default(),
            single_shot: false,
            ranged: true,
            opened: false,
        }
    }

    /// Set the retry tunables applied to opens and reopens.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Stop after the first object instead of iterating the whole task.
    pub fn with_single_shot(mut self, single_shot: bool) -> Self {
        self.single_shot = single_shot;
        self
    }

    /// Select ranged reopening (default) or whole-object refetch for
    /// stores without range support.
    pub fn with_ranged(mut self, ranged: bool) -> Self {
        self.ranged = ranged;
        self
    }

    /// Opens the next unread object of the task.
    ///
    /// Returns `Ok(None)` when the task is exhausted (or, in single-shot
    /// mode, after the first object). The GET goes through the retry
    /// policy; the returned stream reopens itself at the delivered offset
    /// on read failures.
    pub async fn open_next(&mut self) -> Result<Option<OpenedObject>> {
        if self.single_shot && self.opened {
            return Ok(None);
        }

        let Some(key) = self.names.next() else {
            return Ok(None);
        };
        self.opened = true;

        let operation = format!("get s3://{}/{}", self.bucket, key);
        let resp = with_retry(&self.retry, &operation, || {
            let req = self.client.get_object().bucket(&self.bucket).key(&key);
            async move { req.send().await.map_err(storage_error) }
        })
        .await?;

        let size_hint = resp.content_length().and_then(|l| u64::try_from(l).ok());
        debug!(bucket = %self.bucket, key = %key, size = ?size_hint, "opened object stream");

        let reopener = S3Reopener::new(
            self.client.clone(),
            self.bucket.clone(),
            key.clone(),
            self.retry.clone(),
        )
        .with_ranged(self.ranged);

        let initial: ByteReader = Box::new(resp.body.into_async_read());
        Ok(Some(OpenedObject {
            path: format!("s3://{}/{}", self.bucket, key),
            size_hint,
            reader: ResumableReader::new(initial, Arc::new(reopener)),
        }))
    }
}
