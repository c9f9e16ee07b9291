//! Byte streams that survive dropped connections.
//!
//! A [`ResumableReader`] wraps an object's byte stream so that a read
//! failure does not abort the download: the wrapper remembers how many
//! bytes it already delivered, asks its [`Reopen`] implementation for a
//! fresh stream starting at that offset, and carries on. The downstream
//! consumer sees one continuous byte stream per object, failures included,
//! with nothing but latency to show for it.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use aws_sdk_s3::Client;
use bf_retry::{RetryConfig, with_retry};
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tracing::warn;

use crate::sdk::storage_error;

/// A boxed async byte reader.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Produces a replacement byte stream positioned at a given offset.
///
/// The seam between the resumable wrapper and the store: production code
/// reopens with a ranged GET, tests can hand back in-memory readers or
/// inject failures.
#[async_trait]
pub trait Reopen: Send + Sync {
    /// Reopens the underlying stream at `offset` after `cause` interrupted
    /// a read.
    async fn reopen(&self, offset: u64, cause: io::Error) -> io::Result<ByteReader>;
}

enum State {
    /// Delivering bytes from the current underlying stream.
    Reading(ByteReader),
    /// Waiting for the reopener to produce a replacement stream.
    Reopening(BoxFuture<'static, io::Result<ByteReader>>),
    /// A reopen failed; the stream is dead.
    Failed,
}

/// A byte stream that transparently reopens at the last delivered offset
/// when a read fails.
///
/// Owned by exactly one consumer; the offset counts bytes actually handed
/// to that consumer, so a reopened stream continues precisely where the
/// failed one left off. A failed reopen (after the reopener's own retry
/// budget) is terminal.
pub struct ResumableReader {
    reopener: Arc<dyn Reopen>,
    offset: u64,
    state: State,
}

impl ResumableReader {
    /// Wraps an already-open stream.
    pub fn new(initial: ByteReader, reopener: Arc<dyn Reopen>) -> Self {
        Self {
            reopener,
            offset: 0,
            state: State::Reading(initial),
        }
    }

    /// Bytes delivered to the consumer so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl std::fmt::Debug for ResumableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Reading(_) => "reading",
            State::Reopening(_) => "reopening",
            State::Failed => "failed",
        };
        f.debug_struct("ResumableReader")
            .field("offset", &self.offset)
            .field("state", &state)
            .finish()
    }
}

impl AsyncRead for ResumableReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            match std::mem::replace(&mut this.state, State::Failed) {
                State::Reading(mut inner) => {
                    let before = buf.filled().len();
                    match Pin::new(&mut inner).poll_read(cx, buf) {
                        Poll::Ready(Ok(())) => {
                            this.offset += (buf.filled().len() - before) as u64;
                            this.state = State::Reading(inner);
                            return Poll::Ready(Ok(()));
                        }
                        Poll::Ready(Err(cause)) => {
                            warn!(
                                offset = this.offset,
                                error = %cause,
                                "read failed, reopening stream at offset"
                            );
                            let reopener = Arc::clone(&this.reopener);
                            let offset = this.offset;
                            this.state = State::Reopening(Box::pin(async move {
                                reopener.reopen(offset, cause).await
                            }));
                        }
                        Poll::Pending => {
                            this.state = State::Reading(inner);
                            return Poll::Pending;
                        }
                    }
                }
                State::Reopening(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(reader)) => {
                        this.state = State::Reading(reader);
                    }
                    Poll::Ready(Err(e)) => {
                        // state stays Failed
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => {
                        this.state = State::Reopening(fut);
                        return Poll::Pending;
                    }
                },
                State::Failed => {
                    return Poll::Ready(Err(io::Error::other(
                        "stream is closed after a failed reopen",
                    )));
                }
            }
        }
    }
}

/// Reopens an object's stream with a GET at the resume offset.
///
/// Uses a ranged request (`bytes={offset}-`) by default; for stores
/// without range support, [`with_ranged(false)`](Self::with_ranged)
/// re-fetches the whole object and discards the already-delivered prefix.
/// Either way the GET goes through the retry policy.
pub struct S3Reopener {
    client: Client,
    bucket: String,
    key: String,
    retry: RetryConfig,
    ranged: bool,
}

impl S3Reopener {
    /// Creates a reopener for one object.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        key: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            retry,
            ranged: true,
        }
    }

    /// Select ranged reopening or whole-object refetch.
    pub fn with_ranged(mut self, ranged: bool) -> Self {
        self.ranged = ranged;
        self
    }
}

#[async_trait]
impl Reopen for S3Reopener {
    async fn reopen(&self, offset: u64, cause: io::Error) -> io::Result<ByteReader> {
        warn!(
            bucket = %self.bucket,
            key = %self.key,
            offset,
            error = %cause,
            "object read failed, retrying GET request at offset"
        );

        let operation = format!("reopen s3://{}/{}", self.bucket, self.key);
        let resp = with_retry(&self.retry, &operation, || {
            let mut req = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&self.key);
            if self.ranged && offset > 0 {
                req = req.range(format!("bytes={offset}-"));
            }
            async move { req.send().await.map_err(storage_error) }
        })
        .await
        .map_err(io::Error::other)?;

        let mut reader: ByteReader = Box::new(resp.body.into_async_read());
        if !self.ranged && offset > 0 {
            discard_prefix(&mut reader, offset).await?;
        }
        Ok(reader)
    }
}

/// Reads and throws away `remaining` bytes from the front of a stream.
pub(crate) async fn discard_prefix(reader: &mut ByteReader, mut remaining: u64) -> io::Result<()> {
    let mut scratch = [0u8; 8192];
    while remaining > 0 {
        let want = scratch.len().min(remaining as usize);
        let n = reader.read(&mut scratch[..want]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("object ended {remaining} bytes before the resume offset"),
            ));
        }
        remaining -= n as u64;
    }
    Ok(())
}
