//! Error types and classification for bucketflow.
//!
//! This crate provides:
//! - [`BfError`] - Top-level error enum for the scan/fetch pipeline
//! - [`StorageError`] - Remote-store errors with their HTTP-level detail
//! - [`ErrorClass`] for retry decision making
//! - [`classify`] / [`is_transient`] - pure classification, no I/O involved
//!
//! The retry executor in `bf-retry` consults [`classify`] before every
//! retry; keeping the decision here as a plain function over the error
//! value means it can be unit-tested without a network in sight.

use thiserror::Error;

/// Top-level error type for bucketflow.
#[derive(Error, Debug)]
pub enum BfError {
    /// Remote storage errors (listing pages, object GETs, reopens)
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors: bad pattern, bad bucket/prefix, fatal 4xx
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<BfError>>,
    },

    /// Local listing blob is corrupted or truncated
    #[error("Corrupt listing: {0}")]
    Corrupt(String),

    /// Retry budget exhausted; carries the first and last observed errors.
    ///
    /// `first` is absent when the first failure was also the last one.
    #[error("Gave up after {attempts} attempts: {last}")]
    GiveUp {
        attempts: u32,
        first: Option<Box<BfError>>,
        #[source]
        last: Box<BfError>,
    },

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BfError {
    /// Creates a configuration error without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        BfError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error wrapping the error that triggered it.
    pub fn config_with(message: impl Into<String>, source: BfError) -> Self {
        BfError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Remote-store errors.
///
/// Remote calls map their SDK failures into these variants at the call
/// site, preserving the HTTP status, service error code and raw body so
/// that [`classify`] can stay a pure function.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store returned an API error response.
    ///
    /// `code` is the structured service error code when the response could
    /// be parsed; `body` is the raw payload when one was returned.
    #[error("API error (status {status:?}, code {code:?}): {message}")]
    Api {
        status: Option<u16>,
        code: Option<String>,
        message: String,
        body: Option<String>,
    },

    /// Token/credential exchange failed while authenticating a request
    #[error("Token error (status {status}): {description}")]
    Token { status: u16, description: String },

    /// I/O error talking to the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, reset, refused)
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Error classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient error - retry with backoff
    ///
    /// Examples: network failure, 5xx, token refresh race
    Transient,

    /// Fatal error - never retry, surface immediately
    ///
    /// Examples: 4xx API error, bad pattern, corrupt listing blob
    Fatal,
}

/// Classifies an error to determine retry behavior.
///
/// The rules, in order:
/// - A structured API error with a 4xx status is fatal, except when the
///   response carried no parsed error code but a non-empty raw body (a
///   malformed-but-present error payload, typically a load balancer
///   hiccup), which is transient.
/// - A 4xx token error is fatal, except when its description contains
///   "Invalid JWT" - clock skew and token propagation delay make a fresh
///   attempt likely to succeed.
/// - Configuration, corruption and give-up errors are fatal.
/// - Everything else (I/O, timeouts, connection failures, 5xx,
///   unclassified) is transient.
pub fn classify(error: &BfError) -> ErrorClass {
    match error {
        BfError::Storage(e) => classify_storage(e),
        BfError::Config { .. } => ErrorClass::Fatal,
        BfError::Corrupt(_) => ErrorClass::Fatal,
        BfError::GiveUp { .. } => ErrorClass::Fatal,
        BfError::Other(_) => ErrorClass::Transient,
    }
}

fn classify_storage(error: &StorageError) -> ErrorClass {
    match error {
        StorageError::Api {
            status: Some(status),
            code,
            body,
            ..
        } if status / 100 == 4 => {
            if code.is_none() && body.as_deref().is_some_and(|b| !b.is_empty()) {
                ErrorClass::Transient
            } else {
                ErrorClass::Fatal
            }
        }
        StorageError::Api { .. } => ErrorClass::Transient,
        StorageError::Token {
            status,
            description,
        } if status / 100 == 4 => {
            if description.contains("Invalid JWT") {
                ErrorClass::Transient
            } else {
                ErrorClass::Fatal
            }
        }
        StorageError::Token { .. } => ErrorClass::Transient,
        StorageError::Io(_) | StorageError::Timeout(_) | StorageError::Connection(_) => {
            ErrorClass::Transient
        }
    }
}

/// Returns true when the error should be retried.
pub fn is_transient(error: &BfError) -> bool {
    classify(error) == ErrorClass::Transient
}

/// Result type alias using BfError.
pub type Result<T> = std::result::Result<T, BfError>;
