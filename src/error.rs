//! Error types shared across the pipeline.
//!
//! Expected outcomes (duplicate insert, empty extraction) are modelled as
//! return values, not errors. The enums here cover the failures a caller
//! has to classify: transient backend conditions that are worth retrying
//! later, extraction failures, and per-row validation problems.

use thiserror::Error;

/// Errors raised by the record store and queue.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row is still inside the write-buffer window and cannot be mutated yet.
    #[error("row {row} is still in the write buffer; retry later")]
    WriteBuffered { row: i64 },

    /// The database was locked by another writer past the busy timeout.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("database error: {0}")]
    Database(diesel::result::Error),
}

impl StoreError {
    /// Transient errors leave the data untouched and may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::WriteBuffered { .. } | StoreError::Busy(_) | StoreError::Connection(_)
        )
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        let message = e.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("database is locked") || lowered.contains("database is busy") {
            StoreError::Busy(message)
        } else if lowered.contains("unable to open database") {
            StoreError::Connection(message)
        } else {
            StoreError::Database(e)
        }
    }
}

/// Errors raised by a content extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("request failed: {0}")]
    Http(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("content too short ({0} chars)")]
    TooShort(usize),
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExtractError::Timeout(std::time::Duration::ZERO)
        } else {
            ExtractError::Http(e.to_string())
        }
    }
}

/// Per-row input problems, rejected before they reach the pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("row {row}: missing url")]
    MissingUrl { row: usize },

    #[error("row {row}: invalid url {url:?}")]
    InvalidUrl { row: usize, url: String },

    #[error("row {row}: content is required")]
    EmptyContent { row: usize },

    #[error("unknown field {0:?}")]
    UnknownField(String),

    #[error("invalid value {value:?} for field {field}")]
    InvalidValue { field: String, value: String },
}

/// Top-level error for library callers that mix components.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
