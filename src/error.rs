//! Crate-wide error type.
//!
//! Every error kind surfaced to callers (`spec.md` §7) is a flat,
//! message-carrying variant rather than a nested error tree, so that an
//! external tool-protocol handler can translate any `GoldieError` into a
//! tool-call error response with a single `match`.

use thiserror::Error;

/// Errors produced by the Store, Indexer, and Queue.
#[derive(Debug, Error)]
pub enum GoldieError {
    /// Empty content/query/topic, a missing required parameter, malformed
    /// metadata JSON, or an unknown `clear_queue` status.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A document or job id is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// File read, directory walk, or database open/write failure.
    #[error("io failure: {0}")]
    IoFailure(String),

    /// The embedder rejected the text or returned the wrong dimension.
    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),

    /// A remote embedder's network/HTTP call failed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Panics, serialization failures, or anything else the caller cannot
    /// act on directly. The worker converts these into failed jobs rather
    /// than propagating them to the process.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for GoldieError {
    fn from(err: std::io::Error) -> Self {
        GoldieError::IoFailure(err.to_string())
    }
}

impl From<serde_json::Error> for GoldieError {
    fn from(err: serde_json::Error) -> Self {
        GoldieError::Internal(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for GoldieError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        GoldieError::IoFailure(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type GoldieResult<T> = Result<T, GoldieError>;
