//! Unified error types for weather ingestion.
//!
//! Error codes:
//! - PARSE_001: No parser matches a file name
//! - ARG_001: Invalid or missing argument
//! - DB_001: Storage errors
//! - QUEUE_001: Job queue / lock service errors
//! - POLL_001: Source poller errors
//! - CFG_001: Configuration errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for weather ingestion.
#[derive(Debug, Error)]
pub enum Error {
    /// No parser is registered for the given file name.
    #[error("[PARSE_001] no parser found for file: {0}")]
    UnknownFormat(String),

    /// A precondition on the caller's arguments failed.
    #[error("[ARG_001] invalid argument: {0}")]
    InvalidArgument(String),

    #[error("[DB_001] storage error: {0}")]
    Storage(String),

    #[error("[QUEUE_001] queue error: {0}")]
    Queue(String),

    #[error("[POLL_001] poll error: {0}")]
    Poll(String),

    #[error("[CFG_001] configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn unknown_format(basename: impl Into<String>) -> Self {
        Self::UnknownFormat(basename.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn poll(msg: impl Into<String>) -> Self {
        Self::Poll(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownFormat(_) => "PARSE_001",
            Self::InvalidArgument(_) => "ARG_001",
            Self::Storage(_) => "DB_001",
            Self::Queue(_) => "QUEUE_001",
            Self::Poll(_) => "POLL_001",
            Self::Config(_) => "CFG_001",
        }
    }

    /// Whether a bulk operation may skip the failing item and continue.
    ///
    /// Only per-file resolution failures qualify. Storage, queue and poll
    /// failures abort the current pass or cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownFormat(_))
    }
}
