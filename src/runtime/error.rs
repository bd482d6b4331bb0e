//! Runtime error types.

use crate::parser::error::ParseError;
use crate::variables::ResolveError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors a [`Transport`](super::Transport) reports for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failures, DNS resolution errors and other network issues.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// The expanded URL could not be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Invalid headers or a malformed response.
    #[error("HTTP protocol error: {0}")]
    Protocol(String),
}

/// Errors raised by a [`ResponseStorage`](super::ResponseStorage).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Response storage error at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Invalid stored response at {}: {message}", path.display())]
    Serialization { path: PathBuf, message: String },
}

/// Errors that stop a run.
///
/// Handler failures are not listed here; they are recorded in the handler
/// outcome and the run continues.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Request {index} ({label}) failed: {source}")]
    Transport {
        index: usize,
        label: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
