//! Error types for voxie

use thiserror::Error;

/// Main error type for voxie operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Coarse classification of an [`Error`], for callers that translate failures
/// into another error format (progress reports, RPC replies, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input was rejected before any work started.
    InvalidInput,
    /// Memory ran out while growing the output.
    ResourceExhausted,
    /// The caller cancelled the operation.
    Cancelled,
    /// A bug or an unexpected internal state.
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidGrid(_) | Error::InvalidData(_) => ErrorKind::InvalidInput,
            Error::Allocation(_) => ErrorKind::ResourceExhausted,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Algorithm(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error is the result of cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Self {
        Error::Allocation(e.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::InvalidGrid(e.to_string())
    }
}

/// Result type alias for voxie operations
pub type Result<T> = std::result::Result<T, Error>;
