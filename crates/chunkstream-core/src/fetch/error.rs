//! Fetch and decode error types.

use thiserror::Error;

/// Terminal failure of a single chunk fetch. Never retried by the coordinator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Transfer did not finish in time (connect or total timeout).
    #[error("timed out: {0}")]
    Timeout(String),
    /// Any other transport failure (connection refused, DNS, reset, ...).
    #[error("transport: {0}")]
    Transport(String),
    /// Fetch was cancelled through its cancellation token.
    #[error("fetch cancelled")]
    Cancelled,
    /// The fetcher or decoder panicked.
    #[error("fetch or decode panicked")]
    Panicked,
    /// Bytes arrived but could not be turned into a payload.
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// HTTP status, when the failure carries one.
    pub fn status(&self) -> Option<u32> {
        match self {
            FetchError::Http(code) => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    Invalid(String),
}
