//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! None of these reach the caller of a cached read: the decorator logs them
//! and runs the read uncached instead.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or writing a cache entry failed.
    #[display("cache I/O error: {_0}")]
    Io(IoError),
    /// A value couldn't be turned into bytes for the cache.
    #[display("cache serialization error")]
    Serialization,
    /// A stored entry is truncated or otherwise unreadable.
    #[display("invalid cache entry: {_0}")]
    InvalidEntry(#[error(not(source))] &'static str),
    /// A read method name that doesn't exist.
    #[display("unknown read method: {_0}")]
    UnknownMethod(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidEntry("header").to_string(), "invalid cache entry: header");
        assert_eq!(ErrorKind::UnknownMethod("fetch".to_string()).to_string(), "unknown read method: fetch");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::from(IoError::other("disk")).is_retryable());
        assert!(!ErrorKind::Serialization.is_retryable());
    }
}
