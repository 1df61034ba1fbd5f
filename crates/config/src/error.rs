//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed.
    #[display("failed to load configuration")]
    Load,
    /// Configuration loaded, but a value is out of range or unknown.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// The configured cache store could not be opened.
    #[display("failed to open cache store")]
    CacheStore,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Fixing the configuration is the only remedy for every kind.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
