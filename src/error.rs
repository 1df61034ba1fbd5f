//! Facade Error Types
//!
//! Wraps the member crates' error kinds so wiring code has one error type to
//! propagate. Each member crate's `Exn` frame is kept as a child.

use derive_more::{Display, Error};
use quarry_config::error::{Error as ConfigError, ErrorKind as ConfigErrorKind};
use quarry_repository::error::{Error as RepositoryError, ErrorKind as RepositoryErrorKind};

/// A quarry error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error: {_0}")]
    Config(ConfigErrorKind),
    #[display("repository error: {_0}")]
    Repository(RepositoryErrorKind),
    /// A cached repository was requested but no cache store is configured.
    #[display("no cache store configured")]
    CacheDisabled,
}

impl ErrorKind {
    #[track_caller]
    pub fn config(err: ConfigError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Config(inner))
    }

    #[track_caller]
    pub fn repository(err: RepositoryError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Repository(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(kind) => kind.is_retryable(),
            Self::Repository(kind) => kind.is_retryable(),
            Self::CacheDisabled => false,
        }
    }
}
