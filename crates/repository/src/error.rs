//! Repository Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use quarry_store::error::{Error as StoreError, ErrorKind as StoreErrorKind};

/// A repository error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The repository was built against a store that can't serve a model.
    /// Only raised while constructing a repository.
    #[display("model misconfigured: {_0}")]
    ModelMisconfigured(#[error(not(source))] String),
    /// An `*_or_fail` operation matched no rows.
    #[display("{model} not found: {constraint}")]
    NotFound { model: String, constraint: String },
    /// The data store rejected a query or write.
    #[display("store error: {_0}")]
    Store(StoreErrorKind),
}
impl ErrorKind {
    /// Convert a data store error into a repository error, preserving the
    /// store crate's `Exn` frame as a child in the error tree.
    #[track_caller]
    pub fn store(err: StoreError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Store(inner))
    }

    pub(crate) fn not_found(model: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::NotFound {
            model: model.into(),
            constraint: constraint.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if retrying might succeed.
    ///
    /// Repositories never retry on their own; a store failure is handed back
    /// exactly as the store reported it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(kind) => kind.is_retryable(),
            _ => false,
        }
    }
}
