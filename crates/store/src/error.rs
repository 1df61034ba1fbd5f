//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A data store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for data store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The query was malformed (unknown operator, bad column name, ...).
    /// Detected when the query executes, never while it is being built.
    #[display("invalid query: {_0}")]
    InvalidQuery(#[error(not(source))] String),
    /// A scope was invoked by name but never registered with the store.
    #[display("unknown scope: {_0}")]
    UnknownScope(#[error(not(source))] String),
    /// A relation was eager loaded by name but never registered with the store.
    #[display("unknown relation: {_0}")]
    UnknownRelation(#[error(not(source))] String),
    /// A write was rejected by a uniqueness or integrity rule.
    #[display("constraint violation: {_0}")]
    Constraint(#[error(not(source))] String),
    /// The underlying database failed.
    #[display("database error")]
    Database,
    /// Data read back from the store could not be represented.
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
