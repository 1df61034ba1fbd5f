//! Accumulated query state for stateful repositories.
//!
//! A repository behaves like a builder: fluent calls append filter, sort,
//! scope and limit clauses to a [`QueryState`], and a terminal call consumes
//! that state. This crate holds the pieces that are independent of any data
//! store:
//!
//! - **Clauses** ([`Where`], [`WhereIn`], [`OrderBy`], [`ScopeCall`]) exactly as
//!   the caller wrote them. Nothing is validated here; the data store rejects
//!   malformed columns or operators when the query runs.
//! - **State** ([`QueryState`]) and its snapshot-and-clear contract.
//! - **Pagination bounds** ([`PaginationBounds`]) with their "ignore, don't
//!   clamp" rule for out-of-range page sizes.
//! - **The builder trait** ([`QueryBuilder`]) that gives any type owning a
//!   `QueryState` the fluent setters.
//!
//! Every type here is [`serde::Serialize`] so that the whole pending state can
//! be hashed into a cache key.

mod builder;
mod clause;
mod pagination;
mod state;

pub use crate::builder::{IntoRelations, QueryBuilder};
pub use crate::clause::{Columns, Direction, OrderBy, ScopeCall, Where, WhereIn};
pub use crate::pagination::{DEFAULT_MAX_PER_PAGE, DEFAULT_MIN_PER_PAGE, DEFAULT_PER_PAGE, PaginationBounds};
pub use crate::state::QueryState;
pub use serde_json::Value;

/// A single row: column name to value.
pub type Record = serde_json::Map<String, Value>;
