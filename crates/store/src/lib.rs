//! Data store capability surface for quarry repositories.
//!
//! Repositories never talk to a database directly. They build a [`Query`]
//! and hand it to a [`DataStore`], which owns the rows of one model together
//! with its named [`Scopes`] and [`Relations`].
//!
//! # Backends
//! - [`MemoryStore`] (feature `memory`, on by default): rows held in memory.
//!   Good for tests and small in-process data sets.
//! - [`SqliteStore`] (feature `sqlite`): a table in an SQLite database,
//!   reached through a `sqlx` connection pool.

pub mod backend;
pub mod error;
mod page;
mod query;
mod relation;
mod scope;

#[cfg(feature = "memory")]
pub use crate::backend::MemoryStore;
#[cfg(feature = "sqlite")]
pub use crate::backend::SqliteStore;
pub use crate::backend::DataStore;
pub use crate::page::{Page, SimplePage};
pub use crate::query::{Operator, Query};
pub use crate::relation::{Relation, Relations};
pub use crate::scope::{ScopeFn, Scopes};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn DataStore>;
