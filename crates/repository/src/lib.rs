//! Stateful repositories over quarry data stores.
//!
//! A [`Repository`] is configured fluently through
//! [`QueryBuilder`](quarry_query::QueryBuilder) and consumed by the terminal
//! operations of [`ReadRepository`] and [`WriteRepository`]. Writes publish
//! [`RepositoryEvent`]s to an [`EventSink`].
//!
//! ```
//! use quarry_query::{Columns, Direction, QueryBuilder};
//! use quarry_repository::{ReadRepository, Repository};
//! use quarry_store::MemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new("posts").with_rows([
//!     json!({"id": 1, "title": "Hello", "views": 10}),
//!     json!({"id": 2, "title": "World", "views": 250}),
//! ]);
//! let mut posts = Repository::new(Arc::new(store)).unwrap();
//! let popular = posts
//!     .filter_op("views", ">=", 100)
//!     .order_by("views", Direction::Desc)
//!     .get(&Columns::all())
//!     .await
//!     .unwrap();
//! assert_eq!(popular.len(), 1);
//! # }
//! ```

pub mod error;
pub mod events;
mod repository;
mod traits;

pub use crate::events::{Action, ChannelSink, EventSink, RepositoryEvent, SinkHandle, TracingSink};
pub use crate::repository::Repository;
pub use crate::traits::{ReadRepository, WriteRepository};
