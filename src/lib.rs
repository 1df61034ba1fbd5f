//! Fluent, cache-aware repositories over pluggable data stores.
//!
//! This crate ties the quarry workspace together:
//!
//! - [`query`]: clause types, query state and pagination bounds.
//! - [`store`]: the [`DataStore`](store::DataStore) trait and its backends.
//! - [`repository`]: stateful repositories and their terminal operations.
//! - [`cache`]: the read-through caching decorator and cache stores.
//! - [`config`]: layered configuration.
//!
//! [`RepositoryFactory`] builds repositories from a loaded configuration.
//!
//! ```
//! use quarry::prelude::*;
//! use quarry::store::MemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new("users").with_rows([
//!     json!({"id": 1, "name": "Ada", "active": true}),
//!     json!({"id": 2, "name": "Brian", "active": false}),
//! ]));
//! let factory = RepositoryFactory::new();
//! let mut users = factory.cached(store).unwrap();
//! let active = users.filter("active", true).count().await.unwrap();
//! assert_eq!(active, 1);
//! # }
//! ```

pub mod error;
mod factory;

pub use crate::factory::RepositoryFactory;
pub use quarry_cache as cache;
pub use quarry_config as config;
pub use quarry_query as query;
pub use quarry_repository as repository;
pub use quarry_store as store;

/// The traits needed to configure and run repositories.
pub mod prelude {
    pub use crate::RepositoryFactory;
    pub use quarry_cache::CachingRepository;
    pub use quarry_query::{Columns, Direction, QueryBuilder, Record, Value};
    pub use quarry_repository::{ReadRepository, Repository, WriteRepository};
}
