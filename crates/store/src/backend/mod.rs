//! Data store trait and implementations.
//!
//! This module defines the `DataStore` trait: the capability surface a
//! repository needs from whatever actually holds the rows. Backends implement
//! four primitives (`select`, `insert`, `update_by_key`, `delete_by_keys`);
//! every executor a repository calls is provided on top of them and may be
//! overridden when a backend can do better (a SQL `COUNT(*)`, say).

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "memory")]
pub use self::memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteStore;
use crate::error::Result;
use crate::page::{Page, SimplePage, page_offset};
use crate::query::Query;
use crate::relation::Relations;
use crate::scope::Scopes;
use async_trait::async_trait;
use quarry_query::{Columns, Record, Value};

/// Unified interface for data stores.
///
/// One store instance serves one model (table, collection, ...). The store
/// owns the model's named scopes and relations; repositories resolve scope and
/// relation names through it when a query executes.
///
/// # Examples
///
/// ```
/// use quarry_query::{Columns, Direction};
/// use quarry_store::{DataStore, error::Result};
///
/// async fn newest_admins(store: &dyn DataStore) -> Result<usize> {
///     let query = store
///         .new_query()
///         .filter("role", "=", "admin")
///         .order_by("created_at", Direction::Desc)
///         .take(5);
///     Ok(store.get(&query, &Columns::all()).await?.len())
/// }
/// ```
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Name of the model this store serves. Used for logging and for the
    /// default repository identity.
    fn model(&self) -> &str;

    /// Which backend and database serve the model, e.g. `memory` or
    /// `sqlite:/var/lib/app.db`. Prefixes the default repository identity so
    /// same-named models in different stores get separate cache entries.
    fn backend(&self) -> &str;

    /// Column that uniquely identifies a row.
    fn primary_key(&self) -> &str;

    fn scopes(&self) -> &Scopes;

    fn relations(&self) -> &Relations;

    /// A fresh, empty query for this model.
    fn new_query(&self) -> Query {
        Query::default()
    }

    /// Rows matching the query's predicates, sorted, windowed by
    /// limit/offset and projected to `columns`. Relations are *not* loaded.
    async fn select(&self, query: &Query, columns: &Columns) -> Result<Vec<Record>>;

    /// Persist a new row and return it as stored (generated key included).
    async fn insert(&self, data: Record) -> Result<Record>;

    /// Apply `data` to the row whose primary key is `key`. Returns the
    /// updated row, or `None` if there is no such row.
    async fn update_by_key(&self, key: &Value, data: &Record) -> Result<Option<Record>>;

    /// Remove the rows whose primary keys are in `keys`, returning how many
    /// were actually removed.
    async fn delete_by_keys(&self, keys: &[Value]) -> Result<u64>;

    /// [`select`](Self::select) followed by eager loading of the query's relations.
    async fn get(&self, query: &Query, columns: &Columns) -> Result<Vec<Record>> {
        let mut rows = self.select(query, columns).await?;
        self.relations().eager_load(&query.eager_loads, &mut rows).await?;
        Ok(rows)
    }

    /// First row by the query's current ordering.
    async fn first(&self, query: &Query, columns: &Columns) -> Result<Option<Record>> {
        let query = query.clone().take(1);
        Ok(self.get(&query, columns).await?.into_iter().next())
    }

    /// Number of rows the query returns, limit included.
    ///
    /// The default runs the query and counts the rows.
    async fn count(&self, query: &Query) -> Result<u64> {
        Ok(self.select(query, &Columns::all()).await?.len() as u64)
    }

    /// One page of results plus the total number of matching rows.
    ///
    /// The page window replaces any limit or offset already on the query.
    async fn paginate(
        &self,
        query: &Query,
        per_page: u64,
        columns: &Columns,
        page_name: &str,
        page: u64,
    ) -> Result<Page> {
        let page = page.max(1);
        let total = self.count(&query.unbounded()).await?;
        let window = query.clone().skip(page_offset(page, per_page)).take(per_page);
        let items = self.get(&window, columns).await?;
        Ok(Page::new(items, total, per_page, page, page_name))
    }

    /// One page of results without counting the total; fetches a single
    /// extra row to find out whether another page follows.
    async fn simple_paginate(
        &self,
        query: &Query,
        per_page: u64,
        columns: &Columns,
        page_name: &str,
        page: u64,
    ) -> Result<SimplePage> {
        let page = page.max(1);
        let window = query
            .clone()
            .skip(page_offset(page, per_page))
            .take(per_page.saturating_add(1));
        let mut items = self.get(&window, columns).await?;
        let has_more = items.len() as u64 > per_page;
        items.truncate(usize::try_from(per_page).unwrap_or(usize::MAX));
        Ok(SimplePage {
            items,
            per_page,
            current_page: page,
            has_more,
            page_name: page_name.to_string(),
        })
    }

    async fn create(&self, data: Record) -> Result<Record> {
        self.insert(data).await
    }

    async fn update(&self, key: &Value, data: &Record) -> Result<Option<Record>> {
        self.update_by_key(key, data).await
    }

    /// Update the first row matching every attribute in `attributes` with
    /// `values`, or insert `attributes` merged with `values`.
    async fn update_or_create(&self, attributes: &Record, values: &Record) -> Result<Record> {
        let query = attributes
            .iter()
            .fold(self.new_query(), |query, (column, value)| query.filter(column.clone(), "=", value.clone()));
        let existing = self.select(&query.take(1), &Columns::all()).await?.into_iter().next();
        if let Some(key) = existing.as_ref().and_then(|row| row.get(self.primary_key()))
            && let Some(updated) = self.update_by_key(key, values).await?
        {
            return Ok(updated);
        }
        let mut data = attributes.clone();
        data.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.insert(data).await
    }

    async fn delete(&self, key: &Value) -> Result<bool> {
        Ok(self.delete_by_keys(std::slice::from_ref(key)).await? > 0)
    }

    /// Bulk delete by primary key.
    async fn destroy(&self, keys: &[Value]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete_by_keys(keys).await
    }
}
