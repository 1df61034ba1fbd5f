use crate::error::Result;
use async_trait::async_trait;
use quarry_query::{Columns, QueryBuilder, Record, Value};
use quarry_store::{Page, SimplePage};

/// Read terminal operations.
///
/// Every method consumes the clause state configured through
/// [`QueryBuilder`]: afterwards `wheres`, `where_ins`, `order_bys`, `scopes`
/// and `limit` are empty whether the call succeeded or not. Eager loads and
/// extra parameters persist.
///
/// This is the surface a caching decorator wraps, so it also exposes the
/// repository's identity for cache keys.
#[async_trait]
pub trait ReadRepository: QueryBuilder + Send + Sync {
    /// Stable name of this repository, used in notifications and cache keys.
    fn identity(&self) -> &str;

    /// Every row, with eager loads applied and every other clause ignored.
    async fn all(&mut self, columns: &Columns) -> Result<Vec<Record>>;

    /// Rows matching the configured clauses.
    async fn get(&mut self, columns: &Columns) -> Result<Vec<Record>>;

    /// One page of matching rows plus the total. `per_page` is checked
    /// against the pagination bounds; an out-of-range size is ignored.
    async fn paginate(&mut self, per_page: Option<u64>, columns: &Columns, page_name: &str, page: u64) -> Result<Page>;

    /// Like [`paginate`](Self::paginate) without counting the total.
    async fn simple_paginate(
        &mut self,
        per_page: Option<u64>,
        columns: &Columns,
        page_name: &str,
        page: u64,
    ) -> Result<SimplePage>;

    /// Number of rows [`get`](Self::get) would return.
    async fn count(&mut self) -> Result<u64>;

    /// First matching row whose `column` equals `id`.
    async fn find(&mut self, id: Value, columns: &Columns, column: &str) -> Result<Option<Record>>;

    /// [`find`](Self::find), failing with `NotFound` when nothing matches.
    async fn find_or_fail(&mut self, id: Value, columns: &Columns, column: &str) -> Result<Record>;

    async fn first(&mut self, columns: &Columns) -> Result<Option<Record>>;

    async fn first_or_fail(&mut self, columns: &Columns) -> Result<Record>;

    /// Values of one column from every matching row: a JSON array, or an
    /// object keyed by the `key` column when one is given.
    async fn pluck(&mut self, column: &str, key: Option<&str>) -> Result<Value>;
}

/// Write terminal operations.
///
/// Writes drop any pending clause state before they run; they never filter by
/// it.
#[async_trait]
pub trait WriteRepository: Send + Sync {
    async fn create(&mut self, data: Record) -> Result<Record>;

    /// [`create`](Self::create) once per element, in order. Not
    /// transactional: rows created before a failure stay created.
    async fn create_multiple(&mut self, data: Vec<Record>) -> Result<Vec<Record>>;

    /// Apply `data` to the row found by `column = id`. Returns `None` when
    /// there is no such row.
    async fn update(&mut self, id: Value, data: Record, column: &str) -> Result<Option<Record>>;

    async fn update_or_fail(&mut self, id: Value, data: Record, column: &str) -> Result<Record>;

    /// Update the first row matching `attributes` with `values`, or create
    /// one from both. Always reported as an update.
    async fn update_or_create(&mut self, attributes: Record, values: Record) -> Result<Record>;

    async fn delete(&mut self, id: Value, column: &str) -> Result<bool>;

    async fn delete_or_fail(&mut self, id: Value, column: &str) -> Result<bool>;

    /// Bulk delete by primary key. Returns how many rows were removed and
    /// publishes no notifications.
    async fn delete_multiple_by_id(&mut self, ids: &[Value]) -> Result<u64>;
}
