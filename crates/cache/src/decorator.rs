use crate::key::CacheKey;
use crate::policy::{CachePolicy, ReadMethod};
use crate::store::CacheHandle;
use async_trait::async_trait;
use quarry_query::{Columns, PaginationBounds, QueryBuilder, QueryState, Record, Value};
use quarry_repository::error::Result;
use quarry_repository::{ReadRepository, WriteRepository};
use quarry_store::{Page, SimplePage};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;

/// Read-through cache in front of a repository.
///
/// Wraps every read terminal operation of `R`: the pending query state is
/// hashed into a [`CacheKey`] before the call, a stored result is returned
/// without touching `R`, and a fresh result is stored under the key with the
/// method's TTL. Writes and [`pluck`](ReadRepository::pluck) pass straight
/// through.
///
/// Cached reads are not invalidated by writes. A result stays cached for its
/// full TTL even if the rows behind it change.
///
/// The cache can only make a read faster, never make it fail: cache store
/// errors are logged and the read runs uncached, and an entry that no longer
/// decodes counts as a miss.
pub struct CachingRepository<R> {
    inner: R,
    cache: CacheHandle,
    policy: CachePolicy,
    cache_off: bool,
}

impl<R: ReadRepository> CachingRepository<R> {
    pub fn new(inner: R, cache: CacheHandle, policy: CachePolicy) -> Self {
        Self {
            inner,
            cache,
            policy,
            cache_off: false,
        }
    }

    /// Bypass the cache for this instance only, whatever the policy says.
    pub fn set_cache_off(&mut self) -> &mut Self {
        self.cache_off = true;
        self
    }

    pub fn is_cache_off(&self) -> bool {
        self.cache_off
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// The key for `method` called with `args`, or `None` to bypass the cache.
    fn key_for(&self, method: ReadMethod, args: Value) -> Option<CacheKey> {
        self.key_with_bounds(method, args, self.inner.pagination())
    }

    /// The key for a paginate call: hashes the page size the call will
    /// actually use, not the one left over from the previous call.
    fn page_key_for(&self, method: ReadMethod, per_page: Option<u64>, args: Value) -> Option<CacheKey> {
        let mut bounds = *self.inner.pagination();
        bounds.prepare(per_page);
        self.key_with_bounds(method, args, &bounds)
    }

    fn key_with_bounds(&self, method: ReadMethod, args: Value, pagination: &PaginationBounds) -> Option<CacheKey> {
        if self.cache_off || !self.policy.allows(method) {
            tracing::debug!(repository = self.inner.identity(), %method, "cache bypassed");
            return None;
        }
        let derived = CacheKey::derive(
            self.inner.identity(),
            method,
            self.inner.query_state(),
            pagination,
            &args,
        );
        match derived {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(%method, error = %*err, "couldn't derive cache key, reading uncached");
                None
            },
        }
    }

    async fn lookup<T: DeserializeOwned + Send>(&self, key: &CacheKey) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    tracing::debug!(%key, "cache hit");
                    Some(value)
                },
                Err(err) => {
                    tracing::debug!(%key, error = %err, "unreadable cache entry, treating as miss");
                    None
                },
            },
            Ok(None) => {
                tracing::debug!(%key, "cache miss");
                None
            },
            Err(err) => {
                tracing::warn!(%key, cache = self.cache.name(), error = %*err, "cache read failed");
                None
            },
        }
    }

    async fn remember<T: Serialize + Sync>(&self, key: &CacheKey, method: ReadMethod, value: &T) {
        let Some(ttl) = self.policy.ttl_for(method) else {
            tracing::trace!(%key, "non-positive TTL, not storing");
            return;
        };
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%key, error = %err, "couldn't encode result for the cache");
                return;
            },
        };
        if let Err(err) = self.cache.set(key, bytes, ttl).await {
            tracing::warn!(%key, cache = self.cache.name(), error = %*err, "cache write failed");
        }
    }
}

impl<R: ReadRepository> QueryBuilder for CachingRepository<R> {
    fn query_state(&self) -> &QueryState {
        self.inner.query_state()
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        self.inner.query_state_mut()
    }

    fn pagination(&self) -> &PaginationBounds {
        self.inner.pagination()
    }

    fn pagination_mut(&mut self) -> &mut PaginationBounds {
        self.inner.pagination_mut()
    }
}

#[async_trait]
impl<R: ReadRepository> ReadRepository for CachingRepository<R> {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn all(&mut self, columns: &Columns) -> Result<Vec<Record>> {
        let Some(key) = self.key_for(ReadMethod::All, json!([columns])) else {
            return self.inner.all(columns).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let rows = self.inner.all(columns).await?;
        self.remember(&key, ReadMethod::All, &rows).await;
        Ok(rows)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn get(&mut self, columns: &Columns) -> Result<Vec<Record>> {
        let Some(key) = self.key_for(ReadMethod::Get, json!([columns])) else {
            return self.inner.get(columns).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let rows = self.inner.get(columns).await?;
        self.remember(&key, ReadMethod::Get, &rows).await;
        Ok(rows)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn paginate(&mut self, per_page: Option<u64>, columns: &Columns, page_name: &str, page: u64) -> Result<Page> {
        let args = json!([per_page, columns, page_name, page]);
        let Some(key) = self.page_key_for(ReadMethod::Paginate, per_page, args) else {
            return self.inner.paginate(per_page, columns, page_name, page).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            self.inner.pagination_mut().prepare(per_page);
            return Ok(hit);
        }
        let page = self.inner.paginate(per_page, columns, page_name, page).await?;
        self.remember(&key, ReadMethod::Paginate, &page).await;
        Ok(page)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn simple_paginate(
        &mut self,
        per_page: Option<u64>,
        columns: &Columns,
        page_name: &str,
        page: u64,
    ) -> Result<SimplePage> {
        let args = json!([per_page, columns, page_name, page]);
        let Some(key) = self.page_key_for(ReadMethod::SimplePaginate, per_page, args) else {
            return self.inner.simple_paginate(per_page, columns, page_name, page).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            self.inner.pagination_mut().prepare(per_page);
            return Ok(hit);
        }
        let page = self.inner.simple_paginate(per_page, columns, page_name, page).await?;
        self.remember(&key, ReadMethod::SimplePaginate, &page).await;
        Ok(page)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn count(&mut self) -> Result<u64> {
        let Some(key) = self.key_for(ReadMethod::Count, json!([])) else {
            return self.inner.count().await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let count = self.inner.count().await?;
        self.remember(&key, ReadMethod::Count, &count).await;
        Ok(count)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn find(&mut self, id: Value, columns: &Columns, column: &str) -> Result<Option<Record>> {
        let Some(key) = self.key_for(ReadMethod::Find, json!([id, columns, column])) else {
            return self.inner.find(id, columns, column).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let found = self.inner.find(id, columns, column).await?;
        self.remember(&key, ReadMethod::Find, &found).await;
        Ok(found)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn find_or_fail(&mut self, id: Value, columns: &Columns, column: &str) -> Result<Record> {
        let Some(key) = self.key_for(ReadMethod::FindOrFail, json!([id, columns, column])) else {
            return self.inner.find_or_fail(id, columns, column).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let found = self.inner.find_or_fail(id, columns, column).await?;
        self.remember(&key, ReadMethod::FindOrFail, &found).await;
        Ok(found)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn first(&mut self, columns: &Columns) -> Result<Option<Record>> {
        let Some(key) = self.key_for(ReadMethod::First, json!([columns])) else {
            return self.inner.first(columns).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let found = self.inner.first(columns).await?;
        self.remember(&key, ReadMethod::First, &found).await;
        Ok(found)
    }

    #[instrument(skip_all, fields(repository = self.inner.identity()))]
    async fn first_or_fail(&mut self, columns: &Columns) -> Result<Record> {
        let Some(key) = self.key_for(ReadMethod::FirstOrFail, json!([columns])) else {
            return self.inner.first_or_fail(columns).await;
        };
        if let Some(hit) = self.lookup(&key).await {
            self.inner.query_state_mut().clear_clauses();
            return Ok(hit);
        }
        let found = self.inner.first_or_fail(columns).await?;
        self.remember(&key, ReadMethod::FirstOrFail, &found).await;
        Ok(found)
    }

    async fn pluck(&mut self, column: &str, key: Option<&str>) -> Result<Value> {
        self.inner.pluck(column, key).await
    }
}

#[async_trait]
impl<R: ReadRepository + WriteRepository> WriteRepository for CachingRepository<R> {
    async fn create(&mut self, data: Record) -> Result<Record> {
        self.inner.create(data).await
    }

    async fn create_multiple(&mut self, data: Vec<Record>) -> Result<Vec<Record>> {
        self.inner.create_multiple(data).await
    }

    async fn update(&mut self, id: Value, data: Record, column: &str) -> Result<Option<Record>> {
        self.inner.update(id, data, column).await
    }

    async fn update_or_fail(&mut self, id: Value, data: Record, column: &str) -> Result<Record> {
        self.inner.update_or_fail(id, data, column).await
    }

    async fn update_or_create(&mut self, attributes: Record, values: Record) -> Result<Record> {
        self.inner.update_or_create(attributes, values).await
    }

    async fn delete(&mut self, id: Value, column: &str) -> Result<bool> {
        self.inner.delete(id, column).await
    }

    async fn delete_or_fail(&mut self, id: Value, column: &str) -> Result<bool> {
        self.inner.delete_or_fail(id, column).await
    }

    async fn delete_multiple_by_id(&mut self, ids: &[Value]) -> Result<u64> {
        self.inner.delete_multiple_by_id(ids).await
    }
}
