use crate::error::{ErrorKind, Result};
use crate::events::{Action, RepositoryEvent, SinkHandle, TracingSink};
use crate::traits::{ReadRepository, WriteRepository};
use async_trait::async_trait;
use exn::OptionExt;
use quarry_query::{Columns, PaginationBounds, QueryBuilder, QueryState, Record, Value};
use quarry_store::{Page, Query, SimplePage, StoreHandle};
use std::sync::Arc;
use tracing::instrument;

/// A stateful repository over one data store.
///
/// Fluent [`QueryBuilder`] calls accumulate clauses; each terminal operation
/// snapshots and clears them, builds a fresh store query and runs it. The
/// snapshot is taken before anything executes, so a failed call leaves the
/// repository just as clean as a successful one.
///
/// Repositories are meant to live for one unit of work. Construction only
/// clones a couple of `Arc`s.
pub struct Repository {
    store: StoreHandle,
    events: SinkHandle,
    identity: String,
    state: QueryState,
    pagination: PaginationBounds,
}

impl Repository {
    /// A repository over `store`, identified as `{backend}:{model}`, e.g.
    /// `memory:users`.
    ///
    /// Two stores that report the same backend and model share cache entries.
    /// Give them distinct [`with_identity`](Self::with_identity) values when
    /// they hold different data, e.g. one pool per tenant.
    ///
    /// Fails with [`ErrorKind::ModelMisconfigured`] when the store names no
    /// model or no primary key.
    pub fn new(store: StoreHandle) -> Result<Self> {
        if store.model().trim().is_empty() {
            exn::bail!(ErrorKind::ModelMisconfigured("store has no model name".to_string()));
        }
        if store.primary_key().trim().is_empty() {
            exn::bail!(ErrorKind::ModelMisconfigured(format!("model `{}` has no primary key", store.model())));
        }
        Ok(Self {
            identity: format!("{}:{}", store.backend(), store.model()),
            store,
            events: Arc::new(TracingSink),
            state: QueryState::default(),
            pagination: PaginationBounds::default(),
        })
    }

    pub fn with_events(mut self, events: SinkHandle) -> Self {
        self.events = events;
        self
    }

    /// Override the identity used in notifications and cache keys.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationBounds) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    fn model(&self) -> &str {
        self.store.model()
    }

    /// A store query carrying only the eager loads.
    fn base_query(&self, state: &QueryState) -> Query {
        let mut query = self.store.new_query();
        query.eager_loads.extend(state.eager_loads.iter().cloned());
        query
    }

    /// The full pipeline: eager loads, wheres, where-ins, order-bys, scopes,
    /// then the limit.
    fn build_query(&self, state: QueryState) -> Result<Query> {
        let mut query = self.base_query(&state);
        query.wheres.extend(state.wheres);
        query.where_ins.extend(state.where_ins);
        query.order_bys.extend(state.order_bys);
        let mut query = self.store.scopes().apply_all(query, &state.scopes).map_err(ErrorKind::store)?;
        if let Some(limit) = state.limit {
            query.limit = Some(limit);
        }
        Ok(query)
    }

    /// Snapshot-and-clear, then build the full pipeline.
    fn take_query(&mut self) -> Result<Query> {
        let state = self.state.take();
        self.build_query(state)
    }

    fn publish(&self, action: Action, record: &Record) {
        self.events.publish(RepositoryEvent {
            action,
            repository: self.identity.clone(),
            record: record.clone(),
        });
    }

    fn key_of<'a>(&self, record: &'a Record) -> Result<&'a Value> {
        record
            .get(self.store.primary_key())
            .filter(|key| !key.is_null())
            .ok_or_raise(|| ErrorKind::Store(quarry_store::error::ErrorKind::InvalidData("row without primary key")))
    }
}

fn constraint(column: &str, id: &Value) -> String {
    format!("{column} = {id}")
}

/// Render a pluck key as an object key.
fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl QueryBuilder for Repository {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    fn pagination(&self) -> &PaginationBounds {
        &self.pagination
    }

    fn pagination_mut(&mut self) -> &mut PaginationBounds {
        &mut self.pagination
    }
}

#[async_trait]
impl ReadRepository for Repository {
    fn identity(&self) -> &str {
        &self.identity
    }

    #[instrument(skip_all, fields(repository = %self.identity))]
    async fn all(&mut self, columns: &Columns) -> Result<Vec<Record>> {
        let state = self.state.take();
        let query = self.base_query(&state);
        self.store.get(&query, columns).await.map_err(ErrorKind::store)
    }

    #[instrument(skip_all, fields(repository = %self.identity))]
    async fn get(&mut self, columns: &Columns) -> Result<Vec<Record>> {
        let query = self.take_query()?;
        self.store.get(&query, columns).await.map_err(ErrorKind::store)
    }

    #[instrument(skip_all, fields(repository = %self.identity, ?per_page, page = page))]
    async fn paginate(&mut self, per_page: Option<u64>, columns: &Columns, page_name: &str, page: u64) -> Result<Page> {
        let query = self.take_query()?;
        let per_page = self.pagination.prepare(per_page);
        self.store.paginate(&query, per_page, columns, page_name, page).await.map_err(ErrorKind::store)
    }

    #[instrument(skip_all, fields(repository = %self.identity, ?per_page, page = page))]
    async fn simple_paginate(
        &mut self,
        per_page: Option<u64>,
        columns: &Columns,
        page_name: &str,
        page: u64,
    ) -> Result<SimplePage> {
        let query = self.take_query()?;
        let per_page = self.pagination.prepare(per_page);
        self.store.simple_paginate(&query, per_page, columns, page_name, page).await.map_err(ErrorKind::store)
    }

    #[instrument(skip_all, fields(repository = %self.identity))]
    async fn count(&mut self) -> Result<u64> {
        let query = self.take_query()?;
        self.store.count(&query).await.map_err(ErrorKind::store)
    }

    #[instrument(skip_all, fields(repository = %self.identity, %id, column = %column))]
    async fn find(&mut self, id: Value, columns: &Columns, column: &str) -> Result<Option<Record>> {
        let query = self.take_query()?.filter(column, "=", id);
        self.store.first(&query, columns).await.map_err(ErrorKind::store)
    }

    async fn find_or_fail(&mut self, id: Value, columns: &Columns, column: &str) -> Result<Record> {
        let lookup = constraint(column, &id);
        self.find(id, columns, column)
            .await?
            .ok_or_raise(|| ErrorKind::not_found(self.model(), lookup))
    }

    #[instrument(skip_all, fields(repository = %self.identity))]
    async fn first(&mut self, columns: &Columns) -> Result<Option<Record>> {
        let query = self.take_query()?;
        self.store.first(&query, columns).await.map_err(ErrorKind::store)
    }

    async fn first_or_fail(&mut self, columns: &Columns) -> Result<Record> {
        self.first(columns)
            .await?
            .ok_or_raise(|| ErrorKind::not_found(self.model(), "first matching row"))
    }

    #[instrument(skip_all, fields(repository = %self.identity, column = %column, ?key))]
    async fn pluck(&mut self, column: &str, key: Option<&str>) -> Result<Value> {
        let query = self.take_query()?;
        let columns = match key {
            Some(key) => Columns::only([column, key]),
            None => Columns::only([column]),
        };
        let rows = self.store.get(&query, &columns).await.map_err(ErrorKind::store)?;
        let value_of = |row: &Record| row.get(column).cloned().unwrap_or(Value::Null);
        Ok(match key {
            None => Value::Array(rows.iter().map(value_of).collect()),
            Some(key) => Value::Object(
                rows.iter()
                    .map(|row| (key_string(row.get(key).unwrap_or(&Value::Null)), value_of(row)))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl WriteRepository for Repository {
    #[instrument(skip_all, fields(repository = %self.identity))]
    async fn create(&mut self, data: Record) -> Result<Record> {
        self.state.clear_clauses();
        let record = self.store.create(data).await.map_err(ErrorKind::store)?;
        self.publish(Action::Created, &record);
        Ok(record)
    }

    async fn create_multiple(&mut self, data: Vec<Record>) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(data.len());
        for item in data {
            records.push(self.create(item).await?);
        }
        Ok(records)
    }

    #[instrument(skip_all, fields(repository = %self.identity, %id, column = %column))]
    async fn update(&mut self, id: Value, data: Record, column: &str) -> Result<Option<Record>> {
        self.state.clear_clauses();
        let Some(found) = self.find(id, &Columns::all(), column).await? else {
            return Ok(None);
        };
        let key = self.key_of(&found)?;
        let updated = self.store.update(key, &data).await.map_err(ErrorKind::store)?;
        if let Some(record) = &updated {
            self.publish(Action::Updated, record);
        }
        Ok(updated)
    }

    async fn update_or_fail(&mut self, id: Value, data: Record, column: &str) -> Result<Record> {
        let lookup = constraint(column, &id);
        self.update(id, data, column)
            .await?
            .ok_or_raise(|| ErrorKind::not_found(self.model(), lookup))
    }

    #[instrument(skip_all, fields(repository = %self.identity))]
    async fn update_or_create(&mut self, attributes: Record, values: Record) -> Result<Record> {
        self.state.clear_clauses();
        let record = self.store.update_or_create(&attributes, &values).await.map_err(ErrorKind::store)?;
        self.publish(Action::Updated, &record);
        Ok(record)
    }

    #[instrument(skip_all, fields(repository = %self.identity, %id, column = %column))]
    async fn delete(&mut self, id: Value, column: &str) -> Result<bool> {
        self.state.clear_clauses();
        let Some(found) = self.find(id, &Columns::all(), column).await? else {
            return Ok(false);
        };
        let deleted = self.store.delete(self.key_of(&found)?).await.map_err(ErrorKind::store)?;
        if deleted {
            self.publish(Action::Deleted, &found);
        }
        Ok(deleted)
    }

    async fn delete_or_fail(&mut self, id: Value, column: &str) -> Result<bool> {
        self.state.clear_clauses();
        let found = self.find_or_fail(id, &Columns::all(), column).await?;
        let deleted = self.store.delete(self.key_of(&found)?).await.map_err(ErrorKind::store)?;
        if deleted {
            self.publish(Action::Deleted, &found);
        }
        Ok(deleted)
    }

    #[instrument(skip_all, fields(repository = %self.identity, ids = ids.len()))]
    async fn delete_multiple_by_id(&mut self, ids: &[Value]) -> Result<u64> {
        self.state.clear_clauses();
        self.store.destroy(ids).await.map_err(ErrorKind::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelSink;
    use quarry_query::{Direction, ScopeCall};
    use quarry_store::{DataStore, MemoryStore};
    use rstest::rstest;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn users() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new("users")
                .with_rows([
                    json!({"id": 1, "name": "ada", "age": 36, "active": true}),
                    json!({"id": 2, "name": "grace", "age": 45, "active": true}),
                    json!({"id": 3, "name": "linus", "age": 28, "active": false}),
                    json!({"id": 4, "name": "barbara", "age": 52, "active": true}),
                ])
                .with_scope("active", |query, _| Ok(query.filter("active", "=", true)))
                .with_scope("olderThan", |query, args| {
                    Ok(query.filter("age", ">", args.first().cloned().unwrap_or(Value::Null)))
                })
                .with_scope("oldestFirst", |query, _| Ok(query.order_by("age", Direction::Desc))),
        )
    }

    fn repository() -> (Repository, Arc<MemoryStore>, UnboundedReceiver<RepositoryEvent>) {
        let store = users();
        let (sink, receiver) = ChannelSink::new();
        let repository = Repository::new(store.clone()).unwrap().with_events(Arc::new(sink));
        (repository, store, receiver)
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn names(rows: &[Record]) -> Vec<&str> {
        rows.iter().filter_map(|r| r.get("name").and_then(Value::as_str)).collect()
    }

    #[test]
    fn test_construction_rejects_unusable_store() {
        let err = Repository::new(Arc::new(MemoryStore::new(" "))).err().unwrap();
        assert!(matches!(&*err, ErrorKind::ModelMisconfigured(_)));
        let err = Repository::new(Arc::new(MemoryStore::new("users").with_primary_key(""))).err().unwrap();
        assert!(matches!(&*err, ErrorKind::ModelMisconfigured(_)));
    }

    #[test]
    fn test_identity_defaults_to_backend_and_model() {
        let (repository, ..) = repository();
        assert_eq!(repository.identity(), "memory:users");
        assert_eq!(repository.with_identity("app::UserRepository").identity(), "app::UserRepository");
    }

    #[tokio::test]
    async fn test_get_applies_clauses_and_all_ignores_them() {
        let (mut repository, ..) = repository();
        repository.filter("active", true).order_by("age", Direction::Asc).limit(2);
        assert_eq!(names(&repository.get(&Columns::all()).await.unwrap()), ["ada", "grace"]);

        repository.filter("active", true).limit(1);
        assert_eq!(repository.all(&Columns::all()).await.unwrap().len(), 4);
        assert!(!repository.query_state().has_clauses());
    }

    #[rstest]
    #[case::get("get")]
    #[case::count("count")]
    #[case::first("first")]
    #[case::paginate("paginate")]
    #[case::find("find")]
    #[tokio::test]
    async fn test_clauses_cleared_after_terminal(#[case] terminal: &str) {
        let (mut repository, ..) = repository();
        repository
            .with("posts")
            .extra_query_params(json!({"tab": "recent"}))
            .filter_op("age", ">", 1)
            .where_in("id", json!([1, 2]))
            .order_by("name", Direction::Asc)
            .scope("active", [])
            .limit(5);
        // `posts` isn't a registered relation, so reads that load it fail.
        let _ = match terminal {
            "get" => repository.get(&Columns::all()).await.map(|_| ()),
            "count" => repository.count().await.map(|_| ()),
            "first" => repository.first(&Columns::all()).await.map(|_| ()),
            "paginate" => repository.paginate(None, &Columns::all(), "page", 1).await.map(|_| ()),
            _ => repository.find(json!(1), &Columns::all(), "id").await.map(|_| ()),
        };
        let state = repository.query_state();
        assert!(!state.has_clauses());
        assert_eq!(state.eager_loads, ["posts"]);
        assert_eq!(state.extra, Some(json!({"tab": "recent"})));
    }

    #[tokio::test]
    async fn test_scopes_compose_after_manual_clauses_and_limit_caps_last() {
        let (mut repository, ..) = repository();
        repository
            .order_by("name", Direction::Asc)
            .scopes([ScopeCall::from("active"), ScopeCall::new("olderThan", [json!(40)])])
            .limit(1);
        // Manual sort on name comes first, so the scope's sort is secondary.
        repository.scope("oldestFirst", []);
        let rows = repository.get(&Columns::all()).await.unwrap();
        assert_eq!(names(&rows), ["barbara"]);
    }

    #[tokio::test]
    async fn test_unknown_scope_is_a_store_error() {
        let (mut repository, ..) = repository();
        repository.scope("missing", []);
        let err = repository.get(&Columns::all()).await.unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::Store(quarry_store::error::ErrorKind::UnknownScope("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_count_uses_full_pipeline() {
        let (mut repository, ..) = repository();
        repository.scope("active", []);
        assert_eq!(repository.count().await.unwrap(), 3);
        assert_eq!(repository.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_paginate_ignores_out_of_range_size() {
        let (mut repository, ..) = repository();
        let page = repository.paginate(Some(2), &Columns::all(), "page", 2).await.unwrap();
        assert_eq!((page.per_page, page.total, page.last_page), (2, 4, 2));

        let page = repository.paginate(Some(500), &Columns::all(), "page", 1).await.unwrap();
        assert_eq!(page.per_page, 2);
        assert_eq!(repository.pagination().per_page, 2);

        repository.max_per_page(600);
        let page = repository.simple_paginate(Some(500), &Columns::all(), "p", 1).await.unwrap();
        assert_eq!(page.per_page, 500);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_find_and_find_or_fail() {
        let (mut repository, ..) = repository();
        let found = repository.find(json!(2), &Columns::all(), "id").await.unwrap().unwrap();
        assert_eq!(found["name"], json!("grace"));
        let by_name = repository.find(json!("linus"), &Columns::from(["id"]), "name").await.unwrap();
        assert_eq!(by_name, Some(record(json!({"id": 3}))));

        assert!(repository.find(json!(99), &Columns::all(), "id").await.unwrap().is_none());
        let err = repository.find_or_fail(json!(99), &Columns::all(), "id").await.unwrap_err();
        assert_eq!(*err, ErrorKind::not_found("users", "id = 99"));
    }

    #[tokio::test]
    async fn test_first_or_fail() {
        let (mut repository, ..) = repository();
        repository.order_by("age", Direction::Desc);
        assert_eq!(repository.first_or_fail(&Columns::all()).await.unwrap()["name"], json!("barbara"));
        repository.filter("name", "nobody");
        assert!(repository.first_or_fail(&Columns::all()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_pluck() {
        let (mut repository, ..) = repository();
        repository.filter("active", true).order_by("id", Direction::Asc);
        assert_eq!(repository.pluck("name", None).await.unwrap(), json!(["ada", "grace", "barbara"]));
        repository.where_in("id", json!([1, 3]));
        assert_eq!(repository.pluck("name", Some("id")).await.unwrap(), json!({"1": "ada", "3": "linus"}));
    }

    #[tokio::test]
    async fn test_create_multiple_in_order_with_one_event_each() {
        let (mut repository, _, mut events) = repository();
        let created = repository
            .create_multiple(vec![record(json!({"name": "a"})), record(json!({"name": "b"}))])
            .await
            .unwrap();
        assert_eq!(names(&created), ["a", "b"]);
        assert_eq!(created[0]["id"], json!(5));
        for name in ["a", "b"] {
            let event = events.try_recv().unwrap();
            assert_eq!(event.action, Action::Created);
            assert_eq!(event.repository, "memory:users");
            assert_eq!(event.record["name"], json!(name));
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_clears_pending_clauses() {
        let (mut repository, ..) = repository();
        repository.filter("active", false).limit(1);
        repository.create(record(json!({"name": "edsger"}))).await.unwrap();
        assert!(!repository.query_state().has_clauses());
    }

    #[tokio::test]
    async fn test_update_paths() {
        let (mut repository, store, mut events) = repository();
        let updated = repository.update(json!("ada"), record(json!({"age": 37})), "name").await.unwrap().unwrap();
        assert_eq!(updated["id"], json!(1));
        assert_eq!(updated["age"], json!(37));
        assert_eq!(events.try_recv().unwrap().action, Action::Updated);

        assert!(repository.update(json!(99), record(json!({"age": 1})), "id").await.unwrap().is_none());
        assert!(events.try_recv().is_err());
        let err = repository.update_or_fail(json!(99), record(json!({"age": 1})), "id").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.rows().await.len(), 4);
    }

    #[tokio::test]
    async fn test_update_or_create_always_reports_update() {
        let (mut repository, store, mut events) = repository();
        repository.update_or_create(record(json!({"name": "ada"})), record(json!({"age": 40}))).await.unwrap();
        let created = repository
            .update_or_create(record(json!({"name": "alan"})), record(json!({"age": 41})))
            .await
            .unwrap();
        assert_eq!(created["id"], json!(5));
        assert_eq!(events.try_recv().unwrap().action, Action::Updated);
        assert_eq!(events.try_recv().unwrap().action, Action::Updated);
        assert_eq!(store.rows().await.len(), 5);
    }

    #[tokio::test]
    async fn test_delete_paths() {
        let (mut repository, store, mut events) = repository();
        assert!(repository.delete(json!(1), "id").await.unwrap());
        let event = events.try_recv().unwrap();
        assert_eq!(event.action, Action::Deleted);
        assert_eq!(event.record["name"], json!("ada"));

        assert!(!repository.delete(json!(1), "id").await.unwrap());
        assert!(repository.delete_or_fail(json!(1), "id").await.unwrap_err().is_not_found());
        assert!(repository.delete_or_fail(json!("linus"), "name").await.unwrap());
        assert_eq!(store.count(&Query::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_multiple_by_id_is_silent() {
        let (mut repository, store, mut events) = repository();
        assert_eq!(repository.delete_multiple_by_id(&[json!(1), json!(2), json!(3)]).await.unwrap(), 3);
        assert_eq!(repository.delete_multiple_by_id(&[json!(1), json!(99)]).await.unwrap(), 0);
        assert!(events.try_recv().is_err());
        assert_eq!(store.rows().await.len(), 1);
    }
}
