use quarry::config::{CacheStoreKind, Config};
use quarry::prelude::*;
use quarry::repository::{Action, ChannelSink};
use quarry::store::{DataStore, MemoryStore, Query};
use serde_json::json;
use std::sync::Arc;

fn posts() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new("posts")
            .with_rows([
                json!({"id": 1, "title": "Alpha", "status": "published", "views": 120}),
                json!({"id": 2, "title": "Beta", "status": "draft", "views": 5}),
                json!({"id": 3, "title": "Gamma", "status": "published", "views": 40}),
                json!({"id": 4, "title": "Delta", "status": "published", "views": 300}),
            ])
            .with_scope("published", |query: Query, _args: &[Value]| Ok(query.filter("status", "=", "published")))
            .with_scope("popular", |query: Query, args: &[Value]| {
                let threshold = args.first().cloned().unwrap_or(json!(100));
                Ok(query.filter("views", ">=", threshold))
            }),
    )
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

#[tokio::test]
async fn test_repeated_reads_hit_the_cache() {
    let store = posts();
    let factory = RepositoryFactory::new();
    let mut repository = factory.cached(store.clone()).unwrap();

    let first = repository.scope("published", []).order_by("views", Direction::Desc).get(&Columns::all()).await.unwrap();
    assert_eq!(store.selects(), 1);
    let second = repository.scope("published", []).order_by("views", Direction::Desc).get(&Columns::all()).await.unwrap();
    assert_eq!(store.selects(), 1);
    assert_eq!(first, second);
    assert_eq!(first.iter().map(|row| row["id"].clone()).collect::<Vec<_>>(), vec![json!(4), json!(1), json!(3)]);

    // The clause state was cleared by the hit as well.
    assert!(repository.query_state().scopes.is_empty());
    assert_eq!(repository.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_repositories_from_one_factory_share_the_cache() {
    let store = posts();
    let factory = RepositoryFactory::new();

    let mut one = factory.cached(store.clone()).unwrap();
    one.scope("popular", [json!(100)]).count().await.unwrap();
    let mut two = factory.cached(store.clone()).unwrap();
    assert_eq!(two.scope("popular", [json!(100)]).count().await.unwrap(), 2);
    assert_eq!(store.selects(), 1);

    // Different scope arguments are a different query.
    assert_eq!(two.scope("popular", [json!(10)]).count().await.unwrap(), 3);
    assert_eq!(store.selects(), 2);
}

#[tokio::test]
async fn test_switch_turns_caching_off_everywhere() {
    let store = posts();
    let factory = RepositoryFactory::new();
    let switch = factory.switch();
    let mut repository = factory.cached(store.clone()).unwrap();

    repository.all(&Columns::all()).await.unwrap();
    repository.all(&Columns::all()).await.unwrap();
    assert_eq!(store.selects(), 1);

    switch.turn_off();
    repository.all(&Columns::all()).await.unwrap();
    repository.all(&Columns::all()).await.unwrap();
    assert_eq!(store.selects(), 3);

    switch.turn_on();
    repository.all(&Columns::all()).await.unwrap();
    assert_eq!(store.selects(), 3);
}

#[tokio::test]
async fn test_file_cache_survives_the_factory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.cache.store = CacheStoreKind::File;
    config.cache.path = Some(temp_dir.path().to_path_buf());
    config.cache.time = 300;
    let store = posts();

    let mut repository = RepositoryFactory::from_config(&config).unwrap().cached(store.clone()).unwrap();
    let found = repository.find_or_fail(json!(3), &Columns::from(["id", "title"]), "id").await.unwrap();
    assert_eq!(found, record(json!({"id": 3, "title": "Gamma"})));

    let mut repository = RepositoryFactory::from_config(&config).unwrap().cached(store.clone()).unwrap();
    let again = repository.find_or_fail(json!(3), &Columns::from(["id", "title"]), "id").await.unwrap();
    assert_eq!(again, found);
    assert_eq!(store.selects(), 1);
}

#[tokio::test]
async fn test_configured_exceptions_and_pagination() {
    let mut config = Config::default();
    config.cache.except = vec!["paginate".to_string()];
    config.pagination.per_page = 2;
    config.pagination.max_per_page = 3;
    let store = posts();
    let mut repository = RepositoryFactory::from_config(&config).unwrap().cached(store.clone()).unwrap();

    let page = repository.paginate(None, &Columns::all(), "page", 2).await.unwrap();
    assert_eq!((page.per_page, page.total, page.last_page), (2, 4, 2));
    let selects = store.selects();
    repository.paginate(None, &Columns::all(), "page", 2).await.unwrap();
    assert!(store.selects() > selects);

    // 50 is above the configured maximum and is ignored.
    let page = repository.simple_paginate(Some(50), &Columns::all(), "page", 1).await.unwrap();
    assert_eq!(page.per_page, 2);
    assert!(page.has_more);
}

#[tokio::test]
async fn test_writes_notify_and_leave_cached_reads_alone() {
    let store = posts();
    let (sink, mut events) = ChannelSink::new();
    let factory = RepositoryFactory::new().with_events(Arc::new(sink));
    let mut repository = factory.cached(store.clone()).unwrap();

    assert_eq!(repository.count().await.unwrap(), 4);
    let created = repository
        .create_multiple(vec![record(json!({"title": "Epsilon"})), record(json!({"title": "Zeta"}))])
        .await
        .unwrap();
    assert_eq!(created.iter().map(|row| row["id"].clone()).collect::<Vec<_>>(), vec![json!(5), json!(6)]);
    for expected in ["Epsilon", "Zeta"] {
        let event = events.recv().await.unwrap();
        assert_eq!(event.action, Action::Created);
        assert_eq!(event.repository, "memory:posts");
        assert_eq!(event.record["title"], json!(expected));
    }

    // Cached reads are not invalidated by writes.
    assert_eq!(repository.count().await.unwrap(), 4);
    assert_eq!(repository.inner().store().count(&Query::default()).await.unwrap(), 6);

    assert_eq!(repository.delete_multiple_by_id(&[json!(5), json!(6), json!(99)]).await.unwrap(), 2);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_uncached_repository_when_store_is_none() {
    let mut config = Config::default();
    config.cache.store = CacheStoreKind::None;
    let factory = RepositoryFactory::from_config(&config).unwrap();
    assert!(factory.cached(posts()).is_err());

    let store = posts();
    let mut repository = factory.repository(store.clone()).unwrap();
    assert!(repository.find(json!(42), &Columns::all(), "id").await.unwrap().is_none());
    let err = repository.find_or_fail(json!(42), &Columns::all(), "id").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.selects(), 2);
}
