//! Relations and batched eager loading.
//!
//! A relation links rows of one store to rows of another by a pair of key
//! columns. Eager loading a relation runs exactly one extra `where_in` query
//! against the related store, however many parent rows there are, and
//! attaches the matches to each parent under the relation's name.

use crate::backend::DataStore;
use crate::error::{ErrorKind, Result};
use crate::query::Query;
use futures::future::try_join_all;
use quarry_query::{Columns, Record, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cardinality {
    One,
    Many,
}

/// How the rows of a related store attach to parent rows.
#[derive(Clone)]
pub struct Relation {
    store: Arc<dyn DataStore>,
    /// Column on the related rows.
    related_key: String,
    /// Column on the parent rows.
    parent_key: String,
    cardinality: Cardinality,
}

impl Relation {
    /// Every related row whose `foreign_key` equals the parent's `local_key`.
    pub fn has_many(store: Arc<dyn DataStore>, foreign_key: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self {
            store,
            related_key: foreign_key.into(),
            parent_key: local_key.into(),
            cardinality: Cardinality::Many,
        }
    }

    /// The first related row whose `foreign_key` equals the parent's `local_key`.
    pub fn has_one(store: Arc<dyn DataStore>, foreign_key: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::One,
            ..Self::has_many(store, foreign_key, local_key)
        }
    }

    /// The related row whose `owner_key` equals the parent's `foreign_key`.
    pub fn belongs_to(store: Arc<dyn DataStore>, foreign_key: impl Into<String>, owner_key: impl Into<String>) -> Self {
        Self {
            store,
            related_key: owner_key.into(),
            parent_key: foreign_key.into(),
            cardinality: Cardinality::One,
        }
    }

    async fn fetch(&self, parents: &[Record]) -> Result<Vec<Record>> {
        let mut keys: Vec<Value> = Vec::new();
        for key in parents.iter().filter_map(|p| p.get(&self.parent_key)) {
            if !key.is_null() && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::default().where_in(self.related_key.clone(), keys);
        self.store.select(&query, &Columns::all()).await
    }

    fn attach(&self, name: &str, parents: &mut [Record], related: &[Record]) {
        for parent in parents.iter_mut() {
            let key = parent.get(&self.parent_key).filter(|k| !k.is_null()).cloned();
            let mut matches = related
                .iter()
                .filter(|r| key.is_some() && r.get(&self.related_key) == key.as_ref())
                .cloned()
                .map(Value::Object);
            let value = match self.cardinality {
                Cardinality::Many => Value::Array(matches.collect()),
                Cardinality::One => matches.next().unwrap_or(Value::Null),
            };
            parent.insert(name.to_string(), value);
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("model", &self.store.model())
            .field("related_key", &self.related_key)
            .field("parent_key", &self.parent_key)
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

/// Relations registered for one model.
#[derive(Clone, Debug, Default)]
pub struct Relations {
    relations: HashMap<String, Relation>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, relation: Relation) -> &mut Self {
        self.relations.insert(name.into(), relation);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Load every named relation for `rows` and attach the results.
    ///
    /// All names are resolved before any query runs, so an unknown relation
    /// fails without touching the related stores.
    pub async fn eager_load(&self, names: &[String], rows: &mut [Record]) -> Result<()> {
        if names.is_empty() || rows.is_empty() {
            return Ok(());
        }
        let relations = names
            .iter()
            .map(|name| match self.relations.get(name) {
                Some(relation) => Ok((name.as_str(), relation)),
                None => Err(exn::Exn::from(ErrorKind::UnknownRelation(name.clone()))),
            })
            .collect::<Result<Vec<_>>>()?;
        let parents: &[Record] = &*rows;
        let loaded = try_join_all(relations.iter().map(|(_, relation)| relation.fetch(parents))).await?;
        for ((name, relation), related) in relations.iter().zip(loaded) {
            relation.attach(name, rows, &related);
        }
        tracing::trace!(relations = ?names, parents = rows.len(), "eager loaded relations");
        Ok(())
    }
}
