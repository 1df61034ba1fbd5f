//! In-memory data store.

use crate::backend::DataStore;
use crate::error::{ErrorKind, Result};
use crate::query::{Operator, Query};
use crate::relation::{Relation, Relations};
use crate::scope::Scopes;
use async_trait::async_trait;
use quarry_query::{Columns, Direction, Record, Value};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

/// In-memory data store.
///
/// Rows are kept in insertion order in a `Vec` behind a [`RwLock`], so all
/// trait methods work on `&self`. Comparison and sorting follow SQLite's
/// rules closely enough for queries to behave the same against either
/// backend: `NULL` sorts first, numbers before strings, `LIKE` is
/// ASCII case-insensitive, and a comparison against `NULL` never matches.
///
/// # Examples
///
/// ```
/// use quarry_query::Columns;
/// use quarry_store::{DataStore, MemoryStore};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new("users")
///     .with_rows([
///         json!({"id": 1, "name": "ada", "active": true}),
///         json!({"id": 2, "name": "grace", "active": false}),
///     ])
///     .with_scope("active", |query, _| Ok(query.filter("active", "=", true)));
///
/// let query = store.scopes().apply(store.new_query(), &"active".into()).unwrap();
/// let rows = store.get(&query, &Columns::all()).await.unwrap();
/// assert_eq!(rows.len(), 1);
/// # }
/// ```
pub struct MemoryStore {
    model: String,
    primary_key: String,
    rows: RwLock<Vec<Record>>,
    scopes: Scopes,
    relations: Relations,
    selects: AtomicUsize,
}

impl MemoryStore {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            primary_key: "id".to_string(),
            rows: RwLock::new(Vec::new()),
            scopes: Scopes::new(),
            relations: Relations::new(),
            selects: AtomicUsize::new(0),
        }
    }

    /// Pre-populate the store. Values that aren't JSON objects are skipped.
    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Value>) -> Self {
        let stored = self.rows.get_mut();
        stored.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(record) => Some(record),
            _ => None,
        }));
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_scope(
        mut self,
        name: impl Into<String>,
        scope: impl Fn(Query, &[Value]) -> Result<Query> + Send + Sync + 'static,
    ) -> Self {
        self.scopes.register(name, scope);
        self
    }

    pub fn with_relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.register(name, relation);
        self
    }

    /// How many times [`select`](DataStore::select) has run against this
    /// store. Lets tests tell whether a read reached the store at all.
    pub fn selects(&self) -> usize {
        self.selects.load(AtomicOrdering::SeqCst)
    }

    /// Copy of every stored row.
    pub async fn rows(&self) -> Vec<Record> {
        self.rows.read().await.clone()
    }

    fn key_of<'a>(&self, row: &'a Record) -> &'a Value {
        row.get(&self.primary_key).unwrap_or(&Value::Null)
    }

    fn next_key(&self, rows: &[Record]) -> Value {
        let max = rows.iter().filter_map(|row| self.key_of(row).as_i64()).max().unwrap_or(0);
        Value::from(max + 1)
    }
}

fn check_column(column: &str) -> Result<()> {
    if column.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidQuery("empty column name".to_string()));
    }
    Ok(())
}

/// Storage-class rank used when two values have different types.
fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Total ordering over stored values.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => match rank(a).cmp(&rank(b)) {
                Ordering::Equal => a.to_string().cmp(&b.to_string()),
                other => other,
            },
        },
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one. ASCII
/// letters match case-insensitively.
fn like(haystack: &str, pattern: &str) -> bool {
    let haystack: Vec<char> = haystack.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let (mut h, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while h < haystack.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, h));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == haystack[h]) {
            h += 1;
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            h = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(u8::from(*b).to_string()),
        _ => None,
    }
}

fn matches_where(row_value: &Value, operator: Operator, value: &Value) -> bool {
    match (row_value.is_null(), value.is_null()) {
        // `= NULL` / `<> NULL` mean IS NULL / IS NOT NULL, as query builders render them.
        (is_null, true) => match operator {
            Operator::Eq => is_null,
            Operator::Ne => !is_null,
            _ => false,
        },
        (true, false) => false,
        (false, false) => match operator {
            Operator::Eq => compare(row_value, value).is_eq(),
            Operator::Ne => compare(row_value, value).is_ne(),
            Operator::Lt => compare(row_value, value).is_lt(),
            Operator::Le => compare(row_value, value).is_le(),
            Operator::Gt => compare(row_value, value).is_gt(),
            Operator::Ge => compare(row_value, value).is_ge(),
            Operator::Like | Operator::NotLike => {
                let (Some(text), Some(pattern)) = (text_of(row_value), text_of(value)) else {
                    return false;
                };
                like(&text, &pattern) == (operator == Operator::Like)
            },
        },
    }
}

fn project(row: &Record, columns: &Columns) -> Record {
    if columns.is_all() {
        return row.clone();
    }
    columns
        .iter()
        .filter_map(|column| row.get(column).map(|value| (column.to_string(), value.clone())))
        .collect()
}

#[async_trait]
impl DataStore for MemoryStore {
    fn model(&self) -> &str {
        &self.model
    }

    fn backend(&self) -> &str {
        "memory"
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    fn relations(&self) -> &Relations {
        &self.relations
    }

    async fn select(&self, query: &Query, columns: &Columns) -> Result<Vec<Record>> {
        self.selects.fetch_add(1, AtomicOrdering::SeqCst);
        let operators = query.operators()?;
        for column in query
            .wheres
            .iter()
            .map(|w| &w.column)
            .chain(query.where_ins.iter().map(|w| &w.column))
            .chain(query.order_bys.iter().map(|o| &o.column))
        {
            check_column(column)?;
        }
        let guard = self.rows.read().await;
        let mut rows: Vec<&Record> = guard
            .iter()
            .filter(|row| {
                query.wheres.iter().zip(&operators).all(|(clause, operator)| {
                    let value = row.get(&clause.column).unwrap_or(&Value::Null);
                    matches_where(value, *operator, &clause.value)
                })
            })
            .filter(|row| {
                query.where_ins.iter().all(|clause| {
                    let value = row.get(&clause.column).unwrap_or(&Value::Null);
                    !value.is_null() && clause.values.iter().any(|v| !v.is_null() && compare(value, v).is_eq())
                })
            })
            .collect();
        // Stable sort: rows that tie on every key keep insertion order.
        rows.sort_by(|a, b| {
            query.order_bys.iter().fold(Ordering::Equal, |ordering, order| {
                ordering.then_with(|| {
                    let a = a.get(&order.column).unwrap_or(&Value::Null);
                    let b = b.get(&order.column).unwrap_or(&Value::Null);
                    match order.direction {
                        Direction::Asc => compare(a, b),
                        Direction::Desc => compare(b, a),
                    }
                })
            })
        });
        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query.limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        Ok(rows.into_iter().skip(offset).take(limit).map(|row| project(row, columns)).collect())
    }

    async fn insert(&self, mut data: Record) -> Result<Record> {
        let mut rows = self.rows.write().await;
        match data.get(&self.primary_key) {
            None | Some(Value::Null) => {
                let key = self.next_key(&rows);
                data.insert(self.primary_key.clone(), key);
            },
            Some(key) => {
                if rows.iter().any(|row| self.key_of(row) == key) {
                    exn::bail!(ErrorKind::Constraint(format!("duplicate {} {key}", self.primary_key)));
                }
            },
        }
        rows.push(data.clone());
        Ok(data)
    }

    async fn update_by_key(&self, key: &Value, data: &Record) -> Result<Option<Record>> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|row| compare(self.key_of(row), key).is_eq()) else {
            return Ok(None);
        };
        row.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Some(row.clone()))
    }

    async fn delete_by_keys(&self, keys: &[Value]) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| {
            let key = self.key_of(row);
            key.is_null() || !keys.iter().any(|k| compare(key, k).is_eq())
        });
        Ok((before - rows.len()) as u64)
    }
}
