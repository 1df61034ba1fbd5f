//! SQLite data store.

use crate::backend::DataStore;
use crate::error::{ErrorKind, Result};
use crate::query::{Operator, Query};
use crate::relation::{Relation, Relations};
use crate::scope::Scopes;
use async_trait::async_trait;
use exn::ResultExt;
use quarry_query::{Columns, Direction, Record, Value};
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Column, QueryBuilder, Row, Sqlite, SqliteConnection, TypeInfo, ValueRef};
use std::path::Path;
use tracing::instrument;

const MAX_CONNECTIONS: u32 = 5;

/// A data store backed by one SQLite table.
///
/// The table must already exist; this store never creates or migrates
/// schema. Several stores can share one pool (see [`from_pool`](Self::from_pool)),
/// which is how relations between tables are usually wired up.
///
/// Column and table names are validated as plain identifiers before they are
/// quoted into SQL, and every value is bound as a parameter.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    location: String,
    table: String,
    primary_key: String,
    scopes: Scopes,
    relations: Relations,
}

impl SqliteStore {
    async fn open(options: SqliteConnectOptions, max: Option<u32>) -> Result<SqlitePool> {
        SqlitePoolOptions::new()
            // Run per-connection PRAGMAs on every pooled connection, not just the first.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Open (creating if missing) the database at `path` and serve `table` from it.
    pub async fn connect(path: impl AsRef<Path>, table: impl Into<String>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        let mut store = Self::from_pool(Self::open(options, None).await?, table)?;
        store.location = format!("sqlite:{}", path.as_ref().display());
        Ok(store)
    }

    /// Serve `table` from a fresh in-memory database.
    ///
    /// The pool is limited to one connection; parallel connections to
    /// `:memory:` would each see their own empty database.
    pub async fn connect_in_memory(table: impl Into<String>) -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        let mut store = Self::from_pool(Self::open(options, Some(1)).await?, table)?;
        store.location = "sqlite::memory:".to_string();
        Ok(store)
    }

    /// Serve `table` from an existing pool. The store reports its backend as
    /// plain `sqlite`, since the pool does not say which database it opened.
    pub fn from_pool(pool: SqlitePool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        identifier(&table)?;
        Ok(Self {
            pool,
            location: "sqlite".to_string(),
            table,
            primary_key: "id".to_string(),
            scopes: Scopes::new(),
            relations: Relations::new(),
        })
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA temp_store = MEMORY;
                PRAGMA cache_size = -8192;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Result<Self> {
        let primary_key = primary_key.into();
        identifier(&primary_key)?;
        self.primary_key = primary_key;
        Ok(self)
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

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool once every connection has been returned to it.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }

    /// `SELECT ... FROM table WHERE ... ORDER BY ... LIMIT ... OFFSET ...`
    fn build_select(&self, query: &Query, columns: &Columns) -> Result<QueryBuilder<'static, Sqlite>> {
        let mut sql = QueryBuilder::new("SELECT ");
        if columns.is_all() {
            sql.push("*");
        } else {
            let mut list = sql.separated(", ");
            for column in columns.iter() {
                list.push(identifier(column)?);
            }
        }
        sql.push(" FROM ").push(identifier(&self.table)?);
        push_predicates(&mut sql, query)?;
        if !query.order_bys.is_empty() {
            sql.push(" ORDER BY ");
            let mut list = sql.separated(", ");
            for order in &query.order_bys {
                let direction = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                list.push(format!("{} {direction}", identifier(&order.column)?));
            }
        }
        match (query.limit, query.offset) {
            (None, None) => {},
            (limit, offset) => {
                // SQLite needs a LIMIT before any OFFSET; -1 means unbounded.
                let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
                sql.push(" LIMIT ").push_bind(limit);
                if let Some(offset) = offset {
                    sql.push(" OFFSET ").push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
                }
            },
        }
        Ok(sql)
    }
}

/// Validate `name` as a (possibly dotted) SQL identifier and quote it.
fn identifier(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        exn::bail!(ErrorKind::InvalidQuery(format!("identifier `{name}`")));
    }
    Ok(name.split('.').map(|part| format!("\"{part}\"")).collect::<Vec<_>>().join("."))
}

fn push_value(sql: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => sql.push_bind(None::<i64>),
        Value::Bool(b) => sql.push_bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => sql.push_bind(i),
            None => sql.push_bind(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => sql.push_bind(s.clone()),
        // Nested values are stored as JSON text.
        other => sql.push_bind(other.to_string()),
    };
}

fn conjunction(sql: &mut QueryBuilder<'_, Sqlite>, first: &mut bool) {
    sql.push(if *first { " WHERE " } else { " AND " });
    *first = false;
}

fn push_predicates(sql: &mut QueryBuilder<'_, Sqlite>, query: &Query) -> Result<()> {
    let operators = query.operators()?;
    let mut first = true;
    for (clause, operator) in query.wheres.iter().zip(operators) {
        conjunction(sql, &mut first);
        sql.push(identifier(&clause.column)?);
        match (operator, clause.value.is_null()) {
            (Operator::Eq, true) => {
                sql.push(" IS NULL");
            },
            (Operator::Ne, true) => {
                sql.push(" IS NOT NULL");
            },
            (operator, _) => {
                sql.push(format!(" {} ", operator.as_sql()));
                push_value(sql, &clause.value);
            },
        }
    }
    for clause in &query.where_ins {
        conjunction(sql, &mut first);
        if clause.values.is_empty() {
            sql.push("0 = 1");
            continue;
        }
        sql.push(identifier(&clause.column)?).push(" IN (");
        for (i, value) in clause.values.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            push_value(sql, value);
        }
        sql.push(")");
    }
    Ok(())
}

/// Turn a row into a record, mapping each SQLite storage class onto JSON.
fn decode(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i).or_raise(|| ErrorKind::InvalidData("column"))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(i).or_raise(|| ErrorKind::InvalidData("integer"))?),
                "REAL" => Value::from(row.try_get_unchecked::<f64, _>(i).or_raise(|| ErrorKind::InvalidData("real"))?),
                "TEXT" => Value::from(row.try_get_unchecked::<String, _>(i).or_raise(|| ErrorKind::InvalidData("text"))?),
                "BLOB" => exn::bail!(ErrorKind::InvalidData("blob column")),
                // Declared affinities (BOOLEAN, NUMERIC, DATETIME, ...): take the first reading that fits.
                _ => row
                    .try_get_unchecked::<i64, _>(i)
                    .map(Value::from)
                    .or_else(|_| row.try_get_unchecked::<f64, _>(i).map(Value::from))
                    .or_else(|_| row.try_get_unchecked::<String, _>(i).map(Value::from))
                    .or_raise(|| ErrorKind::InvalidData("unsupported column type"))?,
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Attach a database failure, telling constraint violations apart.
fn raise<T>(result: sqlx::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = match &err {
                sqlx::Error::Database(db)
                    if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() =>
                {
                    ErrorKind::Constraint(db.message().to_string())
                },
                _ => ErrorKind::Database,
            };
            Err(err).or_raise(|| kind)
        },
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    fn model(&self) -> &str {
        &self.table
    }

    fn backend(&self) -> &str {
        &self.location
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

    #[instrument(level = "trace", skip_all, fields(table = %self.table))]
    async fn select(&self, query: &Query, columns: &Columns) -> Result<Vec<Record>> {
        let mut sql = self.build_select(query, columns)?;
        let rows = raise(sql.build().fetch_all(&self.pool).await)?;
        rows.iter().map(decode).collect()
    }

    /// `COUNT(*)` over the windowed query, so a limit still caps the count.
    #[instrument(level = "trace", skip_all, fields(table = %self.table))]
    async fn count(&self, query: &Query) -> Result<u64> {
        let inner = Query { order_bys: Vec::new(), ..query.clone() };
        let mut sql = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT 1 FROM ");
        sql.push(identifier(&self.table)?);
        push_predicates(&mut sql, &inner)?;
        if inner.limit.is_some() || inner.offset.is_some() {
            let limit = inner.limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
            sql.push(" LIMIT ").push_bind(limit);
            sql.push(" OFFSET ").push_bind(i64::try_from(inner.offset.unwrap_or(0)).unwrap_or(i64::MAX));
        }
        sql.push(")");
        let row = raise(sql.build().fetch_one(&self.pool).await)?;
        let count: i64 = row.try_get(0).or_raise(|| ErrorKind::InvalidData("count"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(level = "trace", skip_all, fields(table = %self.table))]
    async fn insert(&self, data: Record) -> Result<Record> {
        let mut sql = QueryBuilder::new("INSERT INTO ");
        sql.push(identifier(&self.table)?);
        if data.is_empty() {
            sql.push(" DEFAULT VALUES");
        } else {
            sql.push(" (");
            let mut list = sql.separated(", ");
            for column in data.keys() {
                list.push(identifier(column)?);
            }
            sql.push(") VALUES (");
            for (i, value) in data.values().enumerate() {
                if i > 0 {
                    sql.push(", ");
                }
                push_value(&mut sql, value);
            }
            sql.push(")");
        }
        sql.push(" RETURNING *");
        let row = raise(sql.build().fetch_one(&self.pool).await)?;
        decode(&row)
    }

    #[instrument(level = "trace", skip_all, fields(table = %self.table))]
    async fn update_by_key(&self, key: &Value, data: &Record) -> Result<Option<Record>> {
        if data.is_empty() {
            let query = Query::default().filter(self.primary_key.clone(), "=", key.clone()).take(1);
            return Ok(self.select(&query, &Columns::all()).await?.into_iter().next());
        }
        let mut sql = QueryBuilder::new("UPDATE ");
        sql.push(identifier(&self.table)?).push(" SET ");
        for (i, (column, value)) in data.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push(identifier(column)?).push(" = ");
            push_value(&mut sql, value);
        }
        sql.push(" WHERE ").push(identifier(&self.primary_key)?).push(" = ");
        push_value(&mut sql, key);
        sql.push(" RETURNING *");
        let row = raise(sql.build().fetch_optional(&self.pool).await)?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(level = "trace", skip_all, fields(table = %self.table))]
    async fn delete_by_keys(&self, keys: &[Value]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut sql = QueryBuilder::new("DELETE FROM ");
        sql.push(identifier(&self.table)?).push(" WHERE ").push(identifier(&self.primary_key)?).push(" IN (");
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            push_value(&mut sql, key);
        }
        sql.push(")");
        let result = raise(sql.build().execute(&self.pool).await)?;
        Ok(result.rows_affected())
    }
}
