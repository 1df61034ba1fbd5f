//! Clause types, stored exactly as the caller configured them.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A comparison predicate: `column operator value`.
///
/// The operator is kept as written (`"="`, `">="`, `"like"`, ...). Whether it
/// means anything is for the data store to decide when the query executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub column: String,
    pub operator: String,
    pub value: Value,
}
impl Where {
    pub fn new(column: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A membership predicate: `column IN (values...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereIn {
    pub column: String,
    pub values: Vec<Value>,
}
impl WhereIn {
    /// Arrays become the value list; any other value becomes a one-element list.
    pub fn new(column: impl Into<String>, values: impl Into<Value>) -> Self {
        let values = match values.into() {
            Value::Array(values) => values,
            scalar => vec![scalar],
        };
        Self { column: column.into(), values }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

/// One sort key. Multiple keys compose in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}
impl OrderBy {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self { column: column.into(), direction }
    }
}

/// A named scope invocation with its positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeCall {
    pub name: String,
    pub args: Vec<Value>,
}
impl ScopeCall {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}
impl From<&str> for ScopeCall {
    fn from(name: &str) -> Self {
        Self::new(name, [])
    }
}
impl From<String> for ScopeCall {
    fn from(name: String) -> Self {
        Self::new(name, [])
    }
}
impl<S: Into<String>> From<(S, Vec<Value>)> for ScopeCall {
    fn from((name, args): (S, Vec<Value>)) -> Self {
        Self::new(name, args)
    }
}

/// Column projection for a read. Defaults to every column (`*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Columns(Vec<String>);
impl Columns {
    pub fn all() -> Self {
        Self(vec!["*".to_string()])
    }

    pub fn only(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        match columns.is_empty() {
            true => Self::all(),
            false => Self(columns),
        }
    }

    /// Whether this projection selects every column.
    pub fn is_all(&self) -> bool {
        self.0.iter().any(|c| c == "*")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
impl Default for Columns {
    fn default() -> Self {
        Self::all()
    }
}
impl<const N: usize> From<[&str; N]> for Columns {
    fn from(columns: [&str; N]) -> Self {
        Self::only(columns)
    }
}
impl From<Vec<String>> for Columns {
    fn from(columns: Vec<String>) -> Self {
        Self::only(columns)
    }
}
