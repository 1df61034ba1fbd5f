//! Store-level query plan.
//!
//! A [`Query`] is what a data store actually executes. Repositories build one
//! fresh for every terminal call from their accumulated state; scopes receive
//! one and hand back a modified one.

use crate::error::{ErrorKind, Result};
use quarry_query::{Direction, OrderBy, Value, Where, WhereIn};
use std::fmt;

/// Comparison operators understood by the bundled backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}
impl Operator {
    /// Parse an operator as written by the caller (case-insensitive).
    pub fn parse(operator: &str) -> Result<Self> {
        let operator = match operator.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "like" => Self::Like,
            "not like" => Self::NotLike,
            _ => exn::bail!(ErrorKind::InvalidQuery(format!("operator `{operator}`"))),
        };
        Ok(operator)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}
impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A query against a single model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub eager_loads: Vec<String>,
    pub wheres: Vec<Where>,
    pub where_ins: Vec<WhereIn>,
    pub order_bys: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.eager_loads.push(relation.into());
        self
    }

    pub fn filter(mut self, column: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        self.wheres.push(Where::new(column, operator, value));
        self
    }

    pub fn where_in(mut self, column: impl Into<String>, values: impl Into<Value>) -> Self {
        self.where_ins.push(WhereIn::new(column, values));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_bys.push(OrderBy::new(column, direction));
        self
    }

    pub fn take(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The same predicates without sorting, limit or offset. Used to count
    /// every row a paginated query could reach.
    pub fn unbounded(&self) -> Self {
        Self {
            eager_loads: Vec::new(),
            wheres: self.wheres.clone(),
            where_ins: self.where_ins.clone(),
            order_bys: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Parse every operator up front so malformed queries fail before any
    /// rows are touched.
    pub fn operators(&self) -> Result<Vec<Operator>> {
        self.wheres.iter().map(|w| Operator::parse(&w.operator)).collect()
    }
}
