use crate::clause::{Direction, OrderBy, ScopeCall, Where, WhereIn};
use crate::pagination::PaginationBounds;
use crate::state::QueryState;
use serde_json::Value;

/// One relation name or an ordered list of them.
pub trait IntoRelations {
    fn into_relations(self) -> Vec<String>;
}
impl IntoRelations for &str {
    fn into_relations(self) -> Vec<String> {
        vec![self.to_string()]
    }
}
impl IntoRelations for String {
    fn into_relations(self) -> Vec<String> {
        vec![self]
    }
}
impl<T: Into<String>> IntoRelations for Vec<T> {
    fn into_relations(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}
impl<T: Into<String>, const N: usize> IntoRelations for [T; N] {
    fn into_relations(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

/// Fluent configuration of a pending query.
///
/// Implementors only expose where their [`QueryState`] and
/// [`PaginationBounds`] live; every setter is provided and returns `&mut Self`
/// so calls chain:
///
/// ```
/// use quarry_query::{Direction, PaginationBounds, QueryBuilder, QueryState};
///
/// #[derive(Default)]
/// struct Pending {
///     state: QueryState,
///     pagination: PaginationBounds,
/// }
/// impl QueryBuilder for Pending {
///     fn query_state(&self) -> &QueryState { &self.state }
///     fn query_state_mut(&mut self) -> &mut QueryState { &mut self.state }
///     fn pagination(&self) -> &PaginationBounds { &self.pagination }
///     fn pagination_mut(&mut self) -> &mut PaginationBounds { &mut self.pagination }
/// }
///
/// let mut pending = Pending::default();
/// pending
///     .filter("status", "published")
///     .filter_op("views", ">=", 100)
///     .order_by("published_at", Direction::Desc)
///     .limit(10);
/// assert_eq!(pending.query_state().wheres.len(), 2);
/// ```
pub trait QueryBuilder {
    fn query_state(&self) -> &QueryState;
    fn query_state_mut(&mut self) -> &mut QueryState;
    fn pagination(&self) -> &PaginationBounds;
    fn pagination_mut(&mut self) -> &mut PaginationBounds;

    /// Equality predicate, shorthand for `filter_op(column, "=", value)`.
    fn filter(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.filter_op(column, "=", value)
    }

    /// Append a `column operator value` predicate.
    fn filter_op(&mut self, column: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.query_state_mut().wheres.push(Where::new(column, operator, value));
        self
    }

    /// Append a membership predicate. A non-array value is treated as a
    /// single-element list.
    fn where_in(&mut self, column: impl Into<String>, values: impl Into<Value>) -> &mut Self {
        self.query_state_mut().where_ins.push(WhereIn::new(column, values));
        self
    }

    /// Append a sort key. Repeated columns are kept, not deduplicated.
    fn order_by(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.query_state_mut().order_bys.push(OrderBy::new(column, direction));
        self
    }

    /// Replace the set of relations to eager load.
    fn with(&mut self, relations: impl IntoRelations) -> &mut Self {
        self.query_state_mut().eager_loads = relations.into_relations();
        self
    }

    /// Append a named scope invocation. Scopes run in call order.
    fn scope(&mut self, name: impl Into<String>, args: impl IntoIterator<Item = Value>) -> &mut Self {
        self.query_state_mut().scopes.push(ScopeCall::new(name, args));
        self
    }

    /// Append several scope invocations at once.
    fn scopes(&mut self, calls: impl IntoIterator<Item = impl Into<ScopeCall>>) -> &mut Self {
        self.query_state_mut().scopes.extend(calls.into_iter().map(Into::into));
        self
    }

    /// Cap the number of rows returned.
    fn limit(&mut self, limit: u64) -> &mut Self {
        self.query_state_mut().limit = Some(limit);
        self
    }

    /// Attach opaque data that only affects cache keys. `null` clears it.
    fn extra_query_params(&mut self, extra: impl Into<Value>) -> &mut Self {
        self.query_state_mut().extra = match extra.into() {
            Value::Null => None,
            value => Some(value),
        };
        self
    }

    /// Override the upper bound for requested page sizes.
    fn max_per_page(&mut self, max_per_page: u64) -> &mut Self {
        self.pagination_mut().max_per_page = max_per_page;
        self
    }
}
