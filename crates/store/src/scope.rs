//! Named scope registry.

use crate::error::{ErrorKind, Result};
use crate::query::Query;
use quarry_query::{ScopeCall, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A reusable query modification, invoked by name with positional arguments.
pub type ScopeFn = Arc<dyn Fn(Query, &[Value]) -> Result<Query> + Send + Sync>;

/// Scopes registered for one model.
#[derive(Clone, Default)]
pub struct Scopes {
    scopes: HashMap<String, ScopeFn>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a scope under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        scope: impl Fn(Query, &[Value]) -> Result<Query> + Send + Sync + 'static,
    ) -> &mut Self {
        self.scopes.insert(name.into(), Arc::new(scope));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Apply one scope invocation to `query`.
    pub fn apply(&self, query: Query, call: &ScopeCall) -> Result<Query> {
        let Some(scope) = self.scopes.get(&call.name) else {
            exn::bail!(ErrorKind::UnknownScope(call.name.clone()));
        };
        scope(query, &call.args)
    }

    /// Apply invocations in order; each scope sees the output of the previous one.
    pub fn apply_all<'a>(&self, query: Query, calls: impl IntoIterator<Item = &'a ScopeCall>) -> Result<Query> {
        calls.into_iter().try_fold(query, |query, call| self.apply(query, call))
    }
}

impl fmt::Debug for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.scopes.keys().collect();
        names.sort();
        f.debug_tuple("Scopes").field(&names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_query::Direction;
    use serde_json::json;

    fn registry() -> Scopes {
        let mut scopes = Scopes::new();
        scopes
            .register("active", |query, _| Ok(query.filter("active", "=", true)))
            .register("olderThan", |query, args| {
                let age = args.first().cloned().unwrap_or(Value::Null);
                Ok(query.filter("age", ">", age))
            })
            .register("latest", |query, _| Ok(query.order_by("created_at", Direction::Desc)));
        scopes
    }

    #[test]
    fn test_apply_passes_arguments() {
        let query = registry()
            .apply(Query::default(), &ScopeCall::new("olderThan", [json!(30)]))
            .unwrap();
        assert_eq!(query.wheres[0].value, json!(30));
    }

    #[test]
    fn test_apply_all_keeps_call_order() {
        let calls = [ScopeCall::from("active"), ScopeCall::new("olderThan", [json!(18)])];
        let query = registry().apply_all(Query::default(), &calls).unwrap();
        let columns: Vec<_> = query.wheres.iter().map(|w| w.column.as_str()).collect();
        assert_eq!(columns, ["active", "age"]);
    }

    #[test]
    fn test_unknown_scope() {
        let err = registry().apply(Query::default(), &ScopeCall::from("missing")).unwrap_err();
        assert_eq!(*err, ErrorKind::UnknownScope("missing".to_string()));
    }

    #[test]
    fn test_debug_lists_names() {
        assert_eq!(format!("{:?}", registry()), r#"Scopes(["active", "latest", "olderThan"])"#);
    }
}
