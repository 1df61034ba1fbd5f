use crate::error::{ErrorKind, Result};
use crate::policy::ReadMethod;
use exn::ResultExt;
use quarry_query::{PaginationBounds, QueryState, Value};
use serde::Serialize;
use std::fmt;

/// Everything that decides what a read returns, in a fixed order.
#[derive(Serialize)]
struct KeyMaterial<'a> {
    limit: Option<u64>,
    eager_loads: &'a [String],
    wheres: &'a [quarry_query::Where],
    where_ins: &'a [quarry_query::WhereIn],
    order_bys: &'a [quarry_query::OrderBy],
    scopes: &'a [quarry_query::ScopeCall],
    extra: &'a Option<Value>,
    per_page: u64,
    min_per_page: u64,
    max_per_page: u64,
    args: &'a Value,
}

/// Identifies one read: `{identity}%{method}%{digest}`.
///
/// The digest is a BLAKE3 hash over the JSON encoding of the pending query
/// state, the pagination bounds and the call arguments. Sequences hash in
/// order, so two filters added in a different order give a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(
        identity: &str,
        method: ReadMethod,
        state: &QueryState,
        pagination: &PaginationBounds,
        args: &Value,
    ) -> Result<Self> {
        let material = KeyMaterial {
            limit: state.limit,
            eager_loads: &state.eager_loads,
            wheres: &state.wheres,
            where_ins: &state.where_ins,
            order_bys: &state.order_bys,
            scopes: &state.scopes,
            extra: &state.extra,
            per_page: pagination.per_page,
            min_per_page: pagination.min_per_page,
            max_per_page: pagination.max_per_page,
            args,
        };
        let bytes = serde_json::to_vec(&material).or_raise(|| ErrorKind::Serialization)?;
        Ok(Self(format!("{identity}%{method}%{}", blake3::hash(&bytes).to_hex())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_query::{Direction, OrderBy, ScopeCall, Where, WhereIn};
    use serde_json::json;

    fn state() -> QueryState {
        QueryState {
            limit: Some(5),
            eager_loads: vec!["posts".to_string()],
            wheres: vec![Where::new("a", "=", 1), Where::new("b", ">", 2)],
            where_ins: vec![WhereIn::new("id", json!([1, 2]))],
            order_bys: vec![OrderBy::new("a", Direction::Asc)],
            scopes: vec![ScopeCall::from("active")],
            extra: None,
        }
    }

    fn key(state: &QueryState, method: ReadMethod, args: Value) -> CacheKey {
        CacheKey::derive("users", method, state, &PaginationBounds::default(), &args).unwrap()
    }

    #[test]
    fn test_same_inputs_same_key() {
        assert_eq!(key(&state(), ReadMethod::Get, json!([["*"]])), key(&state(), ReadMethod::Get, json!([["*"]])));
    }

    #[test]
    fn test_key_format() {
        let key = key(&state(), ReadMethod::FindOrFail, json!([1]));
        let parts: Vec<_> = key.as_str().split('%').collect();
        assert_eq!(parts[..2], ["users", "find_or_fail"]);
        assert_eq!(parts[2].len(), 64);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_where_order_matters() {
        let mut swapped = state();
        swapped.wheres.reverse();
        assert_ne!(key(&state(), ReadMethod::Get, json!([])), key(&swapped, ReadMethod::Get, json!([])));
    }

    #[test]
    fn test_every_input_changes_the_key() {
        let base = key(&state(), ReadMethod::Get, json!([]));
        let mut changed = Vec::new();

        let mut s = state();
        s.limit = Some(6);
        changed.push(key(&s, ReadMethod::Get, json!([])));
        let mut s = state();
        s.eager_loads.clear();
        changed.push(key(&s, ReadMethod::Get, json!([])));
        let mut s = state();
        s.where_ins[0] = WhereIn::new("id", json!([2, 1]));
        changed.push(key(&s, ReadMethod::Get, json!([])));
        let mut s = state();
        s.order_bys[0] = OrderBy::new("a", Direction::Desc);
        changed.push(key(&s, ReadMethod::Get, json!([])));
        let mut s = state();
        s.scopes.push(ScopeCall::new("olderThan", [json!(3)]));
        changed.push(key(&s, ReadMethod::Get, json!([])));
        let mut s = state();
        s.extra = Some(json!("tab=recent"));
        changed.push(key(&s, ReadMethod::Get, json!([])));
        changed.push(key(&state(), ReadMethod::First, json!([])));
        changed.push(key(&state(), ReadMethod::Get, json!([["id"]])));
        let bounds = PaginationBounds {
            max_per_page: 20,
            ..PaginationBounds::default()
        };
        changed.push(CacheKey::derive("users", ReadMethod::Get, &state(), &bounds, &json!([])).unwrap());
        changed.push(CacheKey::derive("posts", ReadMethod::Get, &state(), &PaginationBounds::default(), &json!([])).unwrap());

        for other in changed {
            assert_ne!(base, other);
        }
    }
}
