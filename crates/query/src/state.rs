use crate::clause::{OrderBy, ScopeCall, Where, WhereIn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything configured on a repository since its last terminal call.
///
/// Clause fields (`wheres`, `where_ins`, `order_bys`, `scopes`, `limit`) live
/// for exactly one terminal call. `eager_loads` and `extra` survive: they
/// describe the shape of results rather than which rows are selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub limit: Option<u64>,
    pub eager_loads: Vec<String>,
    pub wheres: Vec<Where>,
    pub where_ins: Vec<WhereIn>,
    pub order_bys: Vec<OrderBy>,
    pub scopes: Vec<ScopeCall>,
    /// Opaque caller data. Only ever used to tell cache keys apart.
    pub extra: Option<Value>,
}

impl QueryState {
    /// Take the state for one terminal call.
    ///
    /// The returned snapshot holds everything that was configured; `self` is
    /// left with only the persistent fields. Taking the snapshot *before*
    /// executing means the clauses are gone whether execution succeeds or not.
    pub fn take(&mut self) -> QueryState {
        QueryState {
            limit: self.limit.take(),
            eager_loads: self.eager_loads.clone(),
            wheres: std::mem::take(&mut self.wheres),
            where_ins: std::mem::take(&mut self.where_ins),
            order_bys: std::mem::take(&mut self.order_bys),
            scopes: std::mem::take(&mut self.scopes),
            extra: self.extra.clone(),
        }
    }

    /// Drop all clause state, keeping eager loads and extra parameters.
    pub fn clear_clauses(&mut self) {
        _ = self.take();
    }

    /// Whether any clause is pending (eager loads and extras don't count).
    pub fn has_clauses(&self) -> bool {
        self.limit.is_some()
            || !self.wheres.is_empty()
            || !self.where_ins.is_empty()
            || !self.order_bys.is_empty()
            || !self.scopes.is_empty()
    }
}
