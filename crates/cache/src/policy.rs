//! When to cache, and for how long.

use crate::error::{Error, ErrorKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const DEFAULT_TTL_SECS: i64 = 10;

/// The read terminal operations a cache can sit in front of.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMethod {
    #[display("all")]
    All,
    #[display("get")]
    Get,
    #[display("paginate")]
    Paginate,
    #[display("simple_paginate")]
    #[serde(alias = "simplePaginate")]
    SimplePaginate,
    #[display("count")]
    Count,
    #[display("find")]
    Find,
    #[display("find_or_fail")]
    #[serde(alias = "findOrFail")]
    FindOrFail,
    #[display("first")]
    First,
    #[display("first_or_fail")]
    #[serde(alias = "firstOrFail")]
    FirstOrFail,
}

impl ReadMethod {
    pub const ALL: [ReadMethod; 9] = [
        Self::All,
        Self::Get,
        Self::Paginate,
        Self::SimplePaginate,
        Self::Count,
        Self::Find,
        Self::FindOrFail,
        Self::First,
        Self::FirstOrFail,
    ];
}

/// Accepts both `snake_case` and `camelCase` names.
impl FromStr for ReadMethod {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized: String = name
            .trim()
            .chars()
            .flat_map(|c| match c.is_ascii_uppercase() {
                true => vec!['_', c.to_ascii_lowercase()],
                false => vec![c],
            })
            .collect();
        Self::ALL
            .into_iter()
            .find(|method| method.to_string() == normalized)
            .ok_or_else(|| Error::from(ErrorKind::UnknownMethod(name.to_string())))
    }
}

/// A shared on/off switch for caching.
///
/// Clones share state: turning one off turns every clone off. Hand a clone to
/// whatever needs to disable caching at runtime (an admin request handler,
/// say) and every repository built from the same policy follows it.
#[derive(Debug, Clone)]
pub struct CacheSwitch(Arc<AtomicBool>);

impl CacheSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }

    pub fn turn_off(&self) {
        self.set(false);
    }

    pub fn turn_on(&self) {
        self.set(true);
    }
}

impl Default for CacheSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Which read methods get cached and for how long.
///
/// A method is cached when the switch is on, `only` is empty or names it, and
/// `except` does not name it. `except` wins over `only`.
///
/// TTLs are whole seconds. Anything `<= 0` means the result is returned but
/// not stored.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub switch: CacheSwitch,
    pub ttl_secs: i64,
    pub ttl_for_method: HashMap<ReadMethod, i64>,
    pub only: HashSet<ReadMethod>,
    pub except: HashSet<ReadMethod>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            switch: CacheSwitch::default(),
            ttl_secs: DEFAULT_TTL_SECS,
            ttl_for_method: HashMap::new(),
            only: HashSet::new(),
            except: HashSet::new(),
        }
    }
}

impl CachePolicy {
    pub fn with_switch(mut self, switch: CacheSwitch) -> Self {
        self.switch = switch;
        self
    }

    pub fn with_ttl(mut self, secs: i64) -> Self {
        self.ttl_secs = secs;
        self
    }

    pub fn with_method_ttl(mut self, method: ReadMethod, secs: i64) -> Self {
        self.ttl_for_method.insert(method, secs);
        self
    }

    pub fn only(mut self, methods: impl IntoIterator<Item = ReadMethod>) -> Self {
        self.only.extend(methods);
        self
    }

    pub fn except(mut self, methods: impl IntoIterator<Item = ReadMethod>) -> Self {
        self.except.extend(methods);
        self
    }

    pub fn allows(&self, method: ReadMethod) -> bool {
        self.switch.is_enabled()
            && (self.only.is_empty() || self.only.contains(&method))
            && !self.except.contains(&method)
    }

    /// How long to keep a result of `method`, or `None` to not store it.
    pub fn ttl_for(&self, method: ReadMethod) -> Option<Duration> {
        let secs = self.ttl_for_method.get(&method).copied().unwrap_or(self.ttl_secs);
        u64::try_from(secs).ok().filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}
