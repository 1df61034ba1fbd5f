use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use quarry_cache::{CacheHandle, CachePolicy, CacheSwitch, DEFAULT_TTL_SECS, FileCache, MemoryCache, ReadMethod};
use quarry_query::{DEFAULT_MAX_PER_PAGE, DEFAULT_MIN_PER_PAGE, DEFAULT_PER_PAGE, PaginationBounds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub(crate) const APPLICATION: &str = "quarry";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub pagination: PaginationConfig,
}

/// Which cache store backs cached repositories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStoreKind {
    #[default]
    Memory,
    File,
    /// Repositories are built without a cache.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub store: CacheStoreKind,
    /// Root directory of the file store. Defaults to the platform cache
    /// directory.
    pub path: Option<PathBuf>,
    /// Default TTL in seconds. `<= 0` disables storing.
    pub time: i64,
    /// Start with caching switched off.
    pub off: bool,
    /// Per-method TTL overrides, keyed by read method name.
    pub time_for_method: BTreeMap<String, i64>,
    pub only: Vec<String>,
    pub except: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: CacheStoreKind::default(),
            path: None,
            time: DEFAULT_TTL_SECS,
            off: false,
            time_for_method: BTreeMap::new(),
            only: Vec::new(),
            except: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub per_page: u64,
    pub min_per_page: u64,
    pub max_per_page: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            min_per_page: DEFAULT_MIN_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
        }
    }
}

fn parse_method(field: &str, name: &str) -> Result<ReadMethod> {
    name.parse::<ReadMethod>()
        .or_raise(|| ErrorKind::Invalid(format!("{field}: unknown read method \"{name}\"")))
}

impl Config {
    /// Check every value that deserialized fine but can't be used.
    pub fn validate(&self) -> Result<()> {
        let pagination = &self.pagination;
        if pagination.min_per_page == 0 {
            exn::bail!(ErrorKind::Invalid("pagination.min_per_page must be at least 1".to_string()));
        }
        if pagination.min_per_page > pagination.max_per_page {
            exn::bail!(ErrorKind::Invalid(format!(
                "pagination.min_per_page ({}) is greater than pagination.max_per_page ({})",
                pagination.min_per_page, pagination.max_per_page
            )));
        }
        if !(pagination.min_per_page..=pagination.max_per_page).contains(&pagination.per_page) {
            exn::bail!(ErrorKind::Invalid(format!(
                "pagination.per_page ({}) must be between {} and {}",
                pagination.per_page, pagination.min_per_page, pagination.max_per_page
            )));
        }
        self.cache_policy().map(|_| ())
    }

    /// Build the cache policy described by the `cache` section, with a fresh
    /// switch.
    pub fn cache_policy(&self) -> Result<CachePolicy> {
        self.cache_policy_with_switch(CacheSwitch::new(!self.cache.off))
    }

    /// Build the cache policy around an existing switch. The switch keeps its
    /// current state; `cache.off` only applies to switches this crate creates.
    pub fn cache_policy_with_switch(&self, switch: CacheSwitch) -> Result<CachePolicy> {
        let cache = &self.cache;
        let mut policy = CachePolicy::default().with_switch(switch).with_ttl(cache.time);
        for (name, secs) in &cache.time_for_method {
            policy = policy.with_method_ttl(parse_method("cache.time_for_method", name)?, *secs);
        }
        let only = cache
            .only
            .iter()
            .map(|name| parse_method("cache.only", name))
            .collect::<Result<Vec<_>>>()?;
        let except = cache
            .except
            .iter()
            .map(|name| parse_method("cache.except", name))
            .collect::<Result<Vec<_>>>()?;
        Ok(policy.only(only).except(except))
    }

    pub fn pagination(&self) -> PaginationBounds {
        PaginationBounds {
            per_page: self.pagination.per_page,
            min_per_page: self.pagination.min_per_page,
            max_per_page: self.pagination.max_per_page,
            default_per_page: self.pagination.per_page,
        }
    }

    /// Open the configured cache store, or `None` when caching is configured
    /// away entirely.
    pub fn open_cache_store(&self) -> Result<Option<CacheHandle>> {
        let handle: CacheHandle = match self.cache.store {
            CacheStoreKind::None => return Ok(None),
            CacheStoreKind::Memory => Arc::new(MemoryCache::new()),
            CacheStoreKind::File => {
                let root = match &self.cache.path {
                    Some(path) => path.clone(),
                    None => default_cache_dir().ok_or_raise(|| {
                        ErrorKind::Invalid("cache.path must be set when there is no home directory".to_string())
                    })?,
                };
                Arc::new(FileCache::new(root).or_raise(|| ErrorKind::CacheStore)?)
            },
        };
        debug!(store = handle.name(), "Opened cache store");
        Ok(Some(handle))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION)
}

/// Platform configuration file location, e.g. `~/.config/quarry/quarry.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(format!("{APPLICATION}.toml")))
}

/// Platform cache directory, used as the file store root when `cache.path`
/// is unset.
pub fn default_cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}
