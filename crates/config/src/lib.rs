//! Layered configuration for quarry.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A configuration file: YAML, TOML or JSON, picked by extension. Without
//!    an explicit path, [`default_config_path`] is used.
//! 3. Environment variables prefixed `QUARRY_`, with `__` between nested
//!    keys (`QUARRY_CACHE__TIME=30`).
//!
//! ```yaml
//! cache:
//!   store: memory          # memory | file | none
//!   path: ~                # file store root
//!   time: 10               # default TTL in seconds
//!   off: false
//!   time_for_method: { count: 60 }
//!   only: []
//!   except: []
//! pagination:
//!   per_page: 15
//!   min_per_page: 1
//!   max_per_page: 150
//! ```

mod config;
pub mod error;
mod loader;

pub use crate::config::{
    CacheConfig, CacheStoreKind, Config, PaginationConfig, default_cache_dir, default_config_path,
};
pub use crate::loader::{ENV_PREFIX, ENV_SEPARATOR};
