//! Cache store trait and implementations.
//!
//! A cache store is a key/value store with per-entry expiry. Values are opaque
//! bytes; the decorator decides how results are encoded.

mod file;
mod memory;

pub use self::file::FileCache;
pub use self::memory::MemoryCache;
use crate::error::Result;
use crate::key::CacheKey;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub type CacheHandle = Arc<dyn CacheStore>;

/// Unified interface for cache stores.
///
/// Implementations must be atomic per key: a concurrent `get` sees either the
/// old entry or the new one, never a partial write. Nothing is promised
/// across keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &str;

    /// The stored bytes, or `None` if there is no entry or it has expired.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove the entry under `key`. Returns whether there was one.
    async fn forget(&self, key: &CacheKey) -> Result<bool>;
}
