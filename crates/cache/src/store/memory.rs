use crate::error::Result;
use crate::key::CacheKey;
use crate::store::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache store.
///
/// Expired entries are never returned and are dropped the next time anything
/// writes to the store. Expiry follows tokio's clock, so paused-time tests can
/// step over a TTL without sleeping.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key.as_str())
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_string(), Entry { value, expires_at: now + ttl });
        Ok(())
    }

    async fn forget(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.write().await.remove(key.as_str()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReadMethod;
    use quarry_query::{PaginationBounds, QueryState};
    use serde_json::json;

    fn key(n: i64) -> CacheKey {
        CacheKey::derive("test", ReadMethod::Get, &QueryState::default(), &PaginationBounds::default(), &json!([n]))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set(&key(1), b"one".to_vec(), Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get(&key(1)).await.unwrap(), Some(b"one".to_vec()));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get(&key(1)).await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key(1)).await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_and_purges_expired() {
        let cache = MemoryCache::new();
        cache.set(&key(1), b"short".to_vec(), Duration::from_secs(1)).await.unwrap();
        cache.set(&key(2), b"old".to_vec(), Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set(&key(2), b"new".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.entries.read().await.len(), 1);
        assert_eq!(cache.get(&key(2)).await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_forget() {
        let cache = MemoryCache::new();
        cache.set(&key(1), b"x".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert!(cache.forget(&key(1)).await.unwrap());
        assert!(!cache.forget(&key(1)).await.unwrap());
        assert_eq!(cache.len().await, 0);
    }
}
