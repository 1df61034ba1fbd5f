use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use quarry_cache::{CacheHandle, CachePolicy, CacheSwitch, CachingRepository, MemoryCache};
use quarry_config::Config;
use quarry_query::PaginationBounds;
use quarry_repository::{Repository, SinkHandle, TracingSink};
use quarry_store::StoreHandle;
use std::sync::Arc;
use tracing::debug;

/// Builds repositories that share one cache store, cache policy, pagination
/// bounds and event sink.
///
/// Keep one factory per application and ask it for a fresh repository per
/// unit of work. Every repository it builds shares the factory's
/// [`CacheSwitch`], so turning caching off through [`switch`](Self::switch)
/// affects them all at once.
#[derive(Clone)]
pub struct RepositoryFactory {
    cache: Option<CacheHandle>,
    policy: CachePolicy,
    pagination: PaginationBounds,
    events: SinkHandle,
}

impl Default for RepositoryFactory {
    fn default() -> Self {
        Self {
            cache: Some(Arc::new(MemoryCache::new())),
            policy: CachePolicy::default(),
            pagination: PaginationBounds::default(),
            events: Arc::new(TracingSink),
        }
    }
}

impl RepositoryFactory {
    /// In-memory cache, default policy and pagination, events to `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().map_err(ErrorKind::config)?;
        let policy = config.cache_policy().map_err(ErrorKind::config)?;
        let cache = config.open_cache_store().map_err(ErrorKind::config)?;
        debug!(cache = cache.as_ref().map(|c| c.name()), enabled = policy.switch.is_enabled(), "Built repository factory");
        Ok(Self {
            cache,
            policy,
            pagination: config.pagination(),
            events: Arc::new(TracingSink),
        })
    }

    /// [`Config::load`] followed by [`from_config`](Self::from_config).
    pub fn load() -> Result<Self> {
        let config = Config::load().map_err(ErrorKind::config)?;
        Self::from_config(&config)
    }

    pub fn with_events(mut self, events: SinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn with_cache(mut self, cache: CacheHandle) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationBounds) -> Self {
        self.pagination = pagination;
        self
    }

    /// The runtime on/off switch shared by every cached repository built here.
    pub fn switch(&self) -> CacheSwitch {
        self.policy.switch.clone()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn cache(&self) -> Option<&CacheHandle> {
        self.cache.as_ref()
    }

    /// An uncached repository over `store`.
    pub fn repository(&self, store: StoreHandle) -> Result<Repository> {
        Ok(Repository::new(store)
            .map_err(ErrorKind::repository)?
            .with_events(self.events.clone())
            .with_pagination(self.pagination))
    }

    /// A repository over `store` behind the factory's read-through cache.
    ///
    /// Fails with [`ErrorKind::CacheDisabled`] when the factory has no cache
    /// store; use [`repository`](Self::repository) for those.
    pub fn cached(&self, store: StoreHandle) -> Result<CachingRepository<Repository>> {
        let cache = self.cache.clone().ok_or_raise(|| ErrorKind::CacheDisabled)?;
        Ok(CachingRepository::new(self.repository(store)?, cache, self.policy.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_config::CacheStoreKind;
    use quarry_store::MemoryStore;

    fn store() -> StoreHandle {
        Arc::new(MemoryStore::new("posts"))
    }

    #[test]
    fn test_default_factory_caches_in_memory() {
        let factory = RepositoryFactory::new();
        assert_eq!(factory.cache().map(|c| c.name()), Some("memory"));
        assert!(factory.cached(store()).is_ok());
    }

    #[test]
    fn test_without_cache() {
        let factory = RepositoryFactory::new().without_cache();
        let err = factory.cached(store()).err().unwrap();
        assert_eq!(*err, ErrorKind::CacheDisabled);
        assert!(factory.repository(store()).is_ok());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.cache.store = CacheStoreKind::None;
        config.cache.off = true;
        let factory = RepositoryFactory::from_config(&config).unwrap();
        assert!(factory.cache().is_none());
        assert!(!factory.switch().is_enabled());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = Config::default();
        config.pagination.per_page = 1000;
        let err = RepositoryFactory::from_config(&config).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Config(quarry_config::error::ErrorKind::Invalid(_))));
    }

    #[test]
    fn test_misconfigured_store() {
        let err = RepositoryFactory::new().repository(Arc::new(MemoryStore::new(""))).err().unwrap();
        assert!(matches!(
            &*err,
            ErrorKind::Repository(quarry_repository::error::ErrorKind::ModelMisconfigured(_))
        ));
    }
}
