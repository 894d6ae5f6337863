//! Service region.

use dashmap::DashMap;
use moka::future::Cache;
use tracing::debug;

use crate::error::DomainResult;
use crate::model::ResourceId;
use crate::request::RequestContext;
use crate::service::{ServiceFactory, ServiceHandle};

use super::{CacheMetrics, CacheMetricsSnapshot, CacheRegion, CacheRegionConfig};

/// Service handles keyed by service name.
///
/// Names are compared case-insensitively, matching how the store resolves
/// them. A hit is always rebound to the caller's request.
pub struct ServiceCache {
    cache: Cache<String, ServiceHandle>,
    config: CacheRegionConfig,
    /// Secondary index: service id -> cache key, for invalidation by id.
    by_id: DashMap<ResourceId, String>,
    metrics: CacheMetrics,
}

impl std::fmt::Debug for ServiceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("id_index_size", &self.by_id.len())
            .finish()
    }
}

impl ServiceCache {
    pub fn new(config: CacheRegionConfig) -> Self {
        Self {
            cache: config.build(),
            config,
            by_id: DashMap::new(),
            metrics: CacheMetrics::new(CacheRegion::Service),
        }
    }

    pub fn config(&self) -> &CacheRegionConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the handle for `service_name` bound to `request`.
    ///
    /// A request carrying a no-cache directive skips the lookup and
    /// refreshes the entry. Factory failures are never cached.
    pub async fn get_or_create<F>(
        &self,
        service_name: &str,
        request: &RequestContext,
        factory: &F,
    ) -> DomainResult<ServiceHandle>
    where
        F: ServiceFactory + ?Sized,
    {
        if !self.config.enabled {
            return factory.get_service(service_name, request).await;
        }

        let key = service_name.to_ascii_lowercase();
        if request.cache_bypass() {
            self.metrics.record_bypass();
            debug!(region = %CacheRegion::Service, service = %service_name, "cache bypass requested");
        } else if let Some(handle) = self.cache.get(&key).await {
            self.metrics.record_hit();
            debug!(region = %CacheRegion::Service, service = %service_name, "cache hit");
            return Ok(handle.rebind(request));
        } else {
            self.metrics.record_miss();
            debug!(region = %CacheRegion::Service, service = %service_name, "cache miss");
        }

        let handle = factory.get_service(service_name, request).await?;
        self.by_id.insert(handle.service().id(), key.clone());
        self.cache.insert(key, handle.clone()).await;
        Ok(handle)
    }

    /// Returns the cached handle for `service_name` bound to `request`.
    ///
    /// Never consults the factory and records no metrics.
    pub async fn get(&self, service_name: &str, request: &RequestContext) -> Option<ServiceHandle> {
        self.cached(service_name)
            .await
            .map(|handle| handle.rebind(request))
    }

    /// Returns true when a handle for `service_name` is cached.
    pub fn contains(&self, service_name: &str) -> bool {
        self.cache.contains_key(&service_name.to_ascii_lowercase())
    }

    /// The stored handle, still bound to the request that created it.
    async fn cached(&self, service_name: &str) -> Option<ServiceHandle> {
        self.cache.get(&service_name.to_ascii_lowercase()).await
    }

    pub async fn invalidate(&self, service_name: &str) {
        let key = service_name.to_ascii_lowercase();
        self.by_id.retain(|_, cached| *cached != key);
        self.cache.invalidate(&key).await;
    }

    pub async fn invalidate_id(&self, service_id: ResourceId) {
        if let Some((_, key)) = self.by_id.remove(&service_id) {
            self.cache.invalidate(&key).await;
        }
    }

    pub fn clear(&self) {
        self.by_id.clear();
        self.cache.invalidate_all();
    }

    /// Returns the approximate number of entries in the region.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance tasks (expiry, eviction).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }
}
