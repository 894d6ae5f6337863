//! ACL region.

use std::future::Future;

use moka::future::Cache;
use tracing::{debug, warn};

use crate::error::DomainResult;
use crate::model::{Permission, ResourceId};
use crate::resolver::EffectivePermission;

use super::{CacheMetrics, CacheMetricsSnapshot, CacheRegion, CacheRegionConfig};

/// Key of one cached permission decision.
///
/// Distinct principals never share an entry: the principal identity is part
/// of the key, the service is only carried for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AclCacheKey {
    /// Principal identity (see [`Principal::identity`](crate::model::Principal::identity)).
    pub principal: String,
    /// Target identity (see [`ResolvedTarget::cache_identity`](crate::resolver::ResolvedTarget::cache_identity)).
    pub resource: String,
    pub permission: Permission,
    /// Request-derived sub-permission, e.g. the OWS operation.
    pub discriminator: String,
    pub service_id: ResourceId,
}

impl AclCacheKey {
    pub fn new(
        principal: impl Into<String>,
        resource: impl Into<String>,
        permission: Permission,
        discriminator: impl Into<String>,
        service_id: ResourceId,
    ) -> Self {
        Self {
            principal: principal.into(),
            resource: resource.into(),
            permission,
            discriminator: discriminator.into(),
            service_id,
        }
    }
}

/// Resolved permissions keyed by [`AclCacheKey`].
///
/// Per-service invalidation is done with Moka invalidation closures over the
/// key's `service_id`, so nothing outlives an entry once Moka drops it.
pub struct AclCache {
    cache: Cache<AclCacheKey, EffectivePermission>,
    config: CacheRegionConfig,
    metrics: CacheMetrics,
}

impl std::fmt::Debug for AclCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl AclCache {
    pub fn new(config: CacheRegionConfig) -> Self {
        Self {
            cache: config.builder().support_invalidation_closures().build(),
            config,
            metrics: CacheMetrics::new(CacheRegion::Acl),
        }
    }

    pub fn config(&self) -> &CacheRegionConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the cached decision for `key`, resolving it on a miss.
    ///
    /// With `bypass` set the cached value is ignored and replaced by a fresh
    /// resolution. Resolution errors are returned as-is and never stored.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        key: AclCacheKey,
        bypass: bool,
        resolve: F,
    ) -> DomainResult<EffectivePermission>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DomainResult<EffectivePermission>>,
    {
        if !self.config.enabled {
            return resolve().await;
        }

        if bypass {
            self.metrics.record_bypass();
            debug!(region = %CacheRegion::Acl, principal = %key.principal, resource = %key.resource, "cache bypass requested");
        } else if let Some(cached) = self.cache.get(&key).await {
            self.metrics.record_hit();
            debug!(region = %CacheRegion::Acl, principal = %key.principal, resource = %key.resource, permission = %key.permission, "cache hit");
            return Ok(cached);
        } else {
            self.metrics.record_miss();
            debug!(region = %CacheRegion::Acl, principal = %key.principal, resource = %key.resource, permission = %key.permission, "cache miss");
        }

        let resolved = resolve().await?;
        self.insert(key, resolved).await;
        Ok(resolved)
    }

    pub async fn get(&self, key: &AclCacheKey) -> Option<EffectivePermission> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: AclCacheKey, permission: EffectivePermission) {
        self.cache.insert(key, permission).await;
    }

    pub async fn invalidate(&self, key: &AclCacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Drops every decision computed under one service.
    ///
    /// Entries inserted after the call are kept.
    pub fn invalidate_service(&self, service_id: ResourceId) {
        if let Err(err) = self
            .cache
            .invalidate_entries_if(move |key, _| key.service_id == service_id)
        {
            warn!(region = %CacheRegion::Acl, service = %service_id, error = %err, "failed to invalidate service entries");
        }
    }

    pub fn clear(&self) {
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
