//! Two-region access cache.
//!
//! The cache manager owns two independently configured regions backed by
//! Moka's async cache:
//!
//! - **service**: service handles keyed by service name. Handles are
//!   principal-independent but carry a request reference, so every hit is
//!   rebound to the current request before it is returned.
//! - **acl**: resolved permissions keyed by principal identity, target,
//!   permission and request discriminator. Never keyed by service alone.
//!
//! # Cache Safety
//!
//! Both regions are **disabled** by default. A disabled region recomputes on
//! every call. Cached ACL decisions may outlive grant changes until they
//! expire or are invalidated; the resolver itself always re-reads grants.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use warden_domain::cache::{AccessCache, AccessCacheConfig, CacheRegionConfig};
//!
//! let config = AccessCacheConfig {
//!     service: CacheRegionConfig::default().with_enabled(true),
//!     acl: CacheRegionConfig::default()
//!         .with_enabled(true)
//!         .with_expire(Some(Duration::from_secs(20))),
//! };
//! let cache = AccessCache::new(config);
//! ```

mod acl;
mod service;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::{Cache, CacheBuilder};

use crate::model::ResourceId;

pub use acl::{AclCache, AclCacheKey};
pub use service::ServiceCache;

/// Configuration for one cache region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRegionConfig {
    /// Whether the region stores entries at all.
    pub enabled: bool,
    /// Time to live of an entry; `None` keeps entries until evicted.
    pub expire: Option<Duration>,
    /// Maximum number of entries.
    pub max_capacity: u64,
}

impl Default for CacheRegionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            expire: None,
            max_capacity: 10_000,
        }
    }
}

impl CacheRegionConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_expire(mut self, expire: Option<Duration>) -> Self {
        self.expire = expire;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Returns a Moka builder with this region's capacity and expiry.
    pub(crate) fn builder<K, V>(&self) -> CacheBuilder<K, V, Cache<K, V>>
    where
        K: std::hash::Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let builder: CacheBuilder<K, V, Cache<K, V>> =
            Cache::builder().max_capacity(self.max_capacity);
        match self.expire {
            Some(ttl) => builder.time_to_live(ttl),
            None => builder,
        }
    }

    /// Builds the backing Moka cache for this region.
    pub(crate) fn build<K, V>(&self) -> Cache<K, V>
    where
        K: std::hash::Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.builder().build()
    }
}

/// Configuration of both regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessCacheConfig {
    pub service: CacheRegionConfig,
    pub acl: CacheRegionConfig,
}

/// Cache region label used in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRegion {
    Service,
    Acl,
}

impl CacheRegion {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheRegion::Service => "service",
            CacheRegion::Acl => "acl",
        }
    }
}

impl fmt::Display for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-region lookup counters.
///
/// Mirrors the exported `metrics` counters in-process so callers can read
/// them without a recorder installed.
#[derive(Debug)]
pub struct CacheMetrics {
    region: CacheRegion,
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
}

impl CacheMetrics {
    pub(crate) fn new(region: CacheRegion) -> Self {
        Self {
            region,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("warden_cache_hits_total", "region" => self.region.as_str())
            .increment(1);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("warden_cache_misses_total", "region" => self.region.as_str())
            .increment(1);
    }

    pub(crate) fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("warden_cache_bypass_total", "region" => self.region.as_str())
            .increment(1);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
        }
    }
}

/// Cache manager holding the service and ACL regions.
///
/// Constructed once at startup and shared by reference; there is no global
/// region registry.
#[derive(Debug)]
pub struct AccessCache {
    service: ServiceCache,
    acl: AclCache,
}

impl AccessCache {
    pub fn new(config: AccessCacheConfig) -> Self {
        Self {
            service: ServiceCache::new(config.service),
            acl: AclCache::new(config.acl),
        }
    }

    /// A manager with both regions disabled.
    pub fn disabled() -> Self {
        Self::new(AccessCacheConfig::default())
    }

    pub fn service(&self) -> &ServiceCache {
        &self.service
    }

    pub fn acl(&self) -> &AclCache {
        &self.acl
    }

    /// Drops the cached handle of one service.
    ///
    /// ACL entries computed under that service are left to expire.
    pub async fn invalidate_service(&self, service_name: &str) {
        self.service.invalidate(service_name).await;
    }

    /// Drops the cached handle of the service with the given id.
    pub async fn invalidate_service_id(&self, service_id: ResourceId) {
        self.service.invalidate_id(service_id).await;
    }

    /// Empties both regions.
    pub fn clear(&self) {
        self.service.clear();
        self.acl.clear();
    }
}

/// Registers cache metric descriptions.
///
/// Call once during application startup.
///
/// # Metrics Registered
///
/// - `warden_cache_hits_total` - Cache hits, labelled by region
/// - `warden_cache_misses_total` - Cache misses, labelled by region
/// - `warden_cache_bypass_total` - Lookups that skipped the cache on request
pub fn register_cache_metrics() {
    metrics::describe_counter!(
        "warden_cache_hits_total",
        "Total number of access cache hits"
    );
    metrics::describe_counter!(
        "warden_cache_misses_total",
        "Total number of access cache misses"
    );
    metrics::describe_counter!(
        "warden_cache_bypass_total",
        "Total number of access cache lookups bypassed by a no-cache directive"
    );
}
