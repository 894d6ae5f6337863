//! warden-server: Configuration and bootstrap of the decision point
//!
//! This crate wires the storage layer to the domain layer:
//! - Configuration management
//! - Logging initialisation
//! - Storage to domain adapters
//! - Construction of the shared `AccessControl` instance
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               warden-server                  │
//! ├─────────────────────────────────────────────┤
//! │  config.rs      - Configuration management  │
//! │  adapters.rs    - DataStore -> ResourceReader│
//! │  observability/ - Logging                   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod observability;

use std::sync::Arc;

use tracing::info;
use warden_domain::{
    register_cache_metrics, AccessCache, AccessControl, PermissionResolver, ProxyPathParser,
    ServiceResolver,
};
use warden_storage::DataStore;

// Re-exports for convenience
pub use adapters::DataStoreResourceReader;
pub use config::{ConfigLoadError, ServerConfig};

/// Decision point backed by a [`DataStore`].
pub type StoreAccessControl<S> =
    AccessControl<DataStoreResourceReader<S>, ServiceResolver<DataStoreResourceReader<S>>>;

/// Builds the decision point shared by all request handlers.
///
/// Call once at startup and hand the returned `Arc` to every handler.
pub fn build_access_control<S: DataStore>(
    config: &ServerConfig,
    storage: Arc<S>,
) -> Arc<StoreAccessControl<S>> {
    register_cache_metrics();

    let reader = Arc::new(DataStoreResourceReader::new(storage));
    let cache_config = config.cache.to_access_cache_config();
    info!(
        service_cache = cache_config.service.enabled,
        acl_cache = cache_config.acl.enabled,
        max_depth = config.resolver.max_depth,
        path_prefix = %config.proxy.path_prefix,
        "building access control"
    );

    Arc::new(AccessControl::new(
        Arc::new(ProxyPathParser::new(config.proxy.path_prefix.clone())),
        Arc::new(ServiceResolver::new(Arc::clone(&reader))),
        PermissionResolver::with_config(reader, config.resolver.to_resolver_config()),
        Arc::new(AccessCache::new(cache_config)),
    ))
}
