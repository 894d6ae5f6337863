//! warden-domain: Core access-control decision logic
//!
//! This crate contains the decision engine consumed by the reverse proxy:
//! - Resource, service and permission model
//! - Permission resolver walking the resource tree
//! - Service resolution and per-type request parsing
//! - Two-region access cache (services and ACL decisions)
//! - The decision point answering "is this request allowed"
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                warden-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/    - Resources, services, grants    │
//! │  request/  - Proxied request context        │
//! │  service/  - Service handles & parsing      │
//! │  resolver/ - Permission resolution          │
//! │  cache/    - Service and ACL cache regions  │
//! │  decision/ - Access control decision point  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod decision;
pub mod error;
pub mod model;
pub mod request;
pub mod resolver;
pub mod service;

// Re-export commonly used types at the crate root
pub use cache::{
    register_cache_metrics, AccessCache, AccessCacheConfig, AclCacheKey, CacheRegionConfig,
};
pub use decision::{AccessControl, Evaluation};
pub use error::{DomainError, DomainResult};
pub use model::{
    Access, GroupId, Permission, PermissionGrant, PermissionSet, Principal, Resource, ResourceId,
    ResourceType, Scope, Service, ServiceType, Subject, UserId,
};
pub use request::{ProxyPathParser, ProxyRequest, RequestContext, RequestParser};
pub use resolver::{PermissionResolver, ResolverConfig, ResourceReader};
pub use service::{ServiceFactory, ServiceHandle, ServiceResolver};
