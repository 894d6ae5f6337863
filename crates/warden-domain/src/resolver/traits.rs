//! Traits for storage operations needed by the resolver.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::model::{PermissionGrant, Resource, ResourceId, Service};

/// Read-only access to the resource tree and its grants.
///
/// Implementations must be safe for concurrent use; the resolver never
/// writes through this trait.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Gets a resource by id, `None` if it does not exist.
    async fn get_resource(&self, resource_id: ResourceId) -> DomainResult<Option<Resource>>;

    /// Lists the direct children of a resource.
    async fn find_resource_children(&self, parent_id: ResourceId) -> DomainResult<Vec<Resource>>;

    /// Lists every grant attached to a resource, for all users and groups.
    async fn find_grants(&self, resource_id: ResourceId) -> DomainResult<Vec<PermissionGrant>>;

    /// Finds a service by its exact name.
    async fn find_service_by_name(&self, service_name: &str) -> DomainResult<Option<Service>>;

    /// Gets the service rooted at the given resource id.
    ///
    /// Default implementation returns `None`; override when effective
    /// permission listing by resource id is needed.
    async fn get_service(&self, _service_id: ResourceId) -> DomainResult<Option<Service>> {
        Ok(None)
    }
}
