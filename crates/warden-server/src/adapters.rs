//! Adapters that bridge the storage layer to the domain layer.
//!
//! The domain layer (warden-domain) reads the resource tree through the
//! `ResourceReader` trait; the storage layer (warden-storage) implements
//! `DataStore` with string-typed records. This adapter converts between the
//! two and turns malformed stored data into resolution errors.

use std::sync::Arc;

use async_trait::async_trait;

use warden_domain::error::{DomainError, DomainResult};
use warden_domain::model::{
    GroupId, PermissionGrant, PermissionSet, Resource, ResourceId, ResourceType, Service,
    ServiceType, Subject, UserId,
};
use warden_domain::resolver::ResourceReader;
use warden_storage::{
    DataStore, StorageError, StoredGrant, StoredResource, StoredService, StoredSubject,
};

/// Adapter that implements `ResourceReader` using a `DataStore`.
pub struct DataStoreResourceReader<S: DataStore> {
    storage: Arc<S>,
}

impl<S: DataStore> DataStoreResourceReader<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

fn storage_error(err: StorageError) -> DomainError {
    DomainError::resolution(format!("storage error: {err}"))
}

/// Maps a missing record to `None`.
fn optional<T>(result: Result<T, StorageError>) -> DomainResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StorageError::ResourceNotFound { .. }) => Ok(None),
        Err(e) => Err(storage_error(e)),
    }
}

fn to_resource(stored: StoredResource) -> DomainResult<Resource> {
    Ok(Resource {
        id: ResourceId(stored.id),
        resource_type: stored.resource_type.parse::<ResourceType>()?,
        name: stored.name,
        parent_id: stored.parent_id.map(ResourceId),
        owner_group_id: stored.owner_group_id.map(GroupId),
    })
}

fn to_service(stored: StoredService) -> DomainResult<Service> {
    Ok(Service {
        service_type: stored.service_type.parse::<ServiceType>()?,
        resource: to_resource(stored.resource)?,
        configuration: stored.configuration,
    })
}

fn to_grant(stored: StoredGrant) -> DomainResult<PermissionGrant> {
    let permission = stored
        .permission
        .parse::<PermissionSet>()
        .map_err(|e| {
            DomainError::resolution(format!(
                "malformed grant on resource {}: {e}",
                stored.resource_id
            ))
        })?;
    let subject = match stored.subject {
        StoredSubject::User(id) => Subject::User(UserId(id)),
        StoredSubject::Group(id) => Subject::Group(GroupId(id)),
    };
    Ok(PermissionGrant::new(
        subject,
        ResourceId(stored.resource_id),
        permission,
    ))
}

#[async_trait]
impl<S: DataStore> ResourceReader for DataStoreResourceReader<S> {
    async fn get_resource(&self, resource_id: ResourceId) -> DomainResult<Option<Resource>> {
        optional(self.storage.get_resource(resource_id.0).await)?
            .map(to_resource)
            .transpose()
    }

    async fn find_resource_children(&self, parent_id: ResourceId) -> DomainResult<Vec<Resource>> {
        self.storage
            .find_resource_children(parent_id.0)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(to_resource)
            .collect()
    }

    async fn find_grants(&self, resource_id: ResourceId) -> DomainResult<Vec<PermissionGrant>> {
        self.storage
            .find_grants(resource_id.0)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(to_grant)
            .collect()
    }

    async fn find_service_by_name(&self, service_name: &str) -> DomainResult<Option<Service>> {
        self.storage
            .find_service_by_name(service_name)
            .await
            .map_err(storage_error)?
            .map(to_service)
            .transpose()
    }

    async fn get_service(&self, service_id: ResourceId) -> DomainResult<Option<Service>> {
        optional(self.storage.get_service(service_id.0).await)?
            .map(to_service)
            .transpose()
    }
}
