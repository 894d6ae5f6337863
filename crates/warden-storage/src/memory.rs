//! In-memory storage implementation.
//!
//! Resources live in a `DashMap` keyed by id with a separate children index,
//! so tree walks never scan the whole map. Ids come from an atomic counter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    permission_name, validate_name, validate_permission, validate_type, DataStore, StoredGrant,
    StoredResource, StoredService, StoredSubject, LEAF_RESOURCE_TYPES, SERVICE_RESOURCE_TYPE,
};

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Lookup by id**: O(1) (DashMap lookup)
/// - **Children**: O(C) where C is the number of children
/// - **Service by name**: O(1) through a lowercased name index
/// - **Delete**: O(D) where D is the number of descendants
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    next_id: AtomicI64,
    resources: DashMap<i64, StoredResource>,
    /// Service details keyed by root resource id.
    services: DashMap<i64, StoredService>,
    /// Lowercased service name -> service id.
    service_names: DashMap<String, i64>,
    /// Parent id -> child ids, in creation order.
    children: DashMap<i64, Vec<i64>>,
    grants: DashMap<i64, Vec<StoredGrant>>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn not_found(resource_id: i64) -> StorageError {
        StorageError::ResourceNotFound { resource_id }
    }

    /// Ids of `root` and all its descendants.
    fn subtree(&self, root: i64) -> Vec<i64> {
        let mut ids = vec![root];
        let mut index = 0;
        while index < ids.len() {
            if let Some(children) = self.children.get(&ids[index]) {
                ids.extend(children.iter().copied());
            }
            index += 1;
        }
        ids
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    #[instrument(skip(self, configuration))]
    async fn create_service(
        &self,
        name: &str,
        service_type: &str,
        configuration: Option<serde_json::Value>,
        owner_group_id: Option<i64>,
    ) -> StorageResult<StoredService> {
        validate_name(name)?;
        validate_type(service_type)?;

        // Hold the name entry while inserting so concurrent creates cannot race.
        match self.service_names.entry(name.to_lowercase()) {
            Entry::Occupied(_) => Err(StorageError::ServiceAlreadyExists {
                name: name.to_string(),
            }),
            Entry::Vacant(entry) => {
                let service = StoredService {
                    resource: StoredResource {
                        id: self.allocate_id(),
                        name: name.to_string(),
                        resource_type: SERVICE_RESOURCE_TYPE.to_string(),
                        parent_id: None,
                        owner_group_id,
                        created_at: chrono::Utc::now(),
                    },
                    service_type: service_type.to_string(),
                    configuration,
                };
                let id = service.resource.id;
                self.resources.insert(id, service.resource.clone());
                self.services.insert(id, service.clone());
                entry.insert(id);
                debug!(service_id = id, "service created");
                Ok(service)
            }
        }
    }

    #[instrument(skip(self))]
    async fn create_resource(
        &self,
        parent_id: i64,
        name: &str,
        resource_type: &str,
        owner_group_id: Option<i64>,
    ) -> StorageResult<StoredResource> {
        validate_name(name)?;
        validate_type(resource_type)?;
        if resource_type == SERVICE_RESOURCE_TYPE {
            return Err(StorageError::InvalidInput {
                message: "services are created with create_service".to_string(),
            });
        }

        let parent_type = self
            .resources
            .get(&parent_id)
            .map(|parent| parent.resource_type.clone())
            .ok_or_else(|| Self::not_found(parent_id))?;
        if LEAF_RESOURCE_TYPES.contains(&parent_type.as_str()) {
            return Err(StorageError::ChildNotAllowed {
                parent_id,
                parent_type,
            });
        }

        // The children entry stays locked until the new id is recorded.
        let mut siblings = self.children.entry(parent_id).or_default();
        let duplicate = siblings.iter().any(|id| {
            self.resources
                .get(id)
                .is_some_and(|sibling| sibling.name.eq_ignore_ascii_case(name))
        });
        if duplicate {
            return Err(StorageError::DuplicateResource {
                parent_id,
                name: name.to_string(),
            });
        }

        let resource = StoredResource {
            id: self.allocate_id(),
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            parent_id: Some(parent_id),
            owner_group_id,
            created_at: chrono::Utc::now(),
        };
        self.resources.insert(resource.id, resource.clone());
        siblings.push(resource.id);
        Ok(resource)
    }

    async fn get_resource(&self, resource_id: i64) -> StorageResult<StoredResource> {
        self.resources
            .get(&resource_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Self::not_found(resource_id))
    }

    async fn get_service(&self, service_id: i64) -> StorageResult<StoredService> {
        self.services
            .get(&service_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| Self::not_found(service_id))
    }

    #[instrument(skip(self))]
    async fn find_resource_children(&self, parent_id: i64) -> StorageResult<Vec<StoredResource>> {
        if !self.resources.contains_key(&parent_id) {
            return Err(Self::not_found(parent_id));
        }
        let ids = self
            .children
            .get(&parent_id)
            .map(|children| children.clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.resources.get(id).map(|r| r.value().clone()))
            .collect())
    }

    #[instrument(skip(self))]
    async fn find_service_by_name(&self, name: &str) -> StorageResult<Option<StoredService>> {
        let id = match self.service_names.get(&name.to_lowercase()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.services.get(&id).map(|s| s.value().clone()))
    }

    #[instrument(skip(self))]
    async fn delete_resource(&self, resource_id: i64) -> StorageResult<()> {
        let resource = self.get_resource(resource_id).await?;

        let subtree = self.subtree(resource_id);
        for id in &subtree {
            self.resources.remove(id);
            self.children.remove(id);
            self.grants.remove(id);
            if let Some((_, service)) = self.services.remove(id) {
                self.service_names
                    .remove(&service.resource.name.to_lowercase());
            }
        }
        if let Some(parent_id) = resource.parent_id {
            if let Some(mut siblings) = self.children.get_mut(&parent_id) {
                siblings.retain(|id| *id != resource_id);
            }
        }
        debug!(removed = subtree.len(), "resource subtree deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(resource_id = grant.resource_id, permission = %grant.permission))]
    async fn upsert_grant(&self, grant: StoredGrant) -> StorageResult<()> {
        validate_permission(&grant.permission)?;
        if !self.resources.contains_key(&grant.resource_id) {
            return Err(Self::not_found(grant.resource_id));
        }

        let mut grants = self.grants.entry(grant.resource_id).or_default();
        let name = grant.permission_name().to_string();
        grants.retain(|existing| {
            !(existing.subject == grant.subject && existing.permission_name() == name)
        });
        grants.push(grant);
        Ok(())
    }

    async fn delete_grant(
        &self,
        subject: StoredSubject,
        resource_id: i64,
        permission: &str,
    ) -> StorageResult<bool> {
        let name = permission_name(permission);
        let Some(mut grants) = self.grants.get_mut(&resource_id) else {
            return Ok(false);
        };
        let before = grants.len();
        grants.retain(|existing| {
            !(existing.subject == subject && existing.permission_name() == name)
        });
        Ok(grants.len() != before)
    }

    async fn find_grants(&self, resource_id: i64) -> StorageResult<Vec<StoredGrant>> {
        if !self.resources.contains_key(&resource_id) {
            return Err(Self::not_found(resource_id));
        }
        Ok(self
            .grants
            .get(&resource_id)
            .map(|grants| grants.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tree(store: &MemoryDataStore) -> (i64, i64, i64) {
        let service = store.create_service("demo", "api", None, None).await.unwrap();
        let a = store
            .create_resource(service.resource.id, "a", "route", None)
            .await
            .unwrap();
        let b = store.create_resource(a.id, "b", "route", None).await.unwrap();
        (service.resource.id, a.id, b.id)
    }

    // Test: InMemoryStore can be created as shared Arc
    #[tokio::test]
    async fn test_memory_store_shared() {
        let store = MemoryDataStore::new_shared();
        store.create_service("demo", "api", None, None).await.unwrap();

        let store2 = Arc::clone(&store);
        let found = store2.find_service_by_name("demo").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_service_names_are_unique_ignoring_case() {
        let store = MemoryDataStore::new();
        store.create_service("Demo", "api", None, None).await.unwrap();

        let err = store
            .create_service("DEMO", "wps", None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ServiceAlreadyExists { .. }));
        let found = store.find_service_by_name("demo").await.unwrap().unwrap();
        assert_eq!(found.resource.name, "Demo");
        assert_eq!(found.service_type, "api");
    }

    #[tokio::test]
    async fn test_service_configuration_is_kept() {
        let store = MemoryDataStore::new();
        let config = serde_json::json!({"url": "http://localhost:8093"});

        let created = store
            .create_service("thredds", "thredds", Some(config.clone()), Some(5))
            .await
            .unwrap();
        let fetched = store.get_service(created.resource.id).await.unwrap();

        assert_eq!(fetched.configuration, Some(config));
        assert_eq!(fetched.resource.owner_group_id, Some(5));
        assert_eq!(fetched.resource.parent_id, None);
    }

    #[tokio::test]
    async fn test_children_are_listed_in_creation_order() {
        let store = MemoryDataStore::new();
        let (service, a, _) = tree(&store).await;
        let z = store.create_resource(service, "z", "route", None).await.unwrap();

        let children = store.find_resource_children(service).await.unwrap();

        let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, z.id]);
    }

    #[tokio::test]
    async fn test_sibling_names_are_unique_ignoring_case() {
        let store = MemoryDataStore::new();
        let (service, _, _) = tree(&store).await;

        let err = store
            .create_resource(service, "A", "route", None)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateResource { .. }));
    }

    #[tokio::test]
    async fn test_leaf_types_reject_children() {
        let store = MemoryDataStore::new();
        let service = store.create_service("wps", "wps", None, None).await.unwrap();
        let process = store
            .create_resource(service.resource.id, "buffer", "process", None)
            .await
            .unwrap();

        let err = store
            .create_resource(process.id, "child", "process", None)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ChildNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_create_resource_validates_input() {
        let store = MemoryDataStore::new();
        let (service, _, _) = tree(&store).await;

        assert!(matches!(
            store.create_resource(999, "x", "route", None).await,
            Err(StorageError::ResourceNotFound { resource_id: 999 })
        ));
        assert!(matches!(
            store.create_resource(service, "x", "service", None).await,
            Err(StorageError::InvalidInput { .. })
        ));
        assert!(matches!(
            store.create_resource(service, "", "route", None).await,
            Err(StorageError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_upsert_replaces_grant_for_same_permission_name() {
        let store = MemoryDataStore::new();
        let (_, a, _) = tree(&store).await;
        let subject = StoredSubject::Group(1);

        store
            .upsert_grant(StoredGrant::new(subject, a, "read-allow-recursive"))
            .await
            .unwrap();
        store
            .upsert_grant(StoredGrant::new(subject, a, "read-deny-match"))
            .await
            .unwrap();
        store
            .upsert_grant(StoredGrant::new(subject, a, "write-allow-match"))
            .await
            .unwrap();
        store
            .upsert_grant(StoredGrant::new(StoredSubject::User(1), a, "read"))
            .await
            .unwrap();

        let grants = store.find_grants(a).await.unwrap();
        let mut permissions: Vec<&str> = grants
            .iter()
            .filter(|g| g.subject == subject)
            .map(|g| g.permission.as_str())
            .collect();
        permissions.sort();
        assert_eq!(permissions, vec!["read-deny-match", "write-allow-match"]);
        assert_eq!(grants.len(), 3);
    }

    #[tokio::test]
    async fn test_upsert_rejects_unknown_resource_and_bad_permission() {
        let store = MemoryDataStore::new();
        let (_, a, _) = tree(&store).await;

        assert!(matches!(
            store
                .upsert_grant(StoredGrant::new(StoredSubject::User(1), 999, "read"))
                .await,
            Err(StorageError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            store
                .upsert_grant(StoredGrant::new(StoredSubject::User(1), a, "read--"))
                .await,
            Err(StorageError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_grant() {
        let store = MemoryDataStore::new();
        let (_, a, _) = tree(&store).await;
        let subject = StoredSubject::User(7);
        store
            .upsert_grant(StoredGrant::new(subject, a, "write-allow-match"))
            .await
            .unwrap();

        assert!(store.delete_grant(subject, a, "write").await.unwrap());
        assert!(!store.delete_grant(subject, a, "write").await.unwrap());
        assert!(store.find_grants(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_descendants_and_grants() {
        let store = MemoryDataStore::new();
        let (service, a, b) = tree(&store).await;
        store
            .upsert_grant(StoredGrant::new(StoredSubject::Group(1), b, "read"))
            .await
            .unwrap();

        store.delete_resource(a).await.unwrap();

        assert!(store.get_resource(a).await.is_err());
        assert!(store.get_resource(b).await.is_err());
        assert!(store.find_grants(b).await.is_err());
        assert!(store
            .find_resource_children(service)
            .await
            .unwrap()
            .is_empty());

        // The name is free again.
        store.create_resource(service, "a", "route", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_deleting_service_frees_its_name() {
        let store = MemoryDataStore::new();
        let (service, a, _) = tree(&store).await;

        store.delete_resource(service).await.unwrap();

        assert!(store.find_service_by_name("demo").await.unwrap().is_none());
        assert!(store.get_service(service).await.is_err());
        assert!(store.get_resource(a).await.is_err());
        store.create_service("demo", "api", None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_names_unique() {
        let store = MemoryDataStore::new_shared();
        let service = store.create_service("demo", "api", None, None).await.unwrap();
        let mut handles = Vec::new();

        for _ in 0..16 {
            let store = Arc::clone(&store);
            let parent = service.resource.id;
            handles.push(tokio::spawn(async move {
                store.create_resource(parent, "same", "route", None).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}
