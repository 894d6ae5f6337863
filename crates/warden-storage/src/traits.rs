//! DataStore trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Resource types that never accept children.
pub const LEAF_RESOURCE_TYPES: &[&str] = &["file", "process"];

/// Resource type of service roots.
pub const SERVICE_RESOURCE_TYPE: &str = "service";

/// Maximum length of resource and service names.
const MAX_NAME_LENGTH: usize = 255;

/// A stored resource node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResource {
    pub id: i64,
    pub name: String,
    pub resource_type: String,
    /// `None` only for service roots.
    pub parent_id: Option<i64>,
    pub owner_group_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A stored service root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredService {
    pub resource: StoredResource,
    pub service_type: String,
    pub configuration: Option<serde_json::Value>,
}

/// Grantee of a stored grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoredSubject {
    User(i64),
    Group(i64),
}

/// A stored permission grant.
///
/// `permission` holds the permission set in its string form, e.g.
/// `read-allow-recursive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGrant {
    pub subject: StoredSubject,
    pub resource_id: i64,
    pub permission: String,
}

impl StoredGrant {
    pub fn new(subject: StoredSubject, resource_id: i64, permission: impl Into<String>) -> Self {
        Self {
            subject,
            resource_id,
            permission: permission.into(),
        }
    }

    /// Permission name, without access and scope modifiers.
    pub fn permission_name(&self) -> &str {
        permission_name(&self.permission)
    }
}

/// Returns the name part of a permission set string.
pub fn permission_name(permission: &str) -> &str {
    permission.split('-').next().unwrap_or(permission)
}

/// Abstract storage interface for the resource tree and its grants.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Resource tree

    /// Creates a service root. Service names are unique, ignoring case.
    async fn create_service(
        &self,
        name: &str,
        service_type: &str,
        configuration: Option<serde_json::Value>,
        owner_group_id: Option<i64>,
    ) -> StorageResult<StoredService>;

    /// Creates a resource below `parent_id`.
    ///
    /// Sibling names are unique, ignoring case, and leaf types reject
    /// children.
    async fn create_resource(
        &self,
        parent_id: i64,
        name: &str,
        resource_type: &str,
        owner_group_id: Option<i64>,
    ) -> StorageResult<StoredResource>;

    /// Gets a resource by ID.
    async fn get_resource(&self, resource_id: i64) -> StorageResult<StoredResource>;

    /// Gets a service by the ID of its root resource.
    async fn get_service(&self, service_id: i64) -> StorageResult<StoredService>;

    /// Lists direct children of a resource.
    async fn find_resource_children(&self, parent_id: i64) -> StorageResult<Vec<StoredResource>>;

    /// Finds a service by name, ignoring case.
    async fn find_service_by_name(&self, name: &str) -> StorageResult<Option<StoredService>>;

    /// Deletes a resource with all its descendants and their grants.
    async fn delete_resource(&self, resource_id: i64) -> StorageResult<()>;

    // Grants

    /// Stores a grant, replacing any grant of the same subject for the same
    /// permission name on the same resource.
    async fn upsert_grant(&self, grant: StoredGrant) -> StorageResult<()>;

    /// Deletes the grant of `subject` for `permission_name` on a resource.
    ///
    /// Returns whether a grant was removed.
    async fn delete_grant(
        &self,
        subject: StoredSubject,
        resource_id: i64,
        permission_name: &str,
    ) -> StorageResult<bool>;

    /// Lists grants attached to a resource.
    async fn find_grants(&self, resource_id: i64) -> StorageResult<Vec<StoredGrant>>;
}

/// Validates a resource or service name.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidInput {
            message: "name cannot be empty".to_string(),
        });
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("name exceeds {MAX_NAME_LENGTH} characters"),
        });
    }
    if name.contains('/') {
        return Err(StorageError::InvalidInput {
            message: format!("name '{name}' cannot contain '/'"),
        });
    }
    Ok(())
}

/// Validates a resource or service type identifier.
pub fn validate_type(kind: &str) -> StorageResult<()> {
    if kind.is_empty()
        || !kind
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(StorageError::InvalidInput {
            message: format!("invalid type identifier '{kind}'"),
        });
    }
    Ok(())
}

/// Validates the string form of a permission set.
pub fn validate_permission(permission: &str) -> StorageResult<()> {
    let parts: Vec<&str> = permission.split('-').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(StorageError::InvalidInput {
            message: format!("invalid permission '{permission}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_name_strips_modifiers() {
        assert_eq!(permission_name("read-allow-recursive"), "read");
        assert_eq!(permission_name("write"), "write");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("data").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_type() {
        assert!(validate_type("route").is_ok());
        assert!(validate_type("Route").is_err());
        assert!(validate_type("").is_err());
    }

    #[test]
    fn test_validate_permission() {
        assert!(validate_permission("read").is_ok());
        assert!(validate_permission("read-deny-match").is_ok());
        assert!(validate_permission("read--match").is_err());
        assert!(validate_permission("a-b-c-d").is_err());
    }
}
