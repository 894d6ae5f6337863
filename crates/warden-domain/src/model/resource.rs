//! Resources, services, grants and principals.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::permission::{Permission, PermissionSet};
use super::service_type::ServiceType;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique, immutable resource identifier.
    ResourceId
);
id_type!(GroupId);
id_type!(UserId);

/// Kind of node in the resource tree.
///
/// The type fixes which permissions may be granted on the node and whether
/// it may have children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Service,
    Route,
    Directory,
    File,
    Workspace,
    Process,
}

const PATH_PERMISSIONS: &[Permission] = &[Permission::Browse, Permission::Read, Permission::Write];

const WORKSPACE_PERMISSIONS: &[Permission] = &[
    Permission::GetCapabilities,
    Permission::GetMap,
    Permission::GetFeatureInfo,
    Permission::GetLegendGraphic,
    Permission::GetMetadata,
    Permission::GetFeature,
    Permission::DescribeFeatureType,
    Permission::LockFeature,
    Permission::Transaction,
];

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Service,
        ResourceType::Route,
        ResourceType::Directory,
        ResourceType::File,
        ResourceType::Workspace,
        ResourceType::Process,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Service => "service",
            ResourceType::Route => "route",
            ResourceType::Directory => "directory",
            ResourceType::File => "file",
            ResourceType::Workspace => "workspace",
            ResourceType::Process => "process",
        }
    }

    /// Permissions that are meaningful on this resource type.
    ///
    /// Services take theirs from the service type instead.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            ResourceType::Service => &[],
            ResourceType::Route => &[Permission::Read, Permission::Write],
            ResourceType::Directory | ResourceType::File => PATH_PERMISSIONS,
            ResourceType::Workspace => WORKSPACE_PERMISSIONS,
            ResourceType::Process => &[Permission::DescribeProcess, Permission::Execute],
        }
    }

    pub fn child_allowed(self) -> bool {
        !matches!(self, ResourceType::File | ResourceType::Process)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::resolution(format!("unknown resource type '{s}'")))
    }
}

/// Node of the resource tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub resource_type: ResourceType,
    /// `None` only for service roots.
    pub parent_id: Option<ResourceId>,
    /// Members of this group have full access to the resource.
    pub owner_group_id: Option<GroupId>,
}

impl Resource {
    pub fn is_service(&self) -> bool {
        self.resource_type == ResourceType::Service
    }
}

/// Root of a resource tree, with its service-type behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub resource: Resource,
    pub service_type: ServiceType,
    /// Opaque to the resolver.
    pub configuration: Option<serde_json::Value>,
}

impl Service {
    pub fn id(&self) -> ResourceId {
        self.resource.id
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }
}

/// Holder of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum Subject {
    User(UserId),
    Group(GroupId),
}

/// Explicit permission granted to a user or group on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub subject: Subject,
    pub resource_id: ResourceId,
    pub permission: PermissionSet,
}

impl PermissionGrant {
    pub fn new(subject: Subject, resource_id: ResourceId, permission: PermissionSet) -> Self {
        Self {
            subject,
            resource_id,
            permission,
        }
    }
}

/// The subject of an access decision: an optional user and its groups.
///
/// A principal without a user is an unauthenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Option<UserId>,
    pub groups: Vec<GroupId>,
}

impl Principal {
    pub fn user(user_id: UserId, groups: Vec<GroupId>) -> Self {
        Self {
            user_id: Some(user_id),
            groups,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_member(&self, group: GroupId) -> bool {
        self.groups.contains(&group)
    }

    /// Returns true when the grant subject is this user or one of its groups.
    pub fn matches(&self, subject: &Subject) -> bool {
        match subject {
            Subject::User(user) => self.user_id == Some(*user),
            Subject::Group(group) => self.is_member(*group),
        }
    }

    /// Stable identity used to key cached decisions.
    ///
    /// Users are keyed by id alone; principals without a user are keyed by
    /// their sorted group set.
    pub fn identity(&self) -> String {
        match self.user_id {
            Some(user) => format!("user:{user}"),
            None => {
                let mut groups: Vec<i64> = self.groups.iter().map(|g| g.0).collect();
                groups.sort_unstable();
                groups.dedup();
                let groups: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
                format!("anonymous:[{}]", groups.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_matches_user_and_groups() {
        let principal = Principal::user(UserId(7), vec![GroupId(1), GroupId(2)]);

        assert!(principal.matches(&Subject::User(UserId(7))));
        assert!(principal.matches(&Subject::Group(GroupId(2))));
        assert!(!principal.matches(&Subject::User(UserId(8))));
        assert!(!principal.matches(&Subject::Group(GroupId(3))));
    }

    #[test]
    fn test_anonymous_principal_matches_no_user() {
        let principal = Principal::anonymous();
        assert!(!principal.matches(&Subject::User(UserId(0))));
    }

    #[test]
    fn test_identity_distinguishes_users_and_group_sets() {
        let alice = Principal::user(UserId(1), vec![GroupId(3)]);
        let bob = Principal::user(UserId(2), vec![GroupId(3)]);
        assert_ne!(alice.identity(), bob.identity());

        let a = Principal {
            user_id: None,
            groups: vec![GroupId(2), GroupId(1)],
        };
        let b = Principal {
            user_id: None,
            groups: vec![GroupId(1), GroupId(2)],
        };
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), Principal::anonymous().identity());
    }

    #[test]
    fn test_leaf_resource_types_reject_children() {
        assert!(!ResourceType::File.child_allowed());
        assert!(!ResourceType::Process.child_allowed());
        assert!(ResourceType::Directory.child_allowed());
        assert!(ResourceType::Service.child_allowed());
    }

    #[test]
    fn test_resource_type_round_trips_through_name() {
        for resource_type in ResourceType::ALL {
            assert_eq!(
                resource_type.as_str().parse::<ResourceType>().unwrap(),
                resource_type
            );
        }
        assert!("bucket".parse::<ResourceType>().is_err());
    }
}
