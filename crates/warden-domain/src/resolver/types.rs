//! Types for the permission resolver.

use serde::{Deserialize, Serialize};

use crate::model::{Access, Permission, Resource, ResourceId};

/// Resources from the nearest existing one up to the owning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Nearest resource first, service root last. Never empty.
    pub(crate) lineage: Vec<Resource>,
    /// False when part of the requested path is unknown to the store.
    pub(crate) exact: bool,
}

impl ResolvedTarget {
    /// The resource closest to what was requested.
    pub fn nearest(&self) -> &Resource {
        &self.lineage[0]
    }

    /// The requested resource itself, when it exists.
    pub fn target(&self) -> Option<&Resource> {
        self.exact.then(|| self.nearest())
    }

    /// The owning service's resource.
    pub fn service_resource(&self) -> &Resource {
        &self.lineage[self.lineage.len() - 1]
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub fn lineage(&self) -> &[Resource] {
        &self.lineage
    }

    /// Identity of the target for ACL caching.
    ///
    /// An unknown path below a resource resolves differently from the
    /// resource itself, so the two never share an entry.
    pub fn cache_identity(&self) -> String {
        if self.exact {
            self.nearest().id.to_string()
        } else {
            format!("{}/*", self.nearest().id)
        }
    }
}

/// Where an effective permission comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Ownership or administrator membership.
    Inherited,
    /// Grant on the target resource itself.
    Applied,
    /// Grant on an ancestor of the target.
    Derived,
    /// No applicable grant anywhere; default deny.
    Default,
}

/// Resolved access for one permission name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub permission: Permission,
    pub access: Access,
    pub provenance: Provenance,
    /// The resource whose grants decided, when one did.
    pub resource_id: Option<ResourceId>,
}

impl EffectivePermission {
    pub fn is_allowed(&self) -> bool {
        self.access.is_allow()
    }
}

/// Aggregate of every permission an operation requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub permissions: Vec<EffectivePermission>,
}

impl Decision {
    pub fn new(permissions: Vec<EffectivePermission>) -> Self {
        Self { permissions }
    }

    /// ALLOW only when every required permission is allowed.
    ///
    /// An operation requiring nothing is denied.
    pub fn is_allowed(&self) -> bool {
        !self.permissions.is_empty() && self.permissions.iter().all(EffectivePermission::is_allowed)
    }

    /// First permission that was not allowed.
    pub fn denied(&self) -> Option<&EffectivePermission> {
        self.permissions.iter().find(|p| !p.is_allowed())
    }
}
