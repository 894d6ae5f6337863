//! Permission resolution over the resource tree.
//!
//! # Algorithm
//!
//! 1. Administrators, and members of the group owning the target or its
//!    service, are allowed unconditionally (`Inherited`).
//! 2. Otherwise the lineage is scanned from the nearest resource up to the
//!    service. The first resource holding a grant for the permission name
//!    that matches the principal (directly or through a group) decides:
//!    - on the exact target both scopes apply and DENY beats ALLOW;
//!    - on a strict ancestor MATCH-scoped ALLOW grants do not apply and are
//!      skipped; any DENY denies and a RECURSIVE ALLOW allows.
//! 3. Nothing found up to the service root denies by default.
//!
//! The nearest deciding resource wins regardless of how strong a farther
//! grant is. A path unknown to the store is resolved against its nearest
//! existing ancestor, where a MATCH-only ALLOW refuses access instead of
//! being skipped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{DomainError, DomainResult};
use crate::model::{
    Access, GroupId, Permission, PermissionGrant, PermissionSet, Principal, Resource, ResourceId,
    Scope, Service, ServiceType, Subject,
};

use super::config::ResolverConfig;
use super::traits::ResourceReader;
use super::types::{Decision, EffectivePermission, Provenance, ResolvedTarget};

/// Grants already read during one resolution, keyed by resource.
type GrantMemo = HashMap<ResourceId, Vec<PermissionGrant>>;

/// Computes effective permissions of principals on resources.
///
/// Stateless apart from its reader: every call re-reads grants, so the
/// result always reflects the current store contents.
pub struct PermissionResolver<R> {
    reader: Arc<R>,
    config: ResolverConfig,
}

impl<R: ResourceReader> PermissionResolver<R> {
    /// Creates a new resolver with default configuration.
    pub fn new(reader: Arc<R>) -> Self {
        Self::with_config(reader, ResolverConfig::default())
    }

    /// Creates a new resolver with custom configuration.
    pub fn with_config(reader: Arc<R>, config: ResolverConfig) -> Self {
        Self { reader, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Walks `segments` down from the service root.
    ///
    /// Segment names match case-insensitively. The walk stops at the first
    /// unknown segment and the result is then marked as not exact.
    #[instrument(skip(self, service), fields(service = %service.name()))]
    pub async fn locate(
        &self,
        service: &Service,
        segments: &[String],
    ) -> DomainResult<ResolvedTarget> {
        let mut lineage = vec![service.resource.clone()];
        let mut exact = true;

        for segment in segments {
            if lineage.len() >= self.config.max_depth as usize {
                return Err(DomainError::DepthLimitExceeded {
                    max_depth: self.config.max_depth,
                });
            }
            let parent_id = lineage[lineage.len() - 1].id;
            let children = self.reader.find_resource_children(parent_id).await?;
            match children
                .into_iter()
                .find(|child| child.name.eq_ignore_ascii_case(segment))
            {
                Some(child) => {
                    if child.parent_id != Some(parent_id) {
                        return Err(DomainError::resolution(format!(
                            "resource {} listed under {} but has parent {:?}",
                            child.id, parent_id, child.parent_id
                        )));
                    }
                    lineage.push(child);
                }
                None => {
                    debug!(%segment, parent = %parent_id, "path segment unknown to the store");
                    exact = false;
                    break;
                }
            }
        }

        lineage.reverse();
        Ok(ResolvedTarget { lineage, exact })
    }

    /// Builds the lineage of an existing resource by following parents.
    pub async fn lineage_of(&self, resource_id: ResourceId) -> DomainResult<ResolvedTarget> {
        let mut lineage: Vec<Resource> = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(resource_id);

        while let Some(id) = next {
            if !visited.insert(id) {
                return Err(DomainError::resolution(format!(
                    "cycle detected in resource tree at {id}"
                )));
            }
            if lineage.len() >= self.config.max_depth as usize {
                return Err(DomainError::DepthLimitExceeded {
                    max_depth: self.config.max_depth,
                });
            }
            let resource = self
                .reader
                .get_resource(id)
                .await?
                .ok_or_else(|| DomainError::resolution(format!("resource {id} not found")))?;
            next = resource.parent_id;
            lineage.push(resource);
        }

        match lineage.last() {
            Some(root) if root.is_service() => Ok(ResolvedTarget {
                lineage,
                exact: true,
            }),
            Some(root) => Err(DomainError::resolution(format!(
                "resource {} has no parent but is a {}",
                root.id, root.resource_type
            ))),
            None => Err(DomainError::resolution("empty resource lineage")),
        }
    }

    /// Resolves one permission for a principal on a target.
    pub async fn resolve_permission(
        &self,
        principal: &Principal,
        target: &ResolvedTarget,
        permission: Permission,
    ) -> DomainResult<EffectivePermission> {
        let mut memo = GrantMemo::new();
        self.resolve_with(principal, target, permission, &mut memo)
            .await
    }

    /// Resolves every permission an operation requires.
    ///
    /// The aggregate is allowed only when all of them are allowed.
    #[instrument(skip(self, principal, target), fields(principal = %principal.identity(), target = %target.cache_identity()))]
    pub async fn resolve(
        &self,
        principal: &Principal,
        target: &ResolvedTarget,
        permissions: &[Permission],
    ) -> DomainResult<Decision> {
        let mut memo = GrantMemo::new();
        let mut resolved = Vec::with_capacity(permissions.len());
        for permission in permissions {
            resolved.push(
                self.resolve_with(principal, target, *permission, &mut memo)
                    .await?,
            );
        }
        Ok(Decision::new(resolved))
    }

    /// Lists the effective access for every permission valid on the target.
    pub async fn effective_permissions(
        &self,
        principal: &Principal,
        service_type: ServiceType,
        target: &ResolvedTarget,
    ) -> DomainResult<Vec<EffectivePermission>> {
        let nearest = target.nearest();
        let permissions = if nearest.is_service() {
            service_type.permissions()
        } else {
            nearest.resource_type.permissions()
        };
        Ok(self.resolve(principal, target, permissions).await?.permissions)
    }

    /// Lists effective permissions on an existing resource given its id.
    pub async fn effective_permissions_by_id(
        &self,
        principal: &Principal,
        resource_id: ResourceId,
    ) -> DomainResult<Vec<EffectivePermission>> {
        let target = self.lineage_of(resource_id).await?;
        let root_id = target.service_resource().id;
        let service = self.reader.get_service(root_id).await?.ok_or_else(|| {
            DomainError::resolution(format!("no service registered for root resource {root_id}"))
        })?;
        self.effective_permissions(principal, service.service_type, &target)
            .await
    }

    async fn resolve_with(
        &self,
        principal: &Principal,
        target: &ResolvedTarget,
        permission: Permission,
        memo: &mut GrantMemo,
    ) -> DomainResult<EffectivePermission> {
        if let Some(inherited) = self.inherited(principal, target, permission) {
            return Ok(inherited);
        }

        for (depth, resource) in target.lineage().iter().enumerate() {
            let mut grants = self
                .matching_grants(principal, resource, permission, memo)
                .await?;
            // MATCH allows do not reach below their own resource.
            if depth > 0 {
                grants.retain(|g| g.scope == Scope::Recursive || g.access == Access::Deny);
            }
            if grants.is_empty() {
                continue;
            }
            let at_target = depth == 0 && target.is_exact();
            let access = decide(&grants, at_target);
            let provenance = if at_target {
                Provenance::Applied
            } else {
                Provenance::Derived
            };
            debug!(
                %permission,
                %access,
                resource = %resource.id,
                ?provenance,
                "permission decided by nearest grant"
            );
            return Ok(EffectivePermission {
                permission,
                access,
                provenance,
                resource_id: Some(resource.id),
            });
        }

        debug!(%permission, "no applicable grant, denying by default");
        Ok(EffectivePermission {
            permission,
            access: Access::Deny,
            provenance: Provenance::Default,
            resource_id: None,
        })
    }

    /// Ownership and administrator short-circuit.
    fn inherited(
        &self,
        principal: &Principal,
        target: &ResolvedTarget,
        permission: Permission,
    ) -> Option<EffectivePermission> {
        let allow = |resource_id: Option<ResourceId>| EffectivePermission {
            permission,
            access: Access::Allow,
            provenance: Provenance::Inherited,
            resource_id,
        };

        if self
            .config
            .admin_group
            .is_some_and(|admin| principal.is_member(admin))
        {
            return Some(allow(None));
        }

        let service = target.service_resource();
        target
            .target()
            .into_iter()
            .chain(std::iter::once(service))
            .find(|resource| {
                resource
                    .owner_group_id
                    .is_some_and(|owner| self.is_member(principal, owner))
            })
            .map(|owner| allow(Some(owner.id)))
    }

    fn is_member(&self, principal: &Principal, group: GroupId) -> bool {
        principal.is_member(group) || self.config.anonymous_group == Some(group)
    }

    fn applies_to(&self, principal: &Principal, subject: &Subject) -> bool {
        match subject {
            Subject::Group(group) => self.is_member(principal, *group),
            Subject::User(_) => principal.matches(subject),
        }
    }

    /// Grants on `resource` for `permission` that concern the principal.
    async fn matching_grants(
        &self,
        principal: &Principal,
        resource: &Resource,
        permission: Permission,
        memo: &mut GrantMemo,
    ) -> DomainResult<Vec<PermissionSet>> {
        if !memo.contains_key(&resource.id) {
            let grants = self.reader.find_grants(resource.id).await?;
            if let Some(stray) = grants.iter().find(|g| g.resource_id != resource.id) {
                return Err(DomainError::resolution(format!(
                    "grant '{}' for resource {} returned while reading resource {}",
                    stray.permission, stray.resource_id, resource.id
                )));
            }
            memo.insert(resource.id, grants);
        }

        Ok(memo
            .get(&resource.id)
            .map(|grants| {
                grants
                    .iter()
                    .filter(|g| g.permission.name == permission)
                    .filter(|g| self.applies_to(principal, &g.subject))
                    .map(|g| g.permission)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Decision of the nearest resource holding applicable grants.
fn decide(grants: &[PermissionSet], at_target: bool) -> Access {
    if grants.iter().any(|g| g.access == Access::Deny) {
        return Access::Deny;
    }
    if at_target || grants.iter().any(|g| g.scope == Scope::Recursive) {
        Access::Allow
    } else {
        Access::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_wins_within_one_resource() {
        let grants = [
            PermissionSet::allow_recursive(Permission::Read),
            PermissionSet::deny_match(Permission::Read),
        ];
        assert_eq!(decide(&grants, true), Access::Deny);
        assert_eq!(decide(&grants, false), Access::Deny);
    }

    #[test]
    fn test_match_allow_only_applies_at_target() {
        let grants = [PermissionSet::allow_match(Permission::Write)];
        assert_eq!(decide(&grants, true), Access::Allow);
        assert_eq!(decide(&grants, false), Access::Deny);
    }

    #[test]
    fn test_recursive_allow_applies_everywhere() {
        let grants = [PermissionSet::allow_recursive(Permission::Read)];
        assert_eq!(decide(&grants, true), Access::Allow);
        assert_eq!(decide(&grants, false), Access::Allow);
    }
}
