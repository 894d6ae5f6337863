//! Configuration for the permission resolver.

use crate::model::GroupId;

/// Configuration for the permission resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum resource tree depth below a service, the service included.
    pub max_depth: u32,
    /// Members of this group are allowed everything.
    pub admin_group: Option<GroupId>,
    /// Group every principal implicitly belongs to, used for public access.
    pub anonymous_group: Option<GroupId>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            admin_group: None,
            anonymous_group: None,
        }
    }
}

impl ResolverConfig {
    /// Sets the maximum tree depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the administrator group.
    pub fn with_admin_group(mut self, group: GroupId) -> Self {
        self.admin_group = Some(group);
        self
    }

    /// Sets the group granting public access.
    pub fn with_anonymous_group(mut self, group: GroupId) -> Self {
        self.anonymous_group = Some(group);
        self
    }
}
