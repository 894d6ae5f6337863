//! Permission names, access modifiers and scopes.
//!
//! A grant carries a [`PermissionSet`] whose canonical string form is
//! `<name>-<access>-<scope>`, e.g. `read-allow-recursive`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Permission name, independent of how it is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Access,
    Browse,
    Read,
    Write,
    GetCapabilities,
    GetMap,
    GetFeatureInfo,
    GetLegendGraphic,
    GetMetadata,
    GetFeature,
    DescribeFeatureType,
    LockFeature,
    Transaction,
    DescribeProcess,
    Execute,
}

impl Permission {
    /// Every known permission name.
    pub const ALL: [Permission; 15] = [
        Permission::Access,
        Permission::Browse,
        Permission::Read,
        Permission::Write,
        Permission::GetCapabilities,
        Permission::GetMap,
        Permission::GetFeatureInfo,
        Permission::GetLegendGraphic,
        Permission::GetMetadata,
        Permission::GetFeature,
        Permission::DescribeFeatureType,
        Permission::LockFeature,
        Permission::Transaction,
        Permission::DescribeProcess,
        Permission::Execute,
    ];

    /// Returns the lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Access => "access",
            Permission::Browse => "browse",
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::GetCapabilities => "getcapabilities",
            Permission::GetMap => "getmap",
            Permission::GetFeatureInfo => "getfeatureinfo",
            Permission::GetLegendGraphic => "getlegendgraphic",
            Permission::GetMetadata => "getmetadata",
            Permission::GetFeature => "getfeature",
            Permission::DescribeFeatureType => "describefeaturetype",
            Permission::LockFeature => "lockfeature",
            Permission::Transaction => "transaction",
            Permission::DescribeProcess => "describeprocess",
            Permission::Execute => "execute",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    /// Case-insensitive, so OWS `request=GetCapabilities` maps directly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::InvalidPermission {
                value: s.to_string(),
            })
    }
}

/// Whether a grant allows or denies its permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn as_str(self) -> &'static str {
        match self {
            Access::Allow => "allow",
            Access::Deny => "deny",
        }
    }

    pub fn is_allow(self) -> bool {
        self == Access::Allow
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far down the tree a grant reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Applies only to the resource carrying the grant.
    Match,
    /// Applies to the resource and all of its descendants.
    Recursive,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Match => "match",
            Scope::Recursive => "recursive",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission name together with its access and scope modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionSet {
    pub name: Permission,
    pub access: Access,
    pub scope: Scope,
}

impl PermissionSet {
    pub fn new(name: Permission, access: Access, scope: Scope) -> Self {
        Self {
            name,
            access,
            scope,
        }
    }

    pub fn allow_recursive(name: Permission) -> Self {
        Self::new(name, Access::Allow, Scope::Recursive)
    }

    pub fn allow_match(name: Permission) -> Self {
        Self::new(name, Access::Allow, Scope::Match)
    }

    pub fn deny_recursive(name: Permission) -> Self {
        Self::new(name, Access::Deny, Scope::Recursive)
    }

    pub fn deny_match(name: Permission) -> Self {
        Self::new(name, Access::Deny, Scope::Match)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.access, self.scope)
    }
}

impl FromStr for PermissionSet {
    type Err = DomainError;

    /// Parses `name`, `name-access` or `name-access-scope`.
    ///
    /// Missing modifiers default to `allow` and `recursive`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidPermission {
            value: s.to_string(),
        };
        let mut parts = s.trim().split('-');
        let name = parts.next().ok_or_else(invalid)?.parse::<Permission>()?;
        let access = match parts.next() {
            None => Access::Allow,
            Some(a) if a.eq_ignore_ascii_case("allow") => Access::Allow,
            Some(a) if a.eq_ignore_ascii_case("deny") => Access::Deny,
            Some(_) => return Err(invalid()),
        };
        let scope = match parts.next() {
            None => Scope::Recursive,
            Some(s) if s.eq_ignore_ascii_case("recursive") => Scope::Recursive,
            Some(s) if s.eq_ignore_ascii_case("match") => Scope::Match,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(PermissionSet::new(name, access, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names_parse_case_insensitively() {
        assert_eq!(
            "GetCapabilities".parse::<Permission>().unwrap(),
            Permission::GetCapabilities
        );
        assert_eq!("EXECUTE".parse::<Permission>().unwrap(), Permission::Execute);
        assert!("fly".parse::<Permission>().is_err());
    }

    #[test]
    fn test_permission_set_string_form() {
        let set = PermissionSet::deny_match(Permission::Write);
        assert_eq!(set.to_string(), "write-deny-match");
        assert_eq!("write-deny-match".parse::<PermissionSet>().unwrap(), set);
    }

    #[test]
    fn test_bare_permission_name_defaults_to_allow_recursive() {
        let set: PermissionSet = "read".parse().unwrap();
        assert_eq!(set, PermissionSet::allow_recursive(Permission::Read));

        let set: PermissionSet = "read-deny".parse().unwrap();
        assert_eq!(set.access, Access::Deny);
        assert_eq!(set.scope, Scope::Recursive);
    }

    #[test]
    fn test_malformed_permission_sets_are_rejected() {
        for value in [
            "",
            "read-maybe",
            "read-allow-sometimes",
            "read-allow-match-extra",
        ] {
            let err = value.parse::<PermissionSet>().unwrap_err();
            assert!(
                matches!(err, DomainError::InvalidPermission { .. }),
                "'{value}' should be rejected"
            );
        }
    }
}
