//! Permission resolver.
//!
//! Given a principal, a target in a service's resource tree and the
//! permissions an operation requires, the resolver computes the effective
//! ALLOW/DENY decision by walking from the target up to its service.
//!
//! # Design Notes
//!
//! - **Nearest ancestor wins**: the first resource with an applicable grant
//!   decides; only within that resource does DENY beat ALLOW.
//! - **Unknown paths**: a requested path the store does not know is resolved
//!   against its nearest existing ancestor, so a parent's recursive policy
//!   still applies to children not yet registered.
//! - **Depth Limiting**: lineages longer than `max_depth` (default 25) are
//!   rejected, guarding against corrupted parent references.

mod config;
mod permission_resolver;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use config::ResolverConfig;
pub use permission_resolver::PermissionResolver;
pub use traits::ResourceReader;
pub use types::{Decision, EffectivePermission, Provenance, ResolvedTarget};
