//! Access-control data model.

mod permission;
mod resource;
mod service_type;

pub use permission::{Access, Permission, PermissionSet, Scope};
pub use resource::{
    GroupId, PermissionGrant, Principal, Resource, ResourceId, ResourceType, Service, Subject,
    UserId,
};
pub use service_type::{RequestParsing, ServiceType, ServiceTypeDescriptor, SERVICE_TYPES};
