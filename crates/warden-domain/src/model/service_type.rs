//! Service types and their static descriptors.
//!
//! Each service type is described by a [`ServiceTypeDescriptor`] in a fixed
//! table: the permissions meaningful on the service itself, the resource
//! types that may appear below it, and how an incoming request is mapped to
//! a resource path and the permissions it requires.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::permission::Permission;
use super::resource::ResourceType;

/// Closed set of supported service types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Access,
    Api,
    Thredds,
    Wps,
    Wms,
    Wfs,
}

/// How requests to a service type are turned into required permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestParsing {
    /// Every request requires one permission on the service itself.
    ServiceOnly(Permission),
    /// Path segments are resources; safe methods read, others write.
    HttpMethod,
    /// First segment is a THREDDS prefix selecting `browse` or `read`.
    ThreddsPrefix,
    /// OGC web service: `request=` selects the permissions and one of the
    /// target parameters names the resource.
    Ows {
        requests: &'static [(&'static str, &'static [Permission])],
        target_params: &'static [&'static str],
        /// Splits `workspace:layer` style targets on the first `:`.
        qualified_targets: bool,
    },
}

/// Static behavior attached to a service type.
#[derive(Debug)]
pub struct ServiceTypeDescriptor {
    pub service_type: ServiceType,
    pub name: &'static str,
    /// Permissions meaningful on the service resource itself.
    pub permissions: &'static [Permission],
    /// Resource types that may be created below the service.
    pub child_resource_types: &'static [ResourceType],
    pub parsing: RequestParsing,
}

static ACCESS: ServiceTypeDescriptor = ServiceTypeDescriptor {
    service_type: ServiceType::Access,
    name: "access",
    permissions: &[Permission::Access],
    child_resource_types: &[],
    parsing: RequestParsing::ServiceOnly(Permission::Access),
};

static API: ServiceTypeDescriptor = ServiceTypeDescriptor {
    service_type: ServiceType::Api,
    name: "api",
    permissions: &[Permission::Read, Permission::Write],
    child_resource_types: &[ResourceType::Route],
    parsing: RequestParsing::HttpMethod,
};

static THREDDS: ServiceTypeDescriptor = ServiceTypeDescriptor {
    service_type: ServiceType::Thredds,
    name: "thredds",
    permissions: &[Permission::Browse, Permission::Read, Permission::Write],
    child_resource_types: &[ResourceType::Directory, ResourceType::File],
    parsing: RequestParsing::ThreddsPrefix,
};

static WPS: ServiceTypeDescriptor = ServiceTypeDescriptor {
    service_type: ServiceType::Wps,
    name: "wps",
    permissions: &[
        Permission::GetCapabilities,
        Permission::DescribeProcess,
        Permission::Execute,
    ],
    child_resource_types: &[ResourceType::Process],
    parsing: RequestParsing::Ows {
        requests: &[
            ("getcapabilities", &[Permission::GetCapabilities]),
            ("describeprocess", &[Permission::DescribeProcess]),
            ("execute", &[Permission::Execute]),
        ],
        target_params: &["identifier"],
        qualified_targets: false,
    },
};

static WMS: ServiceTypeDescriptor = ServiceTypeDescriptor {
    service_type: ServiceType::Wms,
    name: "wms",
    permissions: &[
        Permission::GetCapabilities,
        Permission::GetMap,
        Permission::GetFeatureInfo,
        Permission::GetLegendGraphic,
        Permission::GetMetadata,
    ],
    child_resource_types: &[ResourceType::Workspace],
    parsing: RequestParsing::Ows {
        requests: &[
            ("getcapabilities", &[Permission::GetCapabilities]),
            ("getmap", &[Permission::GetMap]),
            ("getfeatureinfo", &[Permission::GetFeatureInfo]),
            ("getlegendgraphic", &[Permission::GetLegendGraphic]),
            ("getmetadata", &[Permission::GetMetadata]),
        ],
        target_params: &["layers", "layer"],
        qualified_targets: true,
    },
};

static WFS: ServiceTypeDescriptor = ServiceTypeDescriptor {
    service_type: ServiceType::Wfs,
    name: "wfs",
    permissions: &[
        Permission::GetCapabilities,
        Permission::DescribeFeatureType,
        Permission::GetFeature,
        Permission::LockFeature,
        Permission::Transaction,
    ],
    child_resource_types: &[ResourceType::Workspace],
    parsing: RequestParsing::Ows {
        requests: &[
            ("getcapabilities", &[Permission::GetCapabilities]),
            ("describefeaturetype", &[Permission::DescribeFeatureType]),
            ("getfeature", &[Permission::GetFeature]),
            ("lockfeature", &[Permission::LockFeature]),
            (
                "getfeaturewithlock",
                &[Permission::GetFeature, Permission::LockFeature],
            ),
            ("transaction", &[Permission::Transaction]),
        ],
        target_params: &["typenames", "typename"],
        qualified_targets: true,
    },
};

/// Lookup table of every service type descriptor.
pub static SERVICE_TYPES: [&ServiceTypeDescriptor; 6] = [&ACCESS, &API, &THREDDS, &WPS, &WMS, &WFS];

impl ServiceType {
    pub fn descriptor(self) -> &'static ServiceTypeDescriptor {
        match self {
            ServiceType::Access => &ACCESS,
            ServiceType::Api => &API,
            ServiceType::Thredds => &THREDDS,
            ServiceType::Wps => &WPS,
            ServiceType::Wms => &WMS,
            ServiceType::Wfs => &WFS,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.descriptor().name
    }

    pub fn permissions(self) -> &'static [Permission] {
        self.descriptor().permissions
    }

    pub fn allows_child(self, resource_type: ResourceType) -> bool {
        self.descriptor()
            .child_resource_types
            .contains(&resource_type)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SERVICE_TYPES
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.service_type)
            .ok_or_else(|| DomainError::resolution(format!("unknown service type '{s}'")))
    }
}
