//! Per-service-type request parsing.
//!
//! Maps the live request bound to a service handle to the resource path it
//! targets and the permissions it requires.

use crate::error::{DomainError, DomainResult};
use crate::model::{Permission, RequestParsing, ServiceTypeDescriptor};
use crate::request::ProxyRequest;

/// THREDDS catalog documents that address their parent directory.
const THREDDS_CATALOG_FILES: &[&str] = &["catalog.html", "catalog.xml"];

/// What a request asks for on a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedAccess {
    /// Resource names below the service; empty targets the service itself.
    pub resource_path: Vec<String>,
    /// Every listed permission must resolve to ALLOW.
    pub permissions: Vec<Permission>,
    /// Request-derived part of the ACL cache key (OWS operation or HTTP method).
    pub discriminator: String,
}

pub(crate) fn parse_requested_access(
    descriptor: &ServiceTypeDescriptor,
    request: &ProxyRequest,
    segments: &[String],
) -> DomainResult<RequestedAccess> {
    match descriptor.parsing {
        RequestParsing::ServiceOnly(permission) => Ok(RequestedAccess {
            resource_path: Vec::new(),
            permissions: vec![permission],
            discriminator: request.method().to_ascii_lowercase(),
        }),
        RequestParsing::HttpMethod => {
            let permission = match request.method() {
                "GET" | "HEAD" | "OPTIONS" => Permission::Read,
                _ => Permission::Write,
            };
            Ok(RequestedAccess {
                resource_path: segments.to_vec(),
                permissions: vec![permission],
                discriminator: request.method().to_ascii_lowercase(),
            })
        }
        RequestParsing::ThreddsPrefix => Ok(parse_thredds(request, segments)),
        RequestParsing::Ows {
            requests,
            target_params,
            qualified_targets,
        } => parse_ows(
            descriptor,
            request,
            requests,
            target_params,
            qualified_targets,
        ),
    }
}

fn parse_thredds(request: &ProxyRequest, segments: &[String]) -> RequestedAccess {
    let (permission, mut path) = match segments.split_first() {
        None => (Permission::Browse, Vec::new()),
        Some((prefix, rest)) if prefix.eq_ignore_ascii_case("catalog") => {
            (Permission::Browse, rest.to_vec())
        }
        Some((_, rest)) => (Permission::Read, rest.to_vec()),
    };
    if path.last().is_some_and(|last| {
        THREDDS_CATALOG_FILES
            .iter()
            .any(|f| last.eq_ignore_ascii_case(f))
    }) {
        path.pop();
    }
    RequestedAccess {
        resource_path: path,
        permissions: vec![permission],
        discriminator: request.method().to_ascii_lowercase(),
    }
}

fn parse_ows(
    descriptor: &ServiceTypeDescriptor,
    request: &ProxyRequest,
    requests: &[(&str, &'static [Permission])],
    target_params: &[&str],
    qualified_targets: bool,
) -> DomainResult<RequestedAccess> {
    let operation = request
        .query_param("request")
        .ok_or_else(|| DomainError::InvalidRequest {
            message: format!("missing 'request' parameter for {} service", descriptor.name),
        })?
        .to_ascii_lowercase();
    let permissions = requests
        .iter()
        .find(|(name, _)| *name == operation)
        .map(|(_, required)| required.to_vec())
        .ok_or_else(|| DomainError::InvalidRequest {
            message: format!(
                "unsupported request '{}' for {} service",
                operation, descriptor.name
            ),
        })?;

    let raw_target = target_params
        .iter()
        .find_map(|param| request.query_param(param))
        .filter(|value| !value.trim().is_empty());

    let resource_path = match raw_target {
        None => Vec::new(),
        Some(value) => vec![single_target(value, qualified_targets)?],
    };

    Ok(RequestedAccess {
        resource_path,
        permissions,
        discriminator: operation,
    })
}

/// Reduces a comma-separated target list to the one resource it addresses.
///
/// Targets spanning several resources are rejected rather than partially
/// evaluated.
fn single_target(value: &str, qualified: bool) -> DomainResult<String> {
    let mut targets = value.split(',').map(str::trim).filter(|t| !t.is_empty()).map(|t| {
        if qualified {
            t.split_once(':').map_or(t, |(workspace, _)| workspace)
        } else {
            t
        }
    });
    let first = targets.next().ok_or_else(|| DomainError::InvalidRequest {
        message: "empty target parameter".to_string(),
    })?;
    if targets.any(|t| t != first) {
        return Err(DomainError::InvalidRequest {
            message: format!("request targets more than one resource: '{value}'"),
        });
    }
    Ok(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Principal, ServiceType};

    fn parse(service_type: ServiceType, method: &str, uri: &str) -> DomainResult<RequestedAccess> {
        let request = ProxyRequest::new(method, uri, Principal::anonymous());
        let segments: Vec<String> = request
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        parse_requested_access(service_type.descriptor(), &request, &segments)
    }

    #[test]
    fn test_api_maps_methods_to_read_and_write() {
        let access = parse(ServiceType::Api, "GET", "/users/42").unwrap();
        assert_eq!(access.permissions, vec![Permission::Read]);
        assert_eq!(access.resource_path, vec!["users", "42"]);
        assert_eq!(access.discriminator, "get");

        let access = parse(ServiceType::Api, "POST", "/users").unwrap();
        assert_eq!(access.permissions, vec![Permission::Write]);
    }

    #[test]
    fn test_access_service_ignores_path() {
        let access = parse(ServiceType::Access, "DELETE", "/anything/below").unwrap();
        assert_eq!(access.permissions, vec![Permission::Access]);
        assert!(access.resource_path.is_empty());
    }

    #[test]
    fn test_thredds_prefix_selects_permission() {
        let access = parse(ServiceType::Thredds, "GET", "/catalog/data/catalog.html").unwrap();
        assert_eq!(access.permissions, vec![Permission::Browse]);
        assert_eq!(access.resource_path, vec!["data"]);

        let access = parse(ServiceType::Thredds, "GET", "/fileServer/data/file.nc").unwrap();
        assert_eq!(access.permissions, vec![Permission::Read]);
        assert_eq!(access.resource_path, vec!["data", "file.nc"]);

        let access = parse(ServiceType::Thredds, "GET", "/").unwrap();
        assert_eq!(access.permissions, vec![Permission::Browse]);
        assert!(access.resource_path.is_empty());
    }

    #[test]
    fn test_wps_request_parameter_selects_permission_and_process() {
        let access = parse(ServiceType::Wps, "GET", "/?request=GetCapabilities&service=WPS").unwrap();
        assert_eq!(access.permissions, vec![Permission::GetCapabilities]);
        assert!(access.resource_path.is_empty());
        assert_eq!(access.discriminator, "getcapabilities");

        let access = parse(ServiceType::Wps, "GET", "/?request=Execute&identifier=buffer").unwrap();
        assert_eq!(access.permissions, vec![Permission::Execute]);
        assert_eq!(access.resource_path, vec!["buffer"]);
    }

    #[test]
    fn test_ows_requires_known_request_parameter() {
        let err = parse(ServiceType::Wps, "GET", "/?service=WPS").unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest { .. }));

        let err = parse(ServiceType::Wms, "GET", "/?request=Execute").unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest { .. }));
    }

    #[test]
    fn test_wms_layers_resolve_to_workspace() {
        let access = parse(
            ServiceType::Wms,
            "GET",
            "/?request=GetMap&layers=climate:tas,climate:pr",
        )
        .unwrap();
        assert_eq!(access.permissions, vec![Permission::GetMap]);
        assert_eq!(access.resource_path, vec!["climate"]);
    }

    #[test]
    fn test_wfs_get_feature_with_lock_requires_both_permissions() {
        let access = parse(
            ServiceType::Wfs,
            "GET",
            "/?request=GetFeatureWithLock&typeNames=roads:primary",
        )
        .unwrap();
        assert_eq!(
            access.permissions,
            vec![Permission::GetFeature, Permission::LockFeature]
        );
        assert_eq!(access.resource_path, vec!["roads"]);
        assert_eq!(access.discriminator, "getfeaturewithlock");
    }

    #[test]
    fn test_targets_spanning_workspaces_are_rejected() {
        let err = parse(
            ServiceType::Wfs,
            "GET",
            "/?request=GetFeature&typeNames=open:roads,secret:bases",
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest { .. }));
    }
}
