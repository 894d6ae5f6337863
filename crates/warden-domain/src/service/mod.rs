//! Service resolution.
//!
//! A [`ServiceHandle`] pairs a principal-independent [`Service`] definition
//! with the request it is currently serving. Type-specific parsing reads the
//! query parameters and method of that bound request, so a handle reused for
//! a new request must first be [rebound](ServiceHandle::rebind).

mod parsing;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DomainError, DomainResult};
use crate::model::{Service, ServiceType, ServiceTypeDescriptor};
use crate::request::RequestContext;
use crate::resolver::ResourceReader;

pub use parsing::RequestedAccess;

/// Live handle on a service, bound to one request.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    service: Arc<Service>,
    request: RequestContext,
}

impl ServiceHandle {
    pub fn new(service: Service, request: RequestContext) -> Self {
        Self {
            service: Arc::new(service),
            request,
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn service_type(&self) -> ServiceType {
        self.service.service_type
    }

    pub fn descriptor(&self) -> &'static ServiceTypeDescriptor {
        self.service.service_type.descriptor()
    }

    /// The request this handle currently reads parameters from.
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Returns a handle on the same service bound to another request.
    ///
    /// The service definition is shared, only the request reference changes.
    pub fn rebind(&self, request: &RequestContext) -> Self {
        Self {
            service: Arc::clone(&self.service),
            request: Arc::clone(request),
        }
    }

    /// Interprets the bound request against this service's type.
    pub fn requested_access(&self, segments: &[String]) -> DomainResult<RequestedAccess> {
        parsing::parse_requested_access(self.descriptor(), &self.request, segments)
    }
}

/// Builds service handles from a parsed service name.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    /// Returns a handle bound to `request`, or `ServiceNotFound`.
    async fn get_service(
        &self,
        service_name: &str,
        request: &RequestContext,
    ) -> DomainResult<ServiceHandle>;
}

/// Store-backed service factory.
pub struct ServiceResolver<R> {
    reader: Arc<R>,
}

impl<R: ResourceReader> ServiceResolver<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: ResourceReader + 'static> ServiceFactory for ServiceResolver<R> {
    async fn get_service(
        &self,
        service_name: &str,
        request: &RequestContext,
    ) -> DomainResult<ServiceHandle> {
        let service = self
            .reader
            .find_service_by_name(service_name)
            .await?
            .ok_or_else(|| DomainError::ServiceNotFound {
                service_name: service_name.to_string(),
            })?;
        debug!(
            service = %service.name(),
            service_type = %service.service_type,
            "resolved service from store"
        );
        Ok(ServiceHandle::new(service, Arc::clone(request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Principal, Resource, ResourceId, ResourceType};
    use crate::request::ProxyRequest;
    use crate::resolver::tests::mocks::MockResourceReader;

    fn wps_service() -> Service {
        Service {
            resource: Resource {
                id: ResourceId(1),
                name: "wps".to_string(),
                resource_type: ResourceType::Service,
                parent_id: None,
                owner_group_id: None,
            },
            service_type: ServiceType::Wps,
            configuration: None,
        }
    }

    fn context(uri: &str) -> RequestContext {
        ProxyRequest::new("GET", uri, Principal::anonymous()).into_context()
    }

    #[test]
    fn test_rebind_reads_the_new_request() {
        let first = context("/wps?request=GetCapabilities");
        let second = context("/wps?request=Execute");
        let handle = ServiceHandle::new(wps_service(), first);

        let rebound = handle.rebind(&second);

        assert!(Arc::ptr_eq(rebound.request(), &second));
        assert_eq!(
            rebound.requested_access(&[]).unwrap().discriminator,
            "execute"
        );
        // The original handle is unchanged.
        assert_eq!(
            handle.requested_access(&[]).unwrap().discriminator,
            "getcapabilities"
        );
    }

    #[tokio::test]
    async fn test_resolver_finds_service_by_name() {
        let reader = Arc::new(MockResourceReader::new());
        reader.add_service(wps_service()).await;
        let resolver = ServiceResolver::new(reader);
        let request = context("/wps?request=GetCapabilities");

        let handle = resolver.get_service("wps", &request).await.unwrap();

        assert_eq!(handle.name(), "wps");
        assert_eq!(handle.service_type(), ServiceType::Wps);
        assert!(Arc::ptr_eq(handle.request(), &request));
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found() {
        let resolver = ServiceResolver::new(Arc::new(MockResourceReader::new()));

        let err = resolver
            .get_service("missing", &context("/missing"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::ServiceNotFound {
                service_name: "missing".to_string()
            }
        );
    }
}
