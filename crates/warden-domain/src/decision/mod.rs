//! Access control decision point.
//!
//! [`AccessControl`] answers one question for the proxy: may this request go
//! through. Per request it
//!
//! 1. parses the service name and raw path from the request,
//! 2. fetches the service handle through the service cache region,
//! 3. lets the service type interpret the request (resource path, required
//!    permissions, discriminator),
//! 4. locates the target below the service,
//! 5. resolves every required permission through the ACL cache region.
//!
//! No state other than the cache is touched, so decisions for concurrent
//! requests are independent.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::cache::{AccessCache, AclCacheKey};
use crate::error::{DomainError, DomainResult};
use crate::request::{RequestContext, RequestParser};
use crate::resolver::{Decision, PermissionResolver, ResolvedTarget, ResourceReader};
use crate::service::{RequestedAccess, ServiceFactory, ServiceHandle};

/// Everything computed while evaluating one request.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub service: ServiceHandle,
    pub requested: RequestedAccess,
    pub target: ResolvedTarget,
    pub decision: Decision,
}

impl Evaluation {
    /// Requested resource path below the service, `/`-joined.
    pub fn path(&self) -> String {
        self.requested.resource_path.join("/")
    }

    /// `Ok` only when the decision allows every required permission.
    ///
    /// Otherwise `AccessForbidden` names the first permission that was not
    /// allowed, or none when nothing was required.
    pub fn verdict(&self) -> DomainResult<()> {
        if self.decision.is_allowed() {
            return Ok(());
        }
        Err(DomainError::AccessForbidden {
            service_name: self.service.name().to_string(),
            path: self.path(),
            permission: self
                .decision
                .denied()
                .map(|p| p.permission.to_string())
                .unwrap_or_default(),
        })
    }
}

/// Long-lived decision point shared by all request handlers.
pub struct AccessControl<R, F> {
    parser: Arc<dyn RequestParser>,
    services: Arc<F>,
    resolver: PermissionResolver<R>,
    cache: Arc<AccessCache>,
}

impl<R, F> AccessControl<R, F>
where
    R: ResourceReader,
    F: ServiceFactory,
{
    pub fn new(
        parser: Arc<dyn RequestParser>,
        services: Arc<F>,
        resolver: PermissionResolver<R>,
        cache: Arc<AccessCache>,
    ) -> Self {
        Self {
            parser,
            services,
            resolver,
            cache,
        }
    }

    pub fn cache(&self) -> &AccessCache {
        &self.cache
    }

    pub fn resolver(&self) -> &PermissionResolver<R> {
        &self.resolver
    }

    /// Returns the service targeted by `request`, bound to it.
    pub async fn get_service(&self, request: &RequestContext) -> DomainResult<ServiceHandle> {
        let parsed = self.parser.parse(request)?;
        self.cache
            .service()
            .get_or_create(&parsed.service_name, request, self.services.as_ref())
            .await
    }

    /// Evaluates `request` without turning a denial into an error.
    pub async fn evaluate(&self, request: &RequestContext) -> DomainResult<Evaluation> {
        let parsed = self.parser.parse(request)?;
        let service = self
            .cache
            .service()
            .get_or_create(&parsed.service_name, request, self.services.as_ref())
            .await?;
        let requested = service.requested_access(&parsed.segments)?;
        let target = match self
            .resolver
            .locate(service.service(), &requested.resource_path)
            .await
        {
            Ok(target) => target,
            Err(err) => return Err(self.unless_service_removed(&service, err).await),
        };

        let principal = request.principal();
        let identity = principal.identity();
        let resource = target.cache_identity();
        let bypass = request.cache_bypass();

        let mut permissions = Vec::with_capacity(requested.permissions.len());
        for permission in requested.permissions.iter().copied() {
            let key = AclCacheKey::new(
                identity.clone(),
                resource.clone(),
                permission,
                requested.discriminator.clone(),
                service.service().id(),
            );
            let effective = self
                .cache
                .acl()
                .get_or_resolve(key, bypass, || {
                    self.resolver
                        .resolve_permission(principal, &target, permission)
                })
                .await;
            match effective {
                Ok(effective) => permissions.push(effective),
                Err(err) => return Err(self.unless_service_removed(&service, err).await),
            }
        }

        Ok(Evaluation {
            service,
            requested,
            target,
            decision: Decision::new(permissions),
        })
    }

    /// Turns an internal failure on a service deleted from the store into
    /// `ServiceNotFound`, dropping its stale cached handle.
    ///
    /// Any other error is returned unchanged.
    async fn unless_service_removed(&self, service: &ServiceHandle, err: DomainError) -> DomainError {
        if !err.is_internal() {
            return err;
        }
        let service_id = service.service().id();
        match self.resolver.reader().get_resource(service_id).await {
            Ok(None) => {
                warn!(service = %service.name(), %service_id, "service removed from store");
                self.cache.invalidate_service_id(service_id).await;
                DomainError::ServiceNotFound {
                    service_name: service.name().to_string(),
                }
            }
            _ => err,
        }
    }

    /// Allows `request` or fails with the reason it may not proceed.
    ///
    /// Returns `AccessForbidden` on denial and `ServiceNotFound` for an
    /// unknown service; other errors are internal or malformed requests.
    #[instrument(
        skip(self, request),
        fields(
            method = %request.method(),
            path = %request.path(),
            principal = %request.principal().identity()
        )
    )]
    pub async fn check_request(&self, request: &RequestContext) -> DomainResult<()> {
        let evaluation = match self.evaluate(request).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                if err.is_internal() {
                    error!(error = %err, "access evaluation failed");
                } else {
                    warn!(error = %err, "request rejected");
                }
                return Err(err);
            }
        };

        match evaluation.verdict() {
            Ok(()) => {
                info!(
                    service = %evaluation.service.name(),
                    resource = %evaluation.target.nearest().id,
                    "access allowed"
                );
                Ok(())
            }
            Err(err) => {
                let denied = evaluation.decision.denied();
                warn!(
                    service = %evaluation.service.name(),
                    permission = ?denied.map(|p| p.permission),
                    provenance = ?denied.map(|p| &p.provenance),
                    "access forbidden"
                );
                Err(err)
            }
        }
    }
}
