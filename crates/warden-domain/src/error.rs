//! Domain error types for access-control decisions.

use thiserror::Error;

/// Domain-specific errors for access-control decisions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// No service is registered under the requested name.
    #[error("service not found: {service_name}")]
    ServiceNotFound { service_name: String },

    /// The resolved decision for the request is DENY.
    #[error("access forbidden to '{path}' on service '{service_name}' (permission: {permission})")]
    AccessForbidden {
        service_name: String,
        path: String,
        permission: String,
    },

    /// Malformed grant data or a broken tree invariant.
    #[error("resolution error: {message}")]
    ResolutionError { message: String },

    /// Resource lineage deeper than the configured bound.
    #[error("depth limit exceeded (max: {max_depth})")]
    DepthLimitExceeded { max_depth: u32 },

    /// Permission string that does not name a known permission set.
    #[error("invalid permission: {value}")]
    InvalidPermission { value: String },

    /// Request that the service type cannot map to a permission.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl DomainError {
    /// Returns true for internal faults, as opposed to decisions about the request.
    ///
    /// Internal faults are logged and surfaced as generic failures; they are
    /// never retried since resolution is deterministic.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DomainError::ResolutionError { .. }
                | DomainError::DepthLimitExceeded { .. }
                | DomainError::InvalidPermission { .. }
        )
    }

    /// Shorthand for [`DomainError::ResolutionError`].
    pub fn resolution(message: impl Into<String>) -> Self {
        DomainError::ResolutionError {
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
