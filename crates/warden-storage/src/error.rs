//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Resource not found.
    #[error("resource not found: {resource_id}")]
    ResourceNotFound { resource_id: i64 },

    /// A service with that name already exists.
    #[error("service already exists: {name}")]
    ServiceAlreadyExists { name: String },

    /// A sibling with the same name already exists.
    #[error("resource '{name}' already exists under {parent_id}")]
    DuplicateResource { parent_id: i64, name: String },

    /// The parent's type does not accept children.
    #[error("resource {parent_id} of type '{parent_type}' cannot have children")]
    ChildNotAllowed { parent_id: i64, parent_type: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
