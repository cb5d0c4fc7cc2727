//! Error types for the spanscope domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`PaginationError`] - Cursor decoding and pagination argument errors
//! - [`StorageError`] - Database/repository errors
//! - [`ServiceError`] - Top-level resolution errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Pagination Errors
// =============================================================================

/// Errors raised while decoding cursors or validating pagination arguments.
///
/// Both kinds are request-level validation failures: they are reported to
/// the caller before any fetch is attempted and must never be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// Cursor string is malformed or was not produced by this codec.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Page size or cursor combination is out of range or contradictory.
    #[error("Invalid pagination arguments: {0}")]
    InvalidPaginationArgs(String),
}

impl PaginationError {
    /// Short label used for metrics and API error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCursor(_) => "invalid_cursor",
            Self::InvalidPaginationArgs(_) => "invalid_pagination_args",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// These errors originate from storage operations like queries
/// and row deserialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Row data could not be mapped onto a domain model.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Service Errors
// =============================================================================

/// Top-level error returned when resolving a trace field.
///
/// This is the main error type returned by [`crate::services::TraceService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request was rejected before any fetch was attempted.
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// The fetch collaborator failed; the page was abandoned.
    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(#[from] StorageError),
}

impl ServiceError {
    /// Stable error code exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pagination(PaginationError::InvalidCursor(_)) => "INVALID_CURSOR",
            Self::Pagination(PaginationError::InvalidPaginationArgs(_)) => {
                "INVALID_PAGINATION_ARGS"
            }
            Self::UpstreamFetch(_) => "UPSTREAM_FETCH",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for cursor and argument validation.
pub type PaginationResult<T> = Result<T, PaginationError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
