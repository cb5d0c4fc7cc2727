//! Conversion of service errors into GraphQL errors.

use async_graphql::ErrorExtensions;

use spanscope_core::error::ServiceError;

/// Error code for malformed or foreign global ids.
pub const INVALID_ID: &str = "INVALID_ID";

/// Convert a service error into a GraphQL error carrying `extensions.code`.
pub fn service_error(err: &ServiceError) -> async_graphql::Error {
    let code = err.code();
    async_graphql::Error::new(err.to_string()).extend_with(|_, ext| ext.set("code", code))
}

/// GraphQL error with an explicit code.
pub(crate) fn coded_error(message: impl Into<String>, code: &'static str) -> async_graphql::Error {
    async_graphql::Error::new(message).extend_with(|_, ext| ext.set("code", code))
}
