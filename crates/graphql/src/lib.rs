//! GraphQL API for spanscope.
//!
//! Provides a GraphQL endpoint to browse traces, page through their spans
//! and load trace evaluations.
//!
//! # Building the Schema
//!
//! ```ignore
//! use spanscope_core::pagination::PaginationConfig;
//! use spanscope_core::services::TraceService;
//! use spanscope_graphql::{build_schema, serve, ServerConfig};
//!
//! let service = TraceService::new(repositories, PaginationConfig::default());
//! let schema = build_schema(service.clone());
//! serve(schema, service, ServerConfig::default()).await?;
//! ```

mod error;
mod loader;
mod schema;
mod server;
mod types;

pub use error::{service_error, INVALID_ID};
pub use loader::EvaluationLoader;
pub use schema::{
    build_schema, schema_builder, PageInfo, Query, SortDirection, SpanColumn, SpanSort,
    MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH,
};
pub use server::{serve, serve_with_shutdown, ServerConfig};
pub use types::{decode_global_id, encode_global_id, SpanscopeSchema};
