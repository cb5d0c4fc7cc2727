//! Core domain layer for spanscope.
//!
//! This crate contains the domain models, the cursor pagination engine,
//! port traits (interfaces) and the query service for browsing traces.
//! It follows hexagonal architecture principles - this is the innermost
//! layer with no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    spanscope (binary)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    spanscope-graphql                        │
//! │                         (API)                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    spanscope-storage                        │
//! │                     (PostgreSQL)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   spanscope-core  ← YOU ARE HERE            │
//! │          (models, pagination, ports, services)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Trace, Span, TraceEvaluation)
//! - [`pagination`] - Opaque cursors, argument validation and the connection builder
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Query logic (TraceService)
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Connections
//!
//! Child collections are exposed as Relay-style connections. A request is
//! validated into a [`pagination::PageRequest`] before any I/O, then the
//! ordered rows coming out of a [`ports::SpanRepository`] stream are
//! windowed into a [`pagination::Connection`] in a single pass.
//!
//! ## Cursors
//!
//! Cursors are opaque, versioned and checksummed. They carry the row id and,
//! for sorted orders, the sort column value of the row they point at.

pub mod error;
pub mod metrics;
pub mod models;
pub mod pagination;
pub mod ports;
pub mod services;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
