//! Storage layer for spanscope.
//!
//! This crate provides PostgreSQL implementations of the repository traits
//! defined in `spanscope-core`. It handles connection pooling, migrations
//! and the ordered span queries that feed the pagination engine.
//!
//! # Architecture
//!
//! The storage layer follows the repository pattern:
//!
//! - [`postgres::Database`] - Connection pool management
//! - [`postgres::PgRepositories`] - Composite repository for all entity types
//! - Individual repositories for traces, spans and trace evaluations
//!
//! # Usage
//!
//! ```ignore
//! use spanscope_storage::{Database, DatabaseConfig, PgRepositories};
//!
//! // Connect to the database
//! let config = DatabaseConfig::new(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! // Create repositories
//! let repositories = Arc::new(PgRepositories::new(Arc::new(db)));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgRepositories};
