//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in `spanscope-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgRepositories`] - Composite repository implementing `Repositories` trait
//! - Individual repos: `PgTraceRepository`, `PgSpanRepository`, `PgEvaluationRepository`
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::new(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(Arc::new(db));
//! ```

mod database;
mod evaluation_repo;
mod helpers;
mod span_repo;
mod trace_repo;

pub use database::{Database, DatabaseConfig};
pub use evaluation_repo::PgEvaluationRepository;
pub use span_repo::PgSpanRepository;
pub use trace_repo::PgTraceRepository;

use std::sync::Arc;

use async_trait::async_trait;
use spanscope_core::error::StorageResult;
use spanscope_core::ports::{
    EvaluationRepository, Repositories, SpanRepository, TraceRepository,
};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories` trait.
///
/// All repositories share the pool owned by the same [`Database`].
pub struct PgRepositories {
    db: Arc<Database>,
    traces: PgTraceRepository,
    spans: PgSpanRepository,
    evaluations: PgEvaluationRepository,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: Arc<Database>) -> Self {
        let pool = db.pool().clone();
        Self {
            traces: PgTraceRepository::new(&db),
            spans: PgSpanRepository::new(pool.clone()),
            evaluations: PgEvaluationRepository::new(pool),
            db,
        }
    }
}

#[async_trait]
impl Repositories for PgRepositories {
    fn traces(&self) -> &dyn TraceRepository {
        &self.traces
    }

    fn spans(&self) -> &dyn SpanRepository {
        &self.spans
    }

    fn evaluations(&self) -> &dyn EvaluationRepository {
        &self.evaluations
    }

    async fn ping(&self) -> StorageResult<()> {
        self.db.ping().await
    }
}
