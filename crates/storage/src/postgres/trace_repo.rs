//! Trace repository implementation for PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use spanscope_core::error::{StorageError, StorageResult};
use spanscope_core::models::Trace;
use spanscope_core::ports::TraceRepository;

use super::database::Database;

/// PostgreSQL implementation of TraceRepository.
pub struct PgTraceRepository {
    pool: PgPool,
}

impl PgTraceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl TraceRepository for PgTraceRepository {
    async fn get_trace(&self, id: i64) -> StorageResult<Option<Trace>> {
        let row = sqlx::query_as::<_, TraceRow>(
            r#"
            SELECT id, trace_id, project_id, start_time, end_time
            FROM traces
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(Trace::from))
    }

    async fn get_trace_by_trace_id(&self, trace_id: &str) -> StorageResult<Option<Trace>> {
        let row = sqlx::query_as::<_, TraceRow>(
            r#"
            SELECT id, trace_id, project_id, start_time, end_time
            FROM traces
            WHERE trace_id = $1
            "#,
        )
        .bind(trace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(Trace::from))
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct TraceRow {
    id: i64,
    trace_id: String,
    project_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl From<TraceRow> for Trace {
    fn from(row: TraceRow) -> Self {
        Trace {
            id: row.id,
            trace_id: row.trace_id,
            project_id: row.project_id,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}
