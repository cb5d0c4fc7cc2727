//! Trace evaluation repository implementation for PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use spanscope_core::error::{StorageError, StorageResult};
use spanscope_core::models::TraceEvaluation;
use spanscope_core::ports::EvaluationRepository;

use super::helpers::parse_column;

/// PostgreSQL implementation of EvaluationRepository.
pub struct PgEvaluationRepository {
    pool: PgPool,
}

impl PgEvaluationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationRepository for PgEvaluationRepository {
    async fn evaluations_for_traces(
        &self,
        trace_rowids: &[i64],
    ) -> StorageResult<HashMap<i64, Vec<TraceEvaluation>>> {
        if trace_rowids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT id, trace_rowid, name, label, score, explanation,
                   metadata, annotator_kind
            FROM trace_evaluations
            WHERE trace_rowid = ANY($1)
            ORDER BY trace_rowid, id
            "#,
        )
        .bind(trace_rowids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        debug!(
            traces = trace_rowids.len(),
            evaluations = rows.len(),
            "Loaded trace evaluations"
        );

        group_by_trace(rows)
    }
}

fn group_by_trace(rows: Vec<EvaluationRow>) -> StorageResult<HashMap<i64, Vec<TraceEvaluation>>> {
    let mut by_trace: HashMap<i64, Vec<TraceEvaluation>> = HashMap::new();
    for row in rows {
        let evaluation = row.into_evaluation()?;
        by_trace
            .entry(evaluation.trace_rowid)
            .or_default()
            .push(evaluation);
    }
    Ok(by_trace)
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct EvaluationRow {
    id: i64,
    trace_rowid: i64,
    name: String,
    label: Option<String>,
    score: Option<f64>,
    explanation: Option<String>,
    metadata: serde_json::Value,
    annotator_kind: String,
}

impl EvaluationRow {
    fn into_evaluation(self) -> StorageResult<TraceEvaluation> {
        let annotator_kind = parse_column(&self.annotator_kind, "evaluation.annotator_kind")?;

        Ok(TraceEvaluation {
            id: self.id,
            trace_rowid: self.trace_rowid,
            name: self.name,
            label: self.label,
            score: self.score,
            explanation: self.explanation,
            metadata: self.metadata,
            annotator_kind,
        })
    }
}
