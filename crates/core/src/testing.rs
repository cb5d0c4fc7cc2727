//! In-memory repositories for tests.
//!
//! Mirrors what the Postgres adapter does closely enough for service and
//! resolver tests: spans come back in the requested total order, bounded by
//! the fetch limit, and every pulled row is counted.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use futures::stream;

use crate::error::{StorageError, StorageResult};
use crate::models::{AnnotatorKind, Span, SpanStatusCode, Trace, TraceEvaluation};
use crate::pagination::OrderDirection;
use crate::ports::{
    EvaluationRepository, Repositories, RowStream, SpanFetch, SpanOrder, SpanRepository,
    SpanSortColumn, TraceRepository,
};

/// Repositories backed by plain vectors.
#[derive(Debug, Default)]
pub struct InMemoryRepositories {
    pub traces: Vec<Trace>,
    pub spans: Vec<Span>,
    pub evaluations: Vec<TraceEvaluation>,
    /// Span rows handed out by `stream_spans`, across all calls.
    pub rows_pulled: Arc<AtomicUsize>,
    /// Yield a query error in place of the row at this position.
    pub fail_spans_at: Option<usize>,
    /// Fail health pings.
    pub unavailable: bool,
}

#[async_trait]
impl Repositories for InMemoryRepositories {
    fn traces(&self) -> &dyn TraceRepository {
        self
    }

    fn spans(&self) -> &dyn SpanRepository {
        self
    }

    fn evaluations(&self) -> &dyn EvaluationRepository {
        self
    }

    async fn ping(&self) -> StorageResult<()> {
        if self.unavailable {
            return Err(StorageError::ConnectionError("store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TraceRepository for InMemoryRepositories {
    async fn get_trace(&self, id: i64) -> StorageResult<Option<Trace>> {
        Ok(self.traces.iter().find(|t| t.id == id).cloned())
    }

    async fn get_trace_by_trace_id(&self, trace_id: &str) -> StorageResult<Option<Trace>> {
        Ok(self.traces.iter().find(|t| t.trace_id == trace_id).cloned())
    }
}

impl SpanRepository for InMemoryRepositories {
    fn stream_spans(&self, trace_rowid: i64, fetch: SpanFetch) -> RowStream<'_, Span> {
        let mut spans: Vec<Span> = self
            .spans
            .iter()
            .filter(|s| s.trace_rowid == trace_rowid)
            .cloned()
            .collect();
        spans.sort_by(|a, b| compare(fetch.order, a, b));
        if let Some(limit) = fetch.limit {
            spans.truncate(limit);
        }

        let fail_at = self.fail_spans_at;
        let pulled = self.rows_pulled.clone();
        let order = fetch.order;
        let rows = spans.into_iter().enumerate().map(move |(i, span)| {
            pulled.fetch_add(1, AtomicOrdering::SeqCst);
            if fail_at == Some(i) {
                return Err(StorageError::QueryError("connection reset".into()));
            }
            Ok(order.row(span))
        });

        // `stream::iter` pulls lazily, so the counter only sees polled rows.
        Box::pin(stream::iter(rows))
    }
}

#[async_trait]
impl EvaluationRepository for InMemoryRepositories {
    async fn evaluations_for_traces(
        &self,
        trace_rowids: &[i64],
    ) -> StorageResult<HashMap<i64, Vec<TraceEvaluation>>> {
        let mut by_trace: HashMap<i64, Vec<TraceEvaluation>> = HashMap::new();
        for evaluation in &self.evaluations {
            if trace_rowids.contains(&evaluation.trace_rowid) {
                by_trace
                    .entry(evaluation.trace_rowid)
                    .or_default()
                    .push(evaluation.clone());
            }
        }
        Ok(by_trace)
    }
}

fn compare(order: SpanOrder, a: &Span, b: &Span) -> Ordering {
    let by_column = match order.column {
        Some(SpanSortColumn::StartTime) => a.start_time.cmp(&b.start_time),
        Some(SpanSortColumn::LatencyMs) => a.latency_ms().total_cmp(&b.latency_ms()),
        Some(SpanSortColumn::CumulativeTokenCount) => a
            .cumulative_llm_token_count_total()
            .cmp(&b.cumulative_llm_token_count_total()),
        None => Ordering::Equal,
    };
    let ordering = by_column.then(a.id.cmp(&b.id));
    match order.direction {
        OrderDirection::Asc => ordering,
        OrderDirection::Desc => ordering.reverse(),
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A trace starting at the epoch.
pub fn trace(id: i64, trace_id: &str) -> Trace {
    let start = DateTime::from_timestamp(0, 0).unwrap_or_default();
    Trace {
        id,
        trace_id: trace_id.to_string(),
        project_id: 1,
        start_time: start,
        end_time: start + Duration::seconds(1),
    }
}

/// A span lasting `latency_ms`. Start times follow the row id.
pub fn span(id: i64, trace_rowid: i64, latency_ms: i64) -> Span {
    let start = DateTime::from_timestamp(id, 0).unwrap_or_default();
    Span {
        id,
        trace_rowid,
        span_id: format!("{id:016x}"),
        parent_id: (id != 1).then(|| format!("{:016x}", 1)),
        name: format!("span-{id}"),
        span_kind: "LLM".to_string(),
        start_time: start,
        end_time: start + Duration::milliseconds(latency_ms),
        attributes: serde_json::json!({}),
        events: serde_json::json!([]),
        status_code: SpanStatusCode::Ok,
        status_message: String::new(),
        cumulative_error_count: 0,
        cumulative_llm_token_count_prompt: (id * 100) as i32,
        cumulative_llm_token_count_completion: 10,
    }
}

/// A human-annotated evaluation with a label and a score.
pub fn evaluation(id: i64, trace_rowid: i64, name: &str) -> TraceEvaluation {
    TraceEvaluation {
        id,
        trace_rowid,
        name: name.to_string(),
        label: Some("correct".to_string()),
        score: Some(1.0),
        explanation: None,
        metadata: serde_json::json!({}),
        annotator_kind: AnnotatorKind::Human,
    }
}
