//! Span repository implementation for PostgreSQL.
//!
//! Every supported ordering maps to one static statement. The row id is
//! always the last `ORDER BY` term, in the same direction as the sort
//! column, so the order is total and matches what cursors assume.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::debug;

use spanscope_core::error::{StorageError, StorageResult};
use spanscope_core::models::Span;
use spanscope_core::pagination::OrderDirection;
use spanscope_core::ports::{RowStream, SpanFetch, SpanOrder, SpanRepository, SpanSortColumn};

use super::helpers::{limit_param, parse_column};

/// Expand to a full span query with the given `ORDER BY` terms.
///
/// `$1` is the trace row id, `$2` the row limit (`NULL` for none).
macro_rules! select_spans {
    ($order_by:literal) => {
        concat!(
            r#"
            SELECT id, trace_rowid, span_id, parent_id, name, span_kind,
                   start_time, end_time, attributes, events,
                   status_code, status_message, cumulative_error_count,
                   cumulative_llm_token_count_prompt,
                   cumulative_llm_token_count_completion
            FROM spans
            WHERE trace_rowid = $1
            ORDER BY "#,
            $order_by,
            r#"
            LIMIT $2
            "#
        )
    };
}

fn query_for(order: SpanOrder) -> &'static str {
    use OrderDirection::{Asc, Desc};
    use SpanSortColumn::{CumulativeTokenCount, LatencyMs, StartTime};

    match (order.column, order.direction) {
        (None, Asc) => select_spans!("id ASC"),
        (None, Desc) => select_spans!("id DESC"),
        (Some(StartTime), Asc) => select_spans!("start_time ASC, id ASC"),
        (Some(StartTime), Desc) => select_spans!("start_time DESC, id DESC"),
        (Some(LatencyMs), Asc) => select_spans!("(end_time - start_time) ASC, id ASC"),
        (Some(LatencyMs), Desc) => select_spans!("(end_time - start_time) DESC, id DESC"),
        (Some(CumulativeTokenCount), Asc) => select_spans!(
            "(cumulative_llm_token_count_prompt + cumulative_llm_token_count_completion) ASC, id ASC"
        ),
        (Some(CumulativeTokenCount), Desc) => select_spans!(
            "(cumulative_llm_token_count_prompt + cumulative_llm_token_count_completion) DESC, id DESC"
        ),
    }
}

// =============================================================================
// Repository Implementation
// =============================================================================

/// PostgreSQL implementation of SpanRepository.
pub struct PgSpanRepository {
    pool: PgPool,
}

impl PgSpanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SpanRepository for PgSpanRepository {
    fn stream_spans(&self, trace_rowid: i64, fetch: SpanFetch) -> RowStream<'_, Span> {
        debug!(trace_rowid, order = ?fetch.order, limit = ?fetch.limit, "Streaming spans");

        let order = fetch.order;
        let rows = sqlx::query_as::<_, SpanRow>(query_for(order))
            .bind(trace_rowid)
            .bind(limit_param(fetch.limit))
            .fetch(&self.pool)
            .map(move |row| {
                let span = row
                    .map_err(|e| StorageError::QueryError(e.to_string()))?
                    .into_span()?;
                Ok(order.row(span))
            });

        Box::pin(rows)
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct SpanRow {
    id: i64,
    trace_rowid: i64,
    span_id: String,
    parent_id: Option<String>,
    name: String,
    span_kind: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    attributes: serde_json::Value,
    events: serde_json::Value,
    status_code: String,
    status_message: String,
    cumulative_error_count: i32,
    cumulative_llm_token_count_prompt: i32,
    cumulative_llm_token_count_completion: i32,
}

impl SpanRow {
    fn into_span(self) -> StorageResult<Span> {
        let status_code = parse_column(&self.status_code, "span.status_code")?;

        Ok(Span {
            id: self.id,
            trace_rowid: self.trace_rowid,
            span_id: self.span_id,
            parent_id: self.parent_id,
            name: self.name,
            span_kind: self.span_kind,
            start_time: self.start_time,
            end_time: self.end_time,
            attributes: self.attributes,
            events: self.events,
            status_code,
            status_message: self.status_message,
            cumulative_error_count: self.cumulative_error_count,
            cumulative_llm_token_count_prompt: self.cumulative_llm_token_count_prompt,
            cumulative_llm_token_count_completion: self.cumulative_llm_token_count_completion,
        })
    }
}
