//! Port traits for data repositories.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (e.g., `spanscope-storage`).

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::StorageResult;
use crate::models::{Span, Trace, TraceEvaluation};
use crate::pagination::{OrderDirection, Row, SortValue, SortValueKind};

// =============================================================================
// Fetch Types
// =============================================================================

/// Ordered stream of rows.
///
/// Dropping the stream must cancel the underlying query.
pub type RowStream<'a, T> = Pin<Box<dyn Stream<Item = StorageResult<Row<T>>> + Send + 'a>>;

/// Secondary column spans can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSortColumn {
    StartTime,
    LatencyMs,
    CumulativeTokenCount,
}

impl SpanSortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartTime => "start_time",
            Self::LatencyMs => "latency_ms",
            Self::CumulativeTokenCount => "cumulative_token_count",
        }
    }

    /// Kind of sort value cursors carry for this column.
    pub fn value_kind(self) -> SortValueKind {
        match self {
            Self::StartTime => SortValueKind::Time,
            Self::LatencyMs => SortValueKind::Float,
            Self::CumulativeTokenCount => SortValueKind::Int,
        }
    }

    /// Value of this column for a span.
    pub fn sort_value(self, span: &Span) -> SortValue {
        match self {
            Self::StartTime => SortValue::Time(span.start_time),
            Self::LatencyMs => SortValue::Float(span.latency_ms()),
            Self::CumulativeTokenCount => SortValue::Int(span.cumulative_llm_token_count_total()),
        }
    }
}

/// Total order for spans.
///
/// Rows are ordered by `column` (when set) and then by row id, both in
/// `direction`, so the order is strict even when column values tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanOrder {
    pub column: Option<SpanSortColumn>,
    pub direction: OrderDirection,
}

impl Default for SpanOrder {
    /// Newest row first: root spans tend to be ingested last.
    fn default() -> Self {
        Self {
            column: None,
            direction: OrderDirection::Desc,
        }
    }
}

impl SpanOrder {
    /// Tag carried by cursors issued for this order, e.g. `latency_ms.asc`.
    pub fn tag(&self) -> String {
        let column = self.column.map_or("id", SpanSortColumn::as_str);
        format!("{column}.{}", self.direction.as_str())
    }

    /// Same columns, opposite direction.
    pub fn reversed(self) -> Self {
        Self {
            column: self.column,
            direction: self.direction.reversed(),
        }
    }

    /// Wrap a span into a row keyed for this order.
    pub fn row(&self, span: Span) -> Row<Span> {
        let mut row = match self.column {
            Some(column) => Row::with_sort(span.id, column.sort_value(&span), span),
            None => Row::new(span.id, span),
        };
        row.key.order = Some(self.tag());
        row
    }

    /// Type of sort value cursors for this order carry.
    pub fn value_kind(&self) -> Option<SortValueKind> {
        self.column.map(SpanSortColumn::value_kind)
    }
}

/// Ordered fetch request for the spans of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanFetch {
    pub order: SpanOrder,
    /// Maximum number of rows, lookahead included. `None` streams them all.
    pub limit: Option<usize>,
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for trace data.
#[async_trait]
pub trait TraceRepository: Send + Sync {
    /// Get trace by row id.
    async fn get_trace(&self, id: i64) -> StorageResult<Option<Trace>>;

    /// Get trace by its external trace id.
    async fn get_trace_by_trace_id(&self, trace_id: &str) -> StorageResult<Option<Trace>>;
}

/// Repository for span data.
pub trait SpanRepository: Send + Sync {
    /// Stream the spans of a trace in the requested order.
    ///
    /// Each row's cursor key carries the sort column value when
    /// `fetch.order.column` is set.
    fn stream_spans(&self, trace_rowid: i64, fetch: SpanFetch) -> RowStream<'_, Span>;
}

/// Repository for trace evaluations.
#[async_trait]
pub trait EvaluationRepository: Send + Sync {
    /// Load evaluations for a batch of traces, keyed by trace row id.
    ///
    /// Traces without evaluations may be absent from the map.
    async fn evaluations_for_traces(
        &self,
        trace_rowids: &[i64],
    ) -> StorageResult<HashMap<i64, Vec<TraceEvaluation>>>;
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Combined repository access for the query service.
#[async_trait]
pub trait Repositories: Send + Sync {
    /// Access the trace repository.
    fn traces(&self) -> &dyn TraceRepository;

    /// Access the span repository.
    fn spans(&self) -> &dyn SpanRepository;

    /// Access the evaluation repository.
    fn evaluations(&self) -> &dyn EvaluationRepository;

    /// Check that the backing store answers.
    async fn ping(&self) -> StorageResult<()>;
}
