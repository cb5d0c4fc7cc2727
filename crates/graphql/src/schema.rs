//! GraphQL schema definition.
//!
//! This module provides the query root and object types for browsing
//! traces: span connections go through the cursor pagination engine,
//! trace evaluations through a batching data loader.

use async_graphql::dataloader::DataLoader;
use async_graphql::{
    ComplexObject, Context, EmptyMutation, EmptySubscription, Enum, InputObject, Object, Result,
    Schema, SchemaBuilder, SimpleObject, ID,
};
use chrono::{DateTime, Utc};

use spanscope_core::models::{AnnotatorKind, SpanStatusCode};
use spanscope_core::pagination::{OrderDirection, PaginationArgs};
use spanscope_core::ports::{SpanOrder, SpanSortColumn};
use spanscope_core::services::TraceService;

use crate::error::{coded_error, service_error, INVALID_ID};
use crate::loader::EvaluationLoader;
use crate::types::{decode_global_id, encode_global_id, SpanscopeSchema};

// -----------------------------------------------------------------------------
// Schema Configuration
// -----------------------------------------------------------------------------

/// Maximum query depth to prevent deeply nested queries (DoS protection).
/// Note: GraphQL introspection requires depth ~13, so we use 15 to allow it.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity score (DoS protection).
/// Each field has a default complexity of 1, nested objects multiply.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

/// Maximum length for trace id lookups.
const MAX_TRACE_ID_LENGTH: usize = 128;

// -----------------------------------------------------------------------------
// Schema Builder
// -----------------------------------------------------------------------------

/// Build the GraphQL schema with query depth and complexity limits.
pub fn build_schema(service: TraceService) -> SpanscopeSchema {
    schema_builder(service)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
        .finish()
}

/// Create a schema builder with the service and evaluation loader as data.
///
/// Remember to call `.limit_depth()` and `.limit_complexity()` before `.finish()`.
pub fn schema_builder(service: TraceService) -> SchemaBuilder<Query, EmptyMutation, EmptySubscription> {
    let evaluations = DataLoader::new(EvaluationLoader::new(service.clone()), tokio::spawn);
    Schema::build(Query, EmptyMutation, EmptySubscription)
        .data(service)
        .data(evaluations)
}

// -----------------------------------------------------------------------------
// Query Root
// -----------------------------------------------------------------------------

/// Query root.
#[derive(Default)]
pub struct Query;

#[Object]
impl Query {
    /// Get a trace by its external trace id.
    async fn trace<'ctx>(&self, ctx: &Context<'ctx>, trace_id: String) -> Result<Option<Trace>> {
        validate_trace_id(&trace_id)?;
        let service = ctx.data::<TraceService>()?;

        let trace = service
            .trace_by_trace_id(&trace_id)
            .await
            .map_err(|e| service_error(&e))?;
        Ok(trace.map(Trace::from))
    }

    /// Fetch a trace by Relay global id.
    async fn node<'ctx>(&self, ctx: &Context<'ctx>, id: ID) -> Result<Option<Trace>> {
        let rowid = match decode_global_id(&id) {
            Some((type_name, rowid)) if type_name == "Trace" => rowid,
            _ => return Err(coded_error(format!("Invalid node id: {}", id.as_str()), INVALID_ID)),
        };
        let service = ctx.data::<TraceService>()?;

        let trace = service.trace(rowid).await.map_err(|e| service_error(&e))?;
        Ok(trace.map(Trace::from))
    }
}

// -----------------------------------------------------------------------------
// GraphQL Types
// -----------------------------------------------------------------------------

/// A trace and its spans.
#[derive(SimpleObject)]
#[graphql(complex)]
pub struct Trace {
    #[graphql(skip)]
    pub rowid: i64,
    pub id: ID,
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<spanscope_core::models::Trace> for Trace {
    fn from(t: spanscope_core::models::Trace) -> Self {
        Self {
            rowid: t.id,
            id: ID(encode_global_id("Trace", t.id)),
            trace_id: t.trace_id,
            start_time: t.start_time,
            end_time: t.end_time,
        }
    }
}

#[ComplexObject]
impl Trace {
    /// Spans of this trace, newest first unless `sort` is given.
    async fn spans<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        first: Option<i32>,
        last: Option<i32>,
        after: Option<String>,
        before: Option<String>,
        sort: Option<SpanSort>,
    ) -> Result<SpanConnection> {
        let service = ctx.data::<TraceService>()?;

        let args = PaginationArgs {
            first,
            after,
            last,
            before,
        };
        let order = sort.map(SpanOrder::from).unwrap_or_default();

        let connection = service
            .span_connection(self.rowid, &args, order)
            .await
            .map_err(|e| service_error(&e))?;
        Ok(SpanConnection::from(connection))
    }

    /// Evaluations associated with the trace.
    async fn trace_evaluations<'ctx>(&self, ctx: &Context<'ctx>) -> Result<Vec<TraceEvaluation>> {
        let loader = ctx.data::<DataLoader<EvaluationLoader>>()?;

        let evaluations = loader
            .load_one(self.rowid)
            .await
            .map_err(|e| service_error(&e))?
            .unwrap_or_default();
        Ok(evaluations.into_iter().map(TraceEvaluation::from).collect())
    }
}

/// Span status.
#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error,
    Unset,
}

impl From<SpanStatusCode> for SpanStatus {
    fn from(code: SpanStatusCode) -> Self {
        match code {
            SpanStatusCode::Ok => Self::Ok,
            SpanStatusCode::Error => Self::Error,
            SpanStatusCode::Unset => Self::Unset,
        }
    }
}

/// Span type.
#[derive(SimpleObject)]
pub struct Span {
    pub id: ID,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub span_kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub latency_ms: f64,
    pub status_code: SpanStatus,
    pub status_message: String,
    pub attributes: serde_json::Value,
    pub events: serde_json::Value,
    pub cumulative_error_count: i32,
    pub cumulative_token_count_prompt: i32,
    pub cumulative_token_count_completion: i32,
    pub cumulative_token_count_total: i64,
}

impl From<spanscope_core::models::Span> for Span {
    fn from(s: spanscope_core::models::Span) -> Self {
        Self {
            id: ID(encode_global_id("Span", s.id)),
            latency_ms: s.latency_ms(),
            cumulative_token_count_total: s.cumulative_llm_token_count_total(),
            span_id: s.span_id,
            parent_id: s.parent_id,
            name: s.name,
            span_kind: s.span_kind,
            start_time: s.start_time,
            end_time: s.end_time,
            status_code: s.status_code.into(),
            status_message: s.status_message,
            attributes: s.attributes,
            events: s.events,
            cumulative_error_count: s.cumulative_error_count,
            cumulative_token_count_prompt: s.cumulative_llm_token_count_prompt,
            cumulative_token_count_completion: s.cumulative_llm_token_count_completion,
        }
    }
}

/// Who produced an evaluation.
#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq)]
#[graphql(name = "AnnotatorKind")]
pub enum AnnotatorKindValue {
    #[graphql(name = "LLM")]
    Llm,
    #[graphql(name = "HUMAN")]
    Human,
}

impl From<AnnotatorKind> for AnnotatorKindValue {
    fn from(kind: AnnotatorKind) -> Self {
        match kind {
            AnnotatorKind::Llm => Self::Llm,
            AnnotatorKind::Human => Self::Human,
        }
    }
}

/// Trace evaluation type.
#[derive(SimpleObject)]
pub struct TraceEvaluation {
    pub id: ID,
    pub name: String,
    pub label: Option<String>,
    pub score: Option<f64>,
    pub explanation: Option<String>,
    pub metadata: serde_json::Value,
    pub annotator_kind: AnnotatorKindValue,
}

impl From<spanscope_core::models::TraceEvaluation> for TraceEvaluation {
    fn from(e: spanscope_core::models::TraceEvaluation) -> Self {
        Self {
            id: ID(encode_global_id("TraceEvaluation", e.id)),
            name: e.name,
            label: e.label,
            score: e.score,
            explanation: e.explanation,
            metadata: e.metadata,
            annotator_kind: e.annotator_kind.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Sorting
// -----------------------------------------------------------------------------

/// Column spans can be sorted by.
#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanColumn {
    StartTime,
    LatencyMs,
    CumulativeTokenCount,
}

/// Sort direction.
#[derive(Enum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Desc,
    Asc,
}

/// Span ordering. Ties are broken by span row id in the same direction.
#[derive(InputObject, Clone, Copy, Debug)]
pub struct SpanSort {
    pub col: SpanColumn,
    #[graphql(default)]
    pub dir: SortDirection,
}

impl From<SortDirection> for OrderDirection {
    fn from(dir: SortDirection) -> Self {
        match dir {
            SortDirection::Asc => OrderDirection::Asc,
            SortDirection::Desc => OrderDirection::Desc,
        }
    }
}

impl From<SpanSort> for SpanOrder {
    fn from(sort: SpanSort) -> Self {
        let column = match sort.col {
            SpanColumn::StartTime => SpanSortColumn::StartTime,
            SpanColumn::LatencyMs => SpanSortColumn::LatencyMs,
            SpanColumn::CumulativeTokenCount => SpanSortColumn::CumulativeTokenCount,
        };
        SpanOrder {
            column: Some(column),
            direction: sort.dir.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Connection Types (Relay-style pagination)
// -----------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl From<spanscope_core::pagination::PageInfo> for PageInfo {
    fn from(info: spanscope_core::pagination::PageInfo) -> Self {
        Self {
            has_next_page: info.has_next_page,
            has_previous_page: info.has_previous_page,
            start_cursor: info.start_cursor.map(|c| c.into_string()),
            end_cursor: info.end_cursor.map(|c| c.into_string()),
        }
    }
}

/// Generate Relay-style connection types (Edge + Connection) with From impl.
macro_rules! define_connection {
    ($node:ty, $core_model:ty, $edge:ident, $connection:ident) => {
        #[derive(SimpleObject)]
        pub struct $edge {
            pub node: $node,
            pub cursor: String,
        }

        #[derive(SimpleObject)]
        pub struct $connection {
            pub edges: Vec<$edge>,
            pub page_info: PageInfo,
        }

        impl From<spanscope_core::pagination::Connection<$core_model>> for $connection {
            fn from(conn: spanscope_core::pagination::Connection<$core_model>) -> Self {
                Self {
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge {
                            node: <$node>::from(e.node),
                            cursor: e.cursor.into_string(),
                        })
                        .collect(),
                    page_info: PageInfo::from(conn.page_info),
                }
            }
        }
    };
}

define_connection!(Span, spanscope_core::models::Span, SpanEdge, SpanConnection);

// -----------------------------------------------------------------------------
// Helpers & Validation
// -----------------------------------------------------------------------------

/// Validate a trace id lookup argument.
fn validate_trace_id(trace_id: &str) -> Result<()> {
    if trace_id.is_empty() {
        return Err(async_graphql::Error::new("traceId cannot be empty"));
    }
    if trace_id.len() > MAX_TRACE_ID_LENGTH {
        return Err(async_graphql::Error::new(format!(
            "traceId too long: maximum {} characters allowed",
            MAX_TRACE_ID_LENGTH
        )));
    }
    Ok(())
}
