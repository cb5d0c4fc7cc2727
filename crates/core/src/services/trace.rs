//! Trace query service - resolves trace fields through the pagination engine.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use crate::error::{PaginationResult, ServiceResult, StorageError, StorageResult};
use crate::metrics::{
    record_connection_built, record_pagination_rejection, record_upstream_fetch_error, BuildTimer,
};
use crate::models::{Span, Trace, TraceEvaluation};
use crate::pagination::{
    try_build_connection, try_build_connection_from_stream, Connection, PageRequest,
    PaginationArgs, PaginationConfig, Row,
};
use crate::ports::{Repositories, SpanFetch, SpanOrder};

/// Query service for traces and their children.
///
/// # Flow
///
/// 1. Validate pagination arguments (no I/O on failure)
/// 2. Ask the span repository for an ordered stream, bounded to
///    `page + 1` rows when the request allows it. An anchor-free `last`
///    page reads `last + 1` rows in the reverse order instead.
/// 3. Window the stream into a connection, dropping it once decided
#[derive(Clone)]
pub struct TraceService {
    repositories: Arc<dyn Repositories>,
    pagination: PaginationConfig,
}

impl TraceService {
    pub fn new(repositories: Arc<dyn Repositories>, pagination: PaginationConfig) -> Self {
        Self {
            repositories,
            pagination,
        }
    }

    /// Check that the store behind the service answers.
    pub async fn ping(&self) -> ServiceResult<()> {
        Ok(self.repositories.ping().await?)
    }

    /// Get a trace by row id.
    pub async fn trace(&self, id: i64) -> ServiceResult<Option<Trace>> {
        Ok(self.repositories.traces().get_trace(id).await?)
    }

    /// Get a trace by its external trace id.
    pub async fn trace_by_trace_id(&self, trace_id: &str) -> ServiceResult<Option<Trace>> {
        Ok(self
            .repositories
            .traces()
            .get_trace_by_trace_id(trace_id)
            .await?)
    }

    /// Page through the spans of a trace.
    #[instrument(skip(self, args), fields(trace = trace_rowid))]
    pub async fn span_connection(
        &self,
        trace_rowid: i64,
        args: &PaginationArgs,
        order: SpanOrder,
    ) -> ServiceResult<Connection<Span>> {
        let request = self.validate(args, order)?;

        let _timer = BuildTimer::new();
        let (connection, scanned) = match self.window_spans(trace_rowid, order, &request).await {
            Ok(built) => built,
            Err(e) => {
                record_upstream_fetch_error();
                warn!(error = %e, "Span fetch failed, page abandoned");
                return Err(e.into());
            }
        };

        record_connection_built(scanned);
        Ok(connection)
    }

    /// Load evaluations for a batch of traces.
    pub async fn evaluations_for_traces(
        &self,
        trace_rowids: &[i64],
    ) -> ServiceResult<HashMap<i64, Vec<TraceEvaluation>>> {
        Ok(self
            .repositories
            .evaluations()
            .evaluations_for_traces(trace_rowids)
            .await?)
    }

    /// Fetch and window the spans, returning the connection and the number
    /// of rows read.
    async fn window_spans(
        &self,
        trace_rowid: i64,
        order: SpanOrder,
        request: &PageRequest,
    ) -> StorageResult<(Connection<Span>, usize)> {
        let spans = self.repositories.spans();

        if let Some(limit) = request.tail_limit() {
            let fetch = SpanFetch {
                order: order.reversed(),
                limit: Some(limit),
            };
            debug!(limit, "Fetching span tail in reverse order");

            let mut tail: Vec<Row<Span>> = spans
                .stream_spans(trace_rowid, fetch)
                .map_ok(|row| order.row(row.node))
                .try_collect()
                .await?;
            let scanned = tail.len();
            tail.reverse();
            let connection = try_build_connection(tail.into_iter().map(Ok::<_, StorageError>), request)?;
            return Ok((connection, scanned));
        }

        let fetch = SpanFetch {
            order,
            limit: request.fetch_limit(),
        };
        debug!(limit = ?fetch.limit, forward = request.is_forward(), "Fetching spans");

        let mut scanned = 0usize;
        let rows = spans
            .stream_spans(trace_rowid, fetch)
            .inspect(|_| scanned += 1);
        let connection = try_build_connection_from_stream(rows, request).await?;
        Ok((connection, scanned))
    }

    fn validate(&self, args: &PaginationArgs, order: SpanOrder) -> PaginationResult<PageRequest> {
        let result = args.validate(&self.pagination).and_then(|request| {
            request.ensure_order(&order.tag(), order.value_kind())?;
            Ok(request)
        });

        if let Err(e) = &result {
            record_pagination_rejection(e.kind());
            debug!(error = %e, "Pagination request rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PaginationError, ServiceError};
    use std::sync::atomic::Ordering;

    use crate::pagination::{OrderDirection, SortValue};
    use crate::ports::SpanSortColumn;
    use crate::testing::{span, InMemoryRepositories};

    fn service(repos: InMemoryRepositories) -> TraceService {
        TraceService::new(Arc::new(repos), PaginationConfig::default())
    }

    fn seeded() -> InMemoryRepositories {
        let mut repos = InMemoryRepositories::default();
        for id in 1..=5 {
            repos.spans.push(span(id, 7, id * 10));
        }
        repos.spans.push(span(99, 8, 0));
        repos
    }

    fn ids(conn: &Connection<Span>) -> Vec<i64> {
        conn.nodes().map(|s| s.id).collect()
    }

    #[tokio::test]
    async fn test_spans_default_to_newest_first() {
        let service = service(seeded());
        let page = service
            .span_connection(7, &PaginationArgs::first(2), SpanOrder::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![5, 4]);
        assert!(page.page_info.has_next_page);

        let next = PaginationArgs::first(2)
            .after(page.page_info.end_cursor.unwrap().into_string());
        let page = service
            .span_connection(7, &next, SpanOrder::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![3, 2]);
    }

    // Test critique: la requête bornée ne lit que page + 1 lignes
    #[tokio::test]
    async fn test_anchor_free_page_fetches_one_lookahead_row() {
        let repos = seeded();
        let pulled = repos.rows_pulled.clone();
        let service = service(repos);
        service
            .span_connection(7, &PaginationArgs::first(2), SpanOrder::default())
            .await
            .unwrap();
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_args_never_reach_the_store() {
        let repos = seeded();
        let pulled = repos.rows_pulled.clone();
        let service = service(repos);

        let err = service
            .span_connection(7, &PaginationArgs::first(-3), SpanOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Pagination(PaginationError::InvalidPaginationArgs(_))
        ));

        let err = service
            .span_connection(
                7,
                &PaginationArgs::first(2).after("bogus"),
                SpanOrder::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_CURSOR");
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sorted_order_carries_sort_key_in_cursor() {
        let service = service(seeded());
        let order = SpanOrder {
            column: Some(SpanSortColumn::LatencyMs),
            direction: OrderDirection::Asc,
        };
        let page = service
            .span_connection(7, &PaginationArgs::first(1), order)
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![1]);
        let key = page.edges[0].cursor.decode().unwrap();
        assert_eq!(key.sort, Some(SortValue::Float(10.0)));

        // Un curseur trié ne s'applique pas à l'ordre par défaut
        let args = PaginationArgs::first(1).after(page.edges[0].cursor.as_str());
        let err = service
            .span_connection(7, &args, SpanOrder::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PAGINATION_ARGS");
    }

    // Test critique: un curseur d'un sens de tri ne s'applique pas au sens opposé
    #[tokio::test]
    async fn test_cursor_from_opposite_direction_rejected() {
        let repos = seeded();
        let pulled = repos.rows_pulled.clone();
        let service = service(repos);
        let asc = SpanOrder {
            column: Some(SpanSortColumn::LatencyMs),
            direction: OrderDirection::Asc,
        };
        let page = service
            .span_connection(7, &PaginationArgs::first(2), asc)
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
        let end = page.page_info.end_cursor.unwrap().into_string();
        let read_so_far = pulled.load(Ordering::SeqCst);

        let err = service
            .span_connection(7, &PaginationArgs::first(2).after(end.clone()), asc.reversed())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PAGINATION_ARGS");
        assert_eq!(pulled.load(Ordering::SeqCst), read_so_far);

        // Le même curseur reste valable dans son propre ordre
        let next = service
            .span_connection(7, &PaginationArgs::first(2).after(end), asc)
            .await
            .unwrap();
        assert_eq!(ids(&next), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_default_order_cursor_rejected_by_ascending_ids() {
        let service = service(seeded());
        let page = service
            .span_connection(7, &PaginationArgs::first(1), SpanOrder::default())
            .await
            .unwrap();
        let end = page.page_info.end_cursor.unwrap().into_string();

        let err = service
            .span_connection(
                7,
                &PaginationArgs::first(1).after(end),
                SpanOrder::default().reversed(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PAGINATION_ARGS");
    }

    // Test critique: last sans ancre lit la fin à rebours, pas toute la trace
    #[tokio::test]
    async fn test_anchor_free_last_reads_only_the_tail() {
        let repos = seeded();
        let pulled = repos.rows_pulled.clone();
        let service = service(repos);

        let page = service
            .span_connection(7, &PaginationArgs::last(2), SpanOrder::default())
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![2, 1]);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
        assert_eq!(pulled.load(Ordering::SeqCst), 3);

        // Les curseurs portent l'ordre demandé, pas l'ordre inversé de lecture
        let before = page.page_info.start_cursor.unwrap();
        assert_eq!(before.decode().unwrap().order.as_deref(), Some("id.desc"));
        let prev = service
            .span_connection(
                7,
                &PaginationArgs::last(2).before(before.into_string()),
                SpanOrder::default(),
            )
            .await
            .unwrap();
        assert_eq!(ids(&prev), vec![4, 3]);
        assert!(prev.page_info.has_previous_page);
        assert!(prev.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_tail_of_short_trace_has_no_previous_page() {
        let service = service(seeded());
        let order = SpanOrder {
            column: Some(SpanSortColumn::CumulativeTokenCount),
            direction: OrderDirection::Asc,
        };
        let page = service
            .span_connection(7, &PaginationArgs::last(10), order)
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3, 4, 5]);
        assert!(!page.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_tail_fetch_error_is_propagated() {
        let mut repos = seeded();
        repos.fail_spans_at = Some(0);
        let service = service(repos);
        let err = service
            .span_connection(7, &PaginationArgs::last(2), SpanOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamFetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_error_is_propagated() {
        let mut repos = seeded();
        repos.fail_spans_at = Some(1);
        let service = service(repos);
        let err = service
            .span_connection(7, &PaginationArgs::first(3), SpanOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamFetch(_)));
    }

    #[tokio::test]
    async fn test_ping_reports_store_state() {
        assert!(service(seeded()).ping().await.is_ok());

        let mut repos = seeded();
        repos.unavailable = true;
        let err = service(repos).ping().await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_FETCH");
    }

    #[tokio::test]
    async fn test_evaluations_grouped_by_trace() {
        let mut repos = seeded();
        repos.evaluations.push(crate::testing::evaluation(1, 7, "correctness"));
        repos.evaluations.push(crate::testing::evaluation(2, 7, "relevance"));
        repos.evaluations.push(crate::testing::evaluation(3, 8, "toxicity"));
        let service = service(repos);

        let by_trace = service.evaluations_for_traces(&[7, 9]).await.unwrap();
        assert_eq!(by_trace[&7].len(), 2);
        assert!(!by_trace.contains_key(&8));
        assert!(!by_trace.contains_key(&9));
    }
}
