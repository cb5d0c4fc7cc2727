//! Connection builder.
//!
//! Windows an ordered source into a [`Connection`]. The source must already
//! be in a strict, stable total order; the builder never sorts, it only
//! walks the source once and keeps what the page needs:
//!
//! - `after` is an exclusive lower bound, `before` an exclusive upper bound.
//!   Scanning stops at the `before` anchor.
//! - `first` keeps at most `first + 1` rows (one lookahead row decides
//!   `has_next_page`). `last` keeps a ring buffer of `last + 1` rows.
//! - An anchor whose identifier never shows up in the scanned part of the
//!   source is treated as the sequence boundary: a missing `after` starts
//!   the page at the beginning, a missing `before` runs it to the end. A row
//!   referenced by a cursor may have been deleted between two requests, and
//!   restarting is preferred over failing the request.
//!
//! `has_previous_page` on a forward page is true when the `after` anchor was
//! found; `has_next_page` on a backward page is true when the `before`
//! anchor was found.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::PaginationResult;

use super::args::{PageBound, PageRequest, PaginationArgs, PaginationConfig};
use super::connection::{Connection, Row};

/// Window an already-fetched ordered list.
///
/// Validates `args` first, so a bad cursor or page size fails before the
/// rows are touched.
pub fn build_connection<T>(
    rows: impl IntoIterator<Item = Row<T>>,
    args: &PaginationArgs,
    config: &PaginationConfig,
) -> PaginationResult<Connection<T>> {
    let request = args.validate(config)?;
    let mut window = Window::new(&request);
    for row in rows {
        if window.push(row).is_break() {
            break;
        }
    }
    Ok(window.finish())
}

/// Window a fallible ordered iterator.
///
/// The first `Err` aborts the build and is returned as-is: no page is ever
/// built over a truncated source.
pub fn try_build_connection<T, E>(
    source: impl IntoIterator<Item = Result<Row<T>, E>>,
    request: &PageRequest,
) -> Result<Connection<T>, E> {
    let mut window = Window::new(request);
    for item in source {
        if window.push(item?).is_break() {
            break;
        }
    }
    Ok(window.finish())
}

/// Window a fallible ordered stream.
///
/// Polling stops as soon as the page is decided and the stream is dropped,
/// which cancels whatever query feeds it.
pub async fn try_build_connection_from_stream<T, E, S>(
    source: S,
    request: &PageRequest,
) -> Result<Connection<T>, E>
where
    S: Stream<Item = Result<Row<T>, E>>,
{
    let mut source = std::pin::pin!(source);
    let mut window = Window::new(request);
    while let Some(item) = source.next().await {
        if window.push(item?).is_break() {
            break;
        }
    }
    Ok(window.finish())
}

// =============================================================================
// Window
// =============================================================================

/// Single-pass windowing state.
struct Window<'r, T> {
    request: &'r PageRequest,
    /// Rows kept so far: page plus lookahead (forward), or ring buffer (backward).
    rows: VecDeque<Row<T>>,
    /// Forward only: rows seen while the `after` anchor is still missing.
    head: Vec<Row<T>>,
    seeking_after: bool,
    after_found: bool,
    before_found: bool,
    scanned: usize,
}

impl<'r, T> Window<'r, T> {
    fn new(request: &'r PageRequest) -> Self {
        let capacity = request.page_size() + 1;
        let seeking_after = request.is_forward() && request.after.is_some();
        Self {
            request,
            rows: VecDeque::with_capacity(capacity),
            head: if seeking_after {
                Vec::with_capacity(capacity)
            } else {
                Vec::new()
            },
            seeking_after,
            after_found: false,
            before_found: false,
            scanned: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.request.page_size() + 1
    }

    fn is_after(&self, row: &Row<T>) -> bool {
        self.request.after.as_ref().is_some_and(|k| k.id == row.key.id)
    }

    fn is_before(&self, row: &Row<T>) -> bool {
        self.request
            .before
            .as_ref()
            .is_some_and(|k| k.id == row.key.id)
    }

    /// Feed the next row of the source.
    fn push(&mut self, row: Row<T>) -> ControlFlow<()> {
        self.scanned += 1;

        // Same row as both bounds: the range between them is empty.
        if self.is_after(&row) && self.is_before(&row) {
            self.after_found = true;
            self.before_found = true;
            self.seeking_after = false;
            self.head.clear();
            self.rows.clear();
            return ControlFlow::Break(());
        }

        match self.request.bound {
            PageBound::First(_) => self.push_forward(row),
            PageBound::Last(_) => self.push_backward(row),
        }
    }

    fn push_forward(&mut self, row: Row<T>) -> ControlFlow<()> {
        if self.is_before(&row) {
            self.before_found = true;
            return ControlFlow::Break(());
        }

        if self.seeking_after {
            if self.is_after(&row) {
                self.seeking_after = false;
                self.after_found = true;
                self.head.clear();
            } else if self.head.len() < self.capacity() {
                // Kept in case the anchor never shows up.
                self.head.push(row);
            }
            return ControlFlow::Continue(());
        }

        self.rows.push_back(row);
        if self.rows.len() >= self.capacity() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn push_backward(&mut self, row: Row<T>) -> ControlFlow<()> {
        if self.is_before(&row) {
            self.before_found = true;
            return ControlFlow::Break(());
        }

        if self.is_after(&row) {
            self.after_found = true;
            self.rows.clear();
            return ControlFlow::Continue(());
        }

        self.rows.push_back(row);
        if self.rows.len() > self.capacity() {
            self.rows.pop_front();
        }
        ControlFlow::Continue(())
    }

    fn finish(self) -> Connection<T> {
        let page_size = self.request.page_size();

        let connection = match self.request.bound {
            PageBound::First(_) => {
                let mut rows: Vec<Row<T>> = if self.seeking_after {
                    debug!("after cursor not found in source, starting from the beginning");
                    self.head
                } else {
                    self.rows.into()
                };
                let has_next_page = rows.len() > page_size;
                rows.truncate(page_size);
                Connection::from_rows(rows, self.after_found, has_next_page)
            }
            PageBound::Last(_) => {
                let mut rows = self.rows;
                let has_previous_page = rows.len() > page_size;
                while rows.len() > page_size {
                    rows.pop_front();
                }
                Connection::from_rows(rows, has_previous_page, self.before_found)
            }
        };

        debug!(
            scanned = self.scanned,
            edges = connection.len(),
            has_next = connection.page_info.has_next_page,
            has_previous = connection.page_info.has_previous_page,
            "Connection window built"
        );

        connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::error::PaginationError;
    use crate::pagination::cursor::{encode, CursorKey};
    use proptest::prelude::*;

    fn rows(ids: &[i64]) -> Vec<Row<i64>> {
        ids.iter().map(|&id| Row::new(id, id)).collect()
    }

    fn cursor(id: i64) -> String {
        encode(&CursorKey::new(id)).into_string()
    }

    fn ids(conn: &Connection<i64>) -> Vec<i64> {
        conn.nodes().copied().collect()
    }

    fn build(source: &[i64], args: PaginationArgs) -> Connection<i64> {
        build_connection(rows(source), &args, &PaginationConfig::default()).unwrap()
    }

    const DESC: [i64; 5] = [10, 9, 8, 7, 6];

    #[test]
    fn test_forward_pages_over_descending_ids() {
        let page = build(&DESC, PaginationArgs::first(2));
        assert_eq!(ids(&page), vec![10, 9]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
        let end = page.page_info.end_cursor.clone().unwrap();
        assert_eq!(end.as_str(), cursor(9));

        let next = build(&DESC, PaginationArgs::first(2).after(end.into_string()));
        assert_eq!(ids(&next), vec![8, 7]);
        assert!(next.page_info.has_next_page);
        assert!(next.page_info.has_previous_page);

        let last = build(
            &DESC,
            PaginationArgs::first(2).after(next.page_info.end_cursor.unwrap().into_string()),
        );
        assert_eq!(ids(&last), vec![6]);
        assert!(!last.page_info.has_next_page);
    }

    #[test]
    fn test_first_zero_reports_remaining_items() {
        let page = build(&DESC, PaginationArgs::first(0));
        assert!(page.is_empty());
        assert!(page.page_info.has_next_page);
        assert_eq!(page.page_info.start_cursor, None);
        assert_eq!(page.page_info.end_cursor, None);

        let empty = build(&[], PaginationArgs::first(0));
        assert!(!empty.page_info.has_next_page);
    }

    #[test]
    fn test_first_larger_than_source() {
        let page = build(&DESC, PaginationArgs::first(5));
        assert_eq!(page.len(), 5);
        assert!(!page.page_info.has_next_page);

        let page = build(&DESC, PaginationArgs::first(50));
        assert_eq!(page.len(), 5);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_backward_pages() {
        let page = build(&DESC, PaginationArgs::last(2));
        assert_eq!(ids(&page), vec![7, 6]);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);

        let prev = build(
            &DESC,
            PaginationArgs::last(2).before(page.page_info.start_cursor.unwrap().into_string()),
        );
        assert_eq!(ids(&prev), vec![9, 8]);
        assert!(prev.page_info.has_previous_page);
        assert!(prev.page_info.has_next_page);

        let head = build(
            &DESC,
            PaginationArgs::last(2).before(prev.page_info.start_cursor.unwrap().into_string()),
        );
        assert_eq!(ids(&head), vec![10]);
        assert!(!head.page_info.has_previous_page);
    }

    #[test]
    fn test_last_zero() {
        let page = build(&DESC, PaginationArgs::last(0));
        assert!(page.is_empty());
        assert!(page.page_info.has_previous_page);

        let page = build(&DESC, PaginationArgs::last(0).before(cursor(10)));
        assert!(!page.page_info.has_previous_page);
        assert!(page.page_info.has_next_page);
    }

    #[test]
    fn test_range_window_between_cursors() {
        let args = PaginationArgs::first(10).after(cursor(10)).before(cursor(6));
        let page = build(&DESC, args);
        assert_eq!(ids(&page), vec![9, 8, 7]);
        assert!(!page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);

        let args = PaginationArgs::last(2).after(cursor(10)).before(cursor(6));
        let page = build(&DESC, args);
        assert_eq!(ids(&page), vec![8, 7]);
        assert!(page.page_info.has_previous_page);
        assert!(page.page_info.has_next_page);
    }

    #[test]
    fn test_before_right_after_page_means_no_next_page() {
        let args = PaginationArgs::first(2).before(cursor(8));
        let page = build(&DESC, args);
        assert_eq!(ids(&page), vec![10, 9]);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_same_anchor_for_both_bounds_is_empty() {
        for args in [
            PaginationArgs::first(3).after(cursor(8)).before(cursor(8)),
            PaginationArgs::last(3).after(cursor(8)).before(cursor(8)),
        ] {
            let page = build(&DESC, args);
            assert!(page.is_empty());
        }
    }

    // Test critique: un curseur dont la ligne a disparu repart du début
    #[test]
    fn test_missing_after_anchor_restarts_from_beginning() {
        let page = build(&DESC, PaginationArgs::first(2).after(cursor(42)));
        assert_eq!(ids(&page), vec![10, 9]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
    }

    #[test]
    fn test_missing_before_anchor_runs_to_end() {
        let page = build(&DESC, PaginationArgs::last(2).before(cursor(42)));
        assert_eq!(ids(&page), vec![7, 6]);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_after_past_before_is_treated_as_missing() {
        let args = PaginationArgs::first(5).after(cursor(7)).before(cursor(9));
        let page = build(&DESC, args);
        assert_eq!(ids(&page), vec![10]);
        assert!(!page.page_info.has_previous_page);
    }

    #[test]
    fn test_cursors_carry_sort_keys() {
        let source = vec![
            Row::with_sort(3, 30i64, "c"),
            Row::with_sort(1, 20i64, "a"),
            Row::with_sort(2, 10i64, "b"),
        ];
        let page = build_connection(
            source,
            &PaginationArgs::first(1),
            &PaginationConfig::default(),
        )
        .unwrap();
        let key = page.edges[0].cursor.decode().unwrap();
        assert_eq!(key, CursorKey::with_sort(3, 30i64));
    }

    #[test]
    fn test_invalid_args_fail_before_windowing() {
        let err = build_connection(
            rows(&DESC),
            &PaginationArgs::first(-1),
            &PaginationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PaginationError::InvalidPaginationArgs(_)));
    }

    // Test critique: une erreur en amont interrompt tout, pas de page partielle
    #[test]
    fn test_upstream_error_aborts_build() {
        let request = PaginationArgs::first(3)
            .validate(&PaginationConfig::default())
            .unwrap();
        let source: Vec<Result<Row<i64>, &str>> =
            vec![Ok(Row::new(10, 10)), Err("connection reset"), Ok(Row::new(8, 8))];
        assert_eq!(try_build_connection(source, &request), Err("connection reset"));
    }

    #[test]
    fn test_builder_stops_pulling_after_lookahead() {
        let request = PaginationArgs::first(2)
            .validate(&PaginationConfig::default())
            .unwrap();
        let mut pulled = 0;
        let source = (0..1_000_000i64).map(|id| {
            pulled += 1;
            Ok::<_, ()>(Row::new(id, id))
        });
        let page = try_build_connection(source, &request).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(pulled, 3);
    }

    #[test]
    fn test_missing_after_keeps_bounded_head() {
        let request = PaginationArgs::first(2)
            .after(cursor(-1))
            .validate(&PaginationConfig::default())
            .unwrap();
        let mut window = Window::new(&request);
        for id in 0..1_000i64 {
            assert!(window.push(Row::new(id, id)).is_continue());
            assert!(window.head.len() <= 3);
            assert!(window.rows.is_empty());
        }
        let page = window.finish();
        assert_eq!(ids(&page), vec![0, 1]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
    }

    // Test critique: une source non bornée n'est plus lue une fois la page décidée
    #[tokio::test]
    async fn test_stream_stops_after_found_after_anchor() {
        let request = PaginationArgs::first(2)
            .after(cursor(10))
            .validate(&PaginationConfig::default())
            .unwrap();
        assert_eq!(request.fetch_limit(), None);

        let pulled = Cell::new(0usize);
        let source = futures::stream::iter((0..1_000_000i64).map(|id| {
            pulled.set(pulled.get() + 1);
            Ok::<_, ()>(Row::new(id, id))
        }));
        let page = try_build_connection_from_stream(source, &request)
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![11, 12]);
        assert!(page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);
        // 0..=10 jusqu'à l'ancre, puis deux lignes et la ligne d'avance
        assert_eq!(pulled.get(), 14);
    }

    #[tokio::test]
    async fn test_stream_stops_at_found_before_anchor() {
        let request = PaginationArgs::last(3)
            .before(cursor(20))
            .validate(&PaginationConfig::default())
            .unwrap();
        assert_eq!(request.fetch_limit(), None);

        let pulled = Cell::new(0usize);
        let source = futures::stream::iter((0..1_000_000i64).map(|id| {
            pulled.set(pulled.get() + 1);
            Ok::<_, ()>(Row::new(id, id))
        }));
        let page = try_build_connection_from_stream(source, &request)
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![17, 18, 19]);
        assert!(page.page_info.has_previous_page);
        assert!(page.page_info.has_next_page);
        assert_eq!(pulled.get(), 21);
    }

    #[tokio::test]
    async fn test_stream_source_matches_iterator_source() {
        let request = PaginationArgs::last(2)
            .before(cursor(6))
            .validate(&PaginationConfig::default())
            .unwrap();
        let stream = futures::stream::iter(rows(&DESC).into_iter().map(Ok::<_, ()>));
        let from_stream = try_build_connection_from_stream(stream, &request)
            .await
            .unwrap();
        let from_iter =
            try_build_connection(rows(&DESC).into_iter().map(Ok::<_, ()>), &request).unwrap();
        assert_eq!(from_stream, from_iter);
        assert_eq!(ids(&from_stream), vec![8, 7]);
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let request = PaginationArgs::first(5)
            .validate(&PaginationConfig::default())
            .unwrap();
        let stream = futures::stream::iter(vec![Ok(Row::new(1, 1)), Err("timeout")]);
        let result = try_build_connection_from_stream(stream, &request).await;
        assert_eq!(result, Err("timeout"));
    }

    fn walk_forward(source: &[i64], page_size: i32) -> Vec<Vec<i64>> {
        let mut pages = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut args = PaginationArgs::first(page_size);
            args.after = after.clone();
            let page = build(source, args);
            pages.push(ids(&page));
            if !page.page_info.has_next_page {
                return pages;
            }
            after = page.page_info.end_cursor.map(|c| c.into_string());
        }
    }

    proptest! {
        #[test]
        fn prop_first_n_over_larger_source(n in 0usize..40, extra in 1usize..40) {
            let source: Vec<i64> = (0..(n + extra) as i64).rev().collect();
            let page = build(&source, PaginationArgs::first(n as i32));
            prop_assert_eq!(page.len(), n);
            prop_assert!(page.page_info.has_next_page);
        }

        #[test]
        fn prop_first_n_covering_source(k in 0usize..40, slack in 0usize..40) {
            let source: Vec<i64> = (0..k as i64).collect();
            let page = build(&source, PaginationArgs::first((k + slack) as i32));
            prop_assert_eq!(page.len(), k);
            prop_assert!(!page.page_info.has_next_page);
        }

        // Les pages consécutives couvrent la source sans doublon ni trou
        #[test]
        fn prop_forward_walk_partitions_source(len in 0usize..60, page_size in 1i32..8) {
            let source: Vec<i64> = (0..len as i64).map(|i| 1_000 - 3 * i).collect();
            let pages = walk_forward(&source, page_size);
            let flattened: Vec<i64> = pages.concat();
            prop_assert_eq!(flattened, source);
        }

        #[test]
        fn prop_backward_from_forward_end_is_adjacent(
            len in 1usize..60,
            page_size in 1usize..8,
            split in any::<prop::sample::Index>(),
        ) {
            let source: Vec<i64> = (0..len as i64).collect();
            let split = split.index(len);
            let first_page = build(&source, PaginationArgs::first(split as i32 + 1));
            let start = first_page.page_info.end_cursor.clone().unwrap();

            // Page suivante en avant, puis retour en arrière depuis son début
            let next = build(&source, PaginationArgs::first(page_size as i32).after(start.into_string()));
            prop_assume!(!next.is_empty());
            let back = build(
                &source,
                PaginationArgs::last(page_size as i32)
                    .before(next.page_info.start_cursor.clone().unwrap().into_string()),
            );

            let expected_back: Vec<i64> =
                source[(split + 1).saturating_sub(page_size)..=split].to_vec();
            prop_assert_eq!(ids(&back), expected_back);
            prop_assert!(back.page_info.has_next_page);
            prop_assert_eq!(back.page_info.has_previous_page, split + 1 > page_size);
        }
    }
}
