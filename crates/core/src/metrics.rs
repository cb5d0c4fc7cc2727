//! Metrics definitions for the query service.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "connections_built_total",
        "Total number of paginated connections returned"
    );
    describe_counter!(
        "pagination_rejections_total",
        "Total number of requests rejected by cursor or argument validation"
    );
    describe_counter!(
        "upstream_fetch_errors_total",
        "Total number of connection builds aborted by a fetch error"
    );
    describe_histogram!(
        "connection_rows_scanned",
        "Rows pulled from the source to build one connection"
    );
    describe_histogram!(
        "connection_build_duration_seconds",
        "Time taken to fetch and window a connection in seconds"
    );
}

/// Record a connection returned to the caller.
///
/// # Arguments
/// * `rows_scanned` - Rows pulled from the source, lookahead included
pub fn record_connection_built(rows_scanned: usize) {
    counter!("connections_built_total").increment(1);
    histogram!("connection_rows_scanned").record(rows_scanned as f64);
}

/// Record a request rejected during validation.
///
/// # Arguments
/// * `kind` - Rejection kind ("invalid_cursor" or "invalid_pagination_args")
pub fn record_pagination_rejection(kind: &'static str) {
    counter!("pagination_rejections_total", "kind" => kind).increment(1);
}

/// Record a build aborted by the fetch collaborator.
pub fn record_upstream_fetch_error() {
    counter!("upstream_fetch_errors_total").increment(1);
}

/// A timer that records the build duration when dropped.
pub struct BuildTimer {
    start: Instant,
}

impl BuildTimer {
    /// Start a new build timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for BuildTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BuildTimer {
    fn drop(&mut self) {
        histogram!("connection_build_duration_seconds").record(self.start.elapsed().as_secs_f64());
    }
}
