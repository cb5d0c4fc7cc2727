//! Batched loading of trace evaluations.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::Loader;
use tracing::debug;

use spanscope_core::error::ServiceError;
use spanscope_core::models::TraceEvaluation;
use spanscope_core::services::TraceService;

/// Loads evaluations for every trace resolved in the same request tick
/// with a single repository call.
pub struct EvaluationLoader {
    service: TraceService,
}

impl EvaluationLoader {
    pub fn new(service: TraceService) -> Self {
        Self { service }
    }
}

impl Loader<i64> for EvaluationLoader {
    type Value = Vec<TraceEvaluation>;
    type Error = Arc<ServiceError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        debug!(traces = keys.len(), "Batch loading trace evaluations");
        self.service
            .evaluations_for_traces(keys)
            .await
            .map_err(Arc::new)
    }
}
