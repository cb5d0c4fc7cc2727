//! Domain models representing stored trace data.
//!
//! These models are storage-agnostic and represent the canonical
//! form of trace data within the domain layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Traces
// =============================================================================

/// A trace: the set of spans sharing one trace id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Row identifier.
    pub id: i64,
    /// External trace id (hex).
    pub trace_id: String,
    /// Owning project row identifier.
    pub project_id: i64,
    /// Start of the earliest span.
    pub start_time: DateTime<Utc>,
    /// End of the latest span.
    pub end_time: DateTime<Utc>,
}

// =============================================================================
// Spans
// =============================================================================

/// Final status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatusCode {
    Ok,
    Error,
    Unset,
}

impl SpanStatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Unset => "UNSET",
        }
    }
}

impl FromStr for SpanStatusCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "ERROR" => Ok(Self::Error),
            "UNSET" | "" => Ok(Self::Unset),
            other => Err(format!("unknown span status code '{other}'")),
        }
    }
}

impl fmt::Display for SpanStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of work within a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Row identifier. Monotonically increasing with ingestion order.
    pub id: i64,
    /// Row identifier of the parent trace.
    pub trace_rowid: i64,
    /// External span id (hex).
    pub span_id: String,
    /// External id of the parent span (None for root spans).
    pub parent_id: Option<String>,
    pub name: String,
    /// Span kind (e.g., "LLM", "CHAIN", "RETRIEVER").
    pub span_kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Span attributes as JSON.
    pub attributes: serde_json::Value,
    /// Span events as JSON.
    pub events: serde_json::Value,
    pub status_code: SpanStatusCode,
    pub status_message: String,
    /// Errors in this span and all its descendants.
    pub cumulative_error_count: i32,
    pub cumulative_llm_token_count_prompt: i32,
    pub cumulative_llm_token_count_completion: i32,
}

impl Span {
    /// Wall-clock duration in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        (self.end_time - self.start_time).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000.0
    }

    /// Prompt plus completion tokens for this span and its descendants.
    pub fn cumulative_llm_token_count_total(&self) -> i64 {
        self.cumulative_llm_token_count_prompt as i64
            + self.cumulative_llm_token_count_completion as i64
    }
}

// =============================================================================
// Evaluations
// =============================================================================

/// Who produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotatorKind {
    Llm,
    Human,
}

impl AnnotatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "LLM",
            Self::Human => "HUMAN",
        }
    }
}

impl FromStr for AnnotatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LLM" => Ok(Self::Llm),
            "HUMAN" => Ok(Self::Human),
            other => Err(format!("unknown annotator kind '{other}'")),
        }
    }
}

/// An evaluation attached to a whole trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvaluation {
    pub id: i64,
    /// Row identifier of the evaluated trace.
    pub trace_rowid: i64,
    /// Evaluation name (e.g., "correctness").
    pub name: String,
    pub label: Option<String>,
    pub score: Option<f64>,
    pub explanation: Option<String>,
    pub metadata: serde_json::Value,
    pub annotator_kind: AnnotatorKind,
}

// =============================================================================
// Tests
// =============================================================================
