//! Shared helper functions for PostgreSQL row conversion.

use std::str::FromStr;

use spanscope_core::error::{StorageError, StorageResult};

/// Parse a text column into a domain enum.
///
/// Errors name the field so a corrupt row can be traced back to its column.
pub fn parse_column<T>(value: &str, field_name: &str) -> StorageResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| StorageError::SerializationError(format!("{field_name}: {e}")))
}

/// Convert a non-negative row limit into a `LIMIT` bind.
///
/// `None` binds SQL `NULL`, which Postgres reads as "no limit".
pub fn limit_param(limit: Option<usize>) -> Option<i64> {
    limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}
