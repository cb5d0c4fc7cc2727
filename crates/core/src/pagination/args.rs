//! Pagination argument validation.
//!
//! Raw `first`/`last`/`after`/`before` arguments are normalized into a
//! [`PageRequest`] before anything is fetched. Validation fails fast so a
//! bad request never costs a round-trip to the store.

use tracing::warn;

use crate::error::{PaginationError, PaginationResult};

use super::cursor::{self, CursorKey, SortValueKind};

/// Page size applied when neither `first` nor `last` is supplied.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page size accepted by default.
pub const MAX_PAGE_SIZE: u32 = 500;

// =============================================================================
// Configuration
// =============================================================================

/// Page size limits.
///
/// Only built through [`PaginationConfig::new`] or `Default`, so the default
/// page size never exceeds the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    default_page_size: u32,
    max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    /// Create a configuration, checking that the default fits under the maximum.
    pub fn new(default_page_size: u32, max_page_size: u32) -> PaginationResult<Self> {
        if max_page_size == 0 {
            return Err(PaginationError::InvalidPaginationArgs(
                "max page size must be positive".into(),
            ));
        }
        if default_page_size > max_page_size {
            return Err(PaginationError::InvalidPaginationArgs(format!(
                "default page size {default_page_size} exceeds max page size {max_page_size}"
            )));
        }
        Ok(Self {
            default_page_size,
            max_page_size,
        })
    }

    /// Page size used when the request carries no bound.
    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// Requests above this size are rejected.
    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }
}

// =============================================================================
// Raw Arguments
// =============================================================================

/// Pagination parameters as received from the API layer.
///
/// Supports forward pagination (`first`/`after`) and backward
/// pagination (`last`/`before`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationArgs {
    /// Number of items to fetch (forward pagination).
    pub first: Option<i32>,
    /// Cursor to start after (forward pagination).
    pub after: Option<String>,
    /// Number of items to fetch (backward pagination).
    pub last: Option<i32>,
    /// Cursor to end before (backward pagination).
    pub before: Option<String>,
}

impl PaginationArgs {
    pub fn first(n: i32) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    pub fn last(n: i32) -> Self {
        Self {
            last: Some(n),
            ..Default::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Validate and normalize the arguments.
    ///
    /// Precedence: when both `first` and `last` are given, `first` drives the
    /// page and `last` is ignored. This is not an intersection of the two.
    pub fn validate(&self, config: &PaginationConfig) -> PaginationResult<PageRequest> {
        let first = self
            .first
            .map(|n| page_size("first", n, config))
            .transpose()?;
        let last = self
            .last
            .map(|n| page_size("last", n, config))
            .transpose()?;

        let after = self.after.as_deref().map(cursor::decode).transpose()?;
        let before = self.before.as_deref().map(cursor::decode).transpose()?;

        if let (Some(a), Some(b)) = (&after, &before) {
            if a.order != b.order || a.sort_kind() != b.sort_kind() {
                return Err(PaginationError::InvalidPaginationArgs(
                    "after and before cursors come from different orderings".into(),
                ));
            }
        }

        let (bound, last_ignored) = match (first, last) {
            (Some(first), Some(last)) => {
                warn!(first, last, "Both first and last supplied, ignoring last");
                (PageBound::First(first), true)
            }
            (Some(first), None) => (PageBound::First(first), false),
            (None, Some(last)) => (PageBound::Last(last), false),
            (None, None) => (PageBound::First(config.default_page_size as usize), false),
        };

        Ok(PageRequest {
            bound,
            after,
            before,
            last_ignored,
        })
    }
}

fn page_size(name: &str, value: i32, config: &PaginationConfig) -> PaginationResult<usize> {
    if value < 0 {
        return Err(PaginationError::InvalidPaginationArgs(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    if value as u32 > config.max_page_size {
        return Err(PaginationError::InvalidPaginationArgs(format!(
            "{name} exceeds maximum page size of {}",
            config.max_page_size
        )));
    }
    Ok(value as usize)
}

// =============================================================================
// Normalized Request
// =============================================================================

/// The bound driving the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageBound {
    /// Take this many items from the front of the range.
    First(usize),
    /// Take this many items from the back of the range.
    Last(usize),
}

/// Validated pagination request.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub bound: PageBound,
    /// Exclusive lower bound.
    pub after: Option<CursorKey>,
    /// Exclusive upper bound.
    pub before: Option<CursorKey>,
    /// `last` was supplied alongside `first` and dropped.
    pub last_ignored: bool,
}

impl PageRequest {
    pub fn page_size(&self) -> usize {
        match self.bound {
            PageBound::First(n) | PageBound::Last(n) => n,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.bound, PageBound::First(_))
    }

    /// Number of rows a bounded fetch must return, lookahead included.
    ///
    /// `None` means the window cannot be decided from a fixed prefix of the
    /// source (an `after` anchor has to be searched for, or the page is taken
    /// from the back); the caller then streams the source and lets the
    /// builder stop it.
    pub fn fetch_limit(&self) -> Option<usize> {
        match self.bound {
            PageBound::First(n) if self.after.is_none() => Some(n + 1),
            _ => None,
        }
    }

    /// Rows to read from the back of the source, lookahead included.
    ///
    /// Only an anchor-free `last` page can be served this way: the source is
    /// read in reverse order and the rows put back in order before windowing.
    pub fn tail_limit(&self) -> Option<usize> {
        match self.bound {
            PageBound::Last(n) if self.after.is_none() && self.before.is_none() => Some(n + 1),
            _ => None,
        }
    }

    /// Reject cursors issued for a different ordering than the one requested.
    ///
    /// `tag` names the ordering (column and direction), `kind` is the type of
    /// sort value its cursors carry.
    pub fn ensure_order(&self, tag: &str, kind: Option<SortValueKind>) -> PaginationResult<()> {
        let mismatched = [&self.after, &self.before]
            .into_iter()
            .flatten()
            .any(|key| key.order.as_deref() != Some(tag) || key.sort_kind() != kind);

        if mismatched {
            return Err(PaginationError::InvalidPaginationArgs(
                "cursor was issued for a different ordering".into(),
            ));
        }
        Ok(())
    }
}
