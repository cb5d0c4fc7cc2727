//! Relay-style connection types.
//!
//! These types are commonly used with GraphQL but carry no dependency on
//! any schema library.

use super::cursor::{Cursor, CursorKey, SortValue};

/// An item of an ordered source: its position plus the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    pub key: CursorKey,
    pub node: T,
}

impl<T> Row<T> {
    pub fn new(id: i64, node: T) -> Self {
        Self {
            key: CursorKey::new(id),
            node,
        }
    }

    pub fn with_sort(id: i64, sort: impl Into<SortValue>, node: T) -> Self {
        Self {
            key: CursorKey::with_sort(id, sort),
            node,
        }
    }
}

/// A single item in a paginated result.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    /// The actual item.
    pub node: T,
    /// Cursor for this item (used for pagination).
    pub cursor: Cursor,
}

/// Information about the current page in a paginated result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// Whether there are more items after this page.
    pub has_next_page: bool,
    /// Whether there are items before this page.
    pub has_previous_page: bool,
    /// Cursor of the first item in this page.
    pub start_cursor: Option<Cursor>,
    /// Cursor of the last item in this page.
    pub end_cursor: Option<Cursor>,
}

/// Paginated result set with edges and page info.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    /// List of edges (node + cursor pairs).
    pub edges: Vec<Edge<T>>,
    /// Information about the current page.
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Build a connection from windowed rows, deriving cursors and page bounds.
    pub(crate) fn from_rows(
        rows: impl IntoIterator<Item = Row<T>>,
        has_previous_page: bool,
        has_next_page: bool,
    ) -> Self {
        let edges: Vec<Edge<T>> = rows
            .into_iter()
            .map(|row| Edge {
                cursor: Cursor::encode(&row.key),
                node: row.node,
            })
            .collect();

        let page_info = PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self { edges, page_info }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// Ordering direction for sorted queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (smallest first).
    Asc,
    /// Descending order (largest first).
    #[default]
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}
