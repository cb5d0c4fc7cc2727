//! Cursor-based pagination engine.
//!
//! These types implement Relay-style cursor pagination over any ordered
//! source of rows, independent of the entity type or the store:
//!
//! - [`cursor`] - Opaque, checksummed cursor codec
//! - [`PaginationArgs`] - Raw arguments and their validation into a [`PageRequest`]
//! - [`build_connection`] and friends - Window an ordered source into a [`Connection`]
//!
//! # Example
//!
//! ```
//! use spanscope_core::pagination::{build_connection, PaginationArgs, PaginationConfig, Row};
//!
//! let rows = [10, 9, 8, 7, 6].map(|id| Row::new(id, format!("span-{id}")));
//! let page = build_connection(rows, &PaginationArgs::first(2), &PaginationConfig::default())?;
//!
//! assert_eq!(page.len(), 2);
//! assert!(page.page_info.has_next_page);
//! # Ok::<(), spanscope_core::error::PaginationError>(())
//! ```

mod args;
mod builder;
mod connection;
pub mod cursor;

pub use args::{
    PageBound, PageRequest, PaginationArgs, PaginationConfig, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use builder::{build_connection, try_build_connection, try_build_connection_from_stream};
pub use connection::{Connection, Edge, OrderDirection, PageInfo, Row};
pub use cursor::{Cursor, CursorKey, SortValue, SortValueKind};
