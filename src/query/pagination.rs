//! Cursor pagination
//!
//! Infinite feeds load pages of posts ordered by last update, newest first.
//! The cursor for the next page is the ID of the last record on the
//! previous page; an empty page ends the feed.

use crate::data::Filter;

/// Default number of records per page
pub const PAGE_SIZE: usize = 9;

/// Records addressable by a cursor
pub trait Identified {
    fn id(&self) -> &str;
}

/// One fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching records before limit/cursor were applied
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parameter for the page after a given one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NextPage {
    /// Fetch records strictly after this record ID
    After(String),
    /// No further pages
    End,
}

/// Cursor following `last_page`
///
/// A missing or empty page ends pagination. A short page still yields a
/// cursor; the request after it returns the empty page.
pub fn next_cursor<T: Identified>(last_page: Option<&Page<T>>) -> NextPage {
    match last_page.and_then(|page| page.items.last()) {
        Some(last) => NextPage::After(last.id().to_string()),
        None => NextPage::End,
    }
}

/// Listing request for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// None for the first page
    pub cursor: Option<String>,
    pub page_size: usize,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            cursor: None,
            page_size,
        }
    }

    pub fn after(cursor: impl Into<String>, page_size: usize) -> Self {
        Self {
            cursor: Some(cursor.into()),
            page_size,
        }
    }

    /// Backend listing constraints for this page
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = vec![
            Filter::order_desc("$updatedAt"),
            Filter::Limit(self.page_size),
        ];
        if let Some(cursor) = &self.cursor {
            filters.push(Filter::CursorAfter(cursor.clone()));
        }
        filters
    }
}

/// Accumulated pages of an infinite query
#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteData<T> {
    pub pages: Vec<Page<T>>,
    /// Cursor each page was fetched with, aligned with `pages`
    pub page_params: Vec<Option<String>>,
}

impl<T> Default for InfiniteData<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            page_params: Vec::new(),
        }
    }
}

impl<T: Identified> InfiniteData<T> {
    pub fn push(&mut self, cursor: Option<String>, page: Page<T>) {
        self.page_params.push(cursor);
        self.pages.push(page);
    }

    pub fn next_page(&self) -> NextPage {
        next_cursor(self.pages.last())
    }

    pub fn has_next_page(&self) -> bool {
        matches!(self.next_page(), NextPage::After(_))
    }

    /// Every loaded record in page order
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }
}
