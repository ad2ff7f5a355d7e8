//! Offset pagination shared by listing endpoints and paginated tables.

use serde::{Deserialize, Serialize};

/// A 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl PageRequest {
    /// Default page size.
    pub const DEFAULT_PER_PAGE: u32 = 20;
    /// Largest page size a caller may ask for.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a request, clamping the page to at least 1 and the size to
    /// `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Build a request from optional query parameters.
    #[must_use]
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self::new(
            page.unwrap_or(1),
            per_page.unwrap_or(Self::DEFAULT_PER_PAGE),
        )
    }

    /// Number of items before this page.
    #[must_use]
    pub const fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// An empty first page.
    #[must_use]
    pub fn empty(request: PageRequest) -> Self {
        Self {
            items: Vec::new(),
            page: request.page,
            per_page: request.per_page,
            total: 0,
        }
    }

    /// Slice a page out of a complete list.
    #[must_use]
    pub fn from_slice(all: &[T], request: PageRequest) -> Self
    where
        T: Clone,
    {
        let items = all
            .iter()
            .skip(request.offset())
            .take(request.per_page as usize)
            .cloned()
            .collect();
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total: all.len() as u64,
        }
    }

    /// Total number of pages (at least 1).
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Whether a later page exists.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Whether an earlier page exists.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Map the items, keeping the paging information.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps() {
        let req = PageRequest::new(0, 500);
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, PageRequest::MAX_PER_PAGE);
        assert_eq!(PageRequest::from_query(None, None), PageRequest::default());
    }

    #[test]
    fn test_from_slice_second_page() {
        let all: Vec<u32> = (1..=45).collect();
        let page = Page::from_slice(&all, PageRequest::new(2, 20));
        assert_eq!(page.items.first(), Some(&21));
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(page.has_prev());

        let last = Page::from_slice(&all, PageRequest::new(3, 20));
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_next());
    }

    #[test]
    fn test_empty_page_has_one_page() {
        let page: Page<u8> = Page::empty(PageRequest::default());
        assert_eq!(page.total_pages(), 1);
        assert!(!page.has_next());
        assert!(!page.has_prev());
    }
}
