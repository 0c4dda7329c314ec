//! Pagination

use serde::Serialize;

/// Default page size
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a client may ask for
pub const MAX_PAGE_SIZE: u32 = 100;

/// A requested page (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Build a request, clamping out-of-range values
    #[must_use]
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Row offset
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Row limit
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Slice an already-materialized list
    #[must_use]
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.page_size as usize)
            .collect();
        Page {
            items,
            total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Total matching items
    pub total: i64,
    /// Page number
    pub page: u32,
    /// Page size
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Number of pages (at least 1)
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let size = i64::from(self.page_size.max(1));
        (((self.total + size - 1) / size).max(1)) as u32
    }

    /// Whether a later page exists
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Whether an earlier page exists
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Convert the items
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let p = PageRequest::new(Some(0), Some(500));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_page_math() {
        let page = PageRequest::new(Some(2), Some(10)).slice((0..25).collect::<Vec<_>>());
        assert_eq!(page.items, (10..20).collect::<Vec<_>>());
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(page.has_previous());

        let empty: Page<i32> = PageRequest::default().slice(vec![]);
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }
}
