//! Shared page-number pagination helpers.
//!
//! Listings are paginated with 1-based page numbers (`?page=N`) and a fixed
//! page size. Out-of-range page numbers clamp to the last page instead of
//! erroring, so stale links keep working after content is deleted.

use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("invalid page number: {0}")]
    InvalidPage(String),
}

/// A validated pagination request: page number and page size, both >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Parse an optional raw `page` query value. Absent means page 1.
    pub fn parse(raw: Option<&str>, per_page: u32) -> Result<Self, PaginationError> {
        let page = match raw {
            None => 1,
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| PaginationError::InvalidPage(value.to_string()))?,
        };
        if page == 0 {
            return Err(PaginationError::InvalidPage("0".to_string()));
        }
        Ok(Self::new(page, per_page))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// Clamp the page number to the last page for the given total row count.
    pub fn clamp_to_total(self, total: u64) -> Self {
        let last = total_pages(total, self.per_page);
        Self {
            page: self.page.min(last),
            per_page: self.per_page,
        }
    }
}

/// One page of results together with the numbers the paginator UI needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page(),
            per_page: request.per_page(),
            total,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.per_page)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

fn total_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    let pages = total.div_ceil(per_page).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_to_first_page() {
        let request = PageRequest::parse(None, 10).expect("request");
        assert_eq!(request.page(), 1);
        assert_eq!(request.offset(), 0);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn parse_reads_page_number() {
        let request = PageRequest::parse(Some("3"), 10).expect("request");
        assert_eq!(request.page(), 3);
        assert_eq!(request.offset(), 20);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = PageRequest::parse(Some("abc"), 10).expect_err("rejected");
        assert_eq!(err, PaginationError::InvalidPage("abc".to_string()));
    }

    #[test]
    fn parse_rejects_page_zero() {
        let err = PageRequest::parse(Some("0"), 10).expect_err("rejected");
        assert!(matches!(err, PaginationError::InvalidPage(_)));
    }

    #[test]
    fn out_of_range_page_clamps_to_last() {
        let request = PageRequest::new(99, 10).clamp_to_total(25);
        assert_eq!(request.page(), 3);

        let request = PageRequest::new(2, 10).clamp_to_total(0);
        assert_eq!(request.page(), 1);
    }

    #[test]
    fn in_range_page_is_untouched() {
        let request = PageRequest::new(2, 10).clamp_to_total(25);
        assert_eq!(request.page(), 2);
    }

    #[test]
    fn paged_navigation_flags() {
        let request = PageRequest::new(2, 10);
        let page = Paged::new(vec![1, 2, 3], request, 25);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_prev());
        assert!(page.has_next());

        let last = Paged::new(vec![4], PageRequest::new(3, 10), 25);
        assert!(!last.has_next());
    }

    #[test]
    fn empty_listing_is_a_single_page() {
        let page = Paged::<u32>::empty(PageRequest::new(1, 10));
        assert_eq!(page.total_pages(), 1);
        assert!(!page.has_prev());
        assert!(!page.has_next());
    }
}
