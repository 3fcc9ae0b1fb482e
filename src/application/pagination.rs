//! Offset pagination helpers shared by comment listings.

use murmur_api_types::{ListCommentsQuery, PageMeta};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page must be at least 1")]
    InvalidPage,
    #[error("limit must be between 1 and {max}")]
    InvalidLimit { max: u32 },
}

/// Page size policy applied to incoming listing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32, limits: PageLimits) -> Result<Self, PaginationError> {
        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }
        if limit == 0 || limit > limits.max_limit {
            return Err(PaginationError::InvalidLimit {
                max: limits.max_limit,
            });
        }
        Ok(Self { page, limit })
    }

    pub fn from_query(
        query: &ListCommentsQuery,
        limits: PageLimits,
    ) -> Result<Self, PaginationError> {
        Self::new(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(limits.default_limit),
            limits,
        )
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn meta(&self, total: u64) -> PageMeta {
        let total_pages = total.div_ceil(u64::from(self.limit));
        PageMeta {
            page: self.page,
            limit: self.limit,
            total,
            total_pages,
            has_next: u64::from(self.page) < total_pages,
            has_prev: self.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let request =
            PageRequest::from_query(&ListCommentsQuery::default(), PageLimits::default())
                .expect("valid request");

        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn rejects_zero_page_and_oversized_limit() {
        let limits = PageLimits::default();

        assert_eq!(
            PageRequest::new(0, 10, limits),
            Err(PaginationError::InvalidPage)
        );
        assert_eq!(
            PageRequest::new(1, 51, limits),
            Err(PaginationError::InvalidLimit { max: 50 })
        );
        assert!(PageRequest::new(1, 0, limits).is_err());
    }

    #[test]
    fn meta_reports_neighbours() {
        let request = PageRequest::new(2, 10, PageLimits::default()).expect("valid");
        let meta = request.meta(25);

        assert_eq!(request.offset(), 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn meta_for_empty_listing() {
        let request = PageRequest::new(1, 20, PageLimits::default()).expect("valid");
        let meta = request.meta(0);

        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }
}
