//! Page-based pagination utilities.
//!
//! List endpoints accept `page` / `pageSize` and answer with
//! `{ list, total, page, pageSize }`.

use serde::{Deserialize, Serialize};

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Pagination parameters from a query string.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// Page number clamped to at least 1.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// SQL `LIMIT`, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// A single page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> PageResult<T> {
    pub fn new(list: Vec<T>, total: i64, request: &PageRequest) -> Self {
        Self {
            list,
            total,
            page: request.page(),
            page_size: request.limit(),
        }
    }

    /// Converts every item, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            list: self.list.into_iter().map(f).collect(),
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
    fn test_defaults() {
        let req: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_offset_and_clamping() {
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        assert_eq!(PageRequest::new(0, 20).page(), 1);
        assert_eq!(PageRequest::new(1, 5000).limit(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(1, 0).limit(), 1);
    }

    #[test]
    fn test_camel_case_query() {
        let req: PageRequest = serde_json::from_str(r#"{"page":2,"pageSize":25}"#).unwrap();
        assert_eq!(req.offset(), 25);
    }

    #[test]
    fn test_page_result_serializes_envelope() {
        let page = PageResult::new(vec![1, 2], 12, &PageRequest::new(2, 2));
        let json = serde_json::to_value(page.map(|n| n * 10)).unwrap();
        assert_eq!(json["list"], serde_json::json!([10, 20]));
        assert_eq!(json["total"], 12);
        assert_eq!(json["page"], 2);
        assert_eq!(json["pageSize"], 2);
    }
}
