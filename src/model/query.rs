use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

/// A validated list request: equality filters on declared filter fields plus
/// a page window.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(&'static str, Value)>,
    pub pagination: Pagination,
}

impl ListQuery {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            filters: Vec::new(),
            pagination,
        }
    }

    pub fn with_filter(mut self, field: &'static str, value: Value) -> Self {
        self.filters.retain(|(name, _)| *name != field);
        self.filters.push((field, value));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filters, regardless of the page window.
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}
