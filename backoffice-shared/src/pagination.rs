/// Pagination primitives
///
/// Every index endpoint accepts `page` and `per_page` query parameters and
/// answers with a [`Page`]. Parameters are clamped rather than rejected so a
/// hand-edited URL never produces an error page.
///
/// # Example
///
/// ```
/// use backoffice_shared::pagination::{Page, PageParams};
///
/// let params = PageParams::new(Some(2), Some(10));
/// assert_eq!(params.offset(), 10);
///
/// let page = Page::new(vec!["a", "b"], 12, params);
/// assert_eq!(page.last_page, 2);
/// ```

use serde::Serialize;

/// Default page size
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Largest page size a client may request
pub const MAX_PER_PAGE: u32 = 100;

/// Normalized page parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    /// 1-based page number
    pub page: u32,

    /// Items per page
    pub per_page: u32,
}

impl PageParams {
    /// Builds parameters from optional query values, clamping to valid ranges
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// SQL LIMIT value
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// SQL OFFSET value
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of results plus the numbers a client needs to render pagination links
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub data: Vec<T>,

    /// Total matching items across all pages
    pub total: i64,

    /// Current page
    pub page: u32,

    /// Page size
    pub per_page: u32,

    /// Last page number (at least 1)
    pub last_page: u32,
}

impl<T> Page<T> {
    /// Wraps a result set
    pub fn new(data: Vec<T>, total: i64, params: PageParams) -> Self {
        let total = total.max(0);
        let per_page = i64::from(params.per_page);
        let last_page = ((total + per_page - 1) / per_page).max(1);

        Self {
            data,
            total,
            page: params.page,
            per_page: params.per_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    /// Transforms every item, keeping the pagination numbers
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}
