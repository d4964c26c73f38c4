// Page slicing + the response envelope every list endpoint returns

use crate::error::{RequestError, RequestResult};
use serde::Serialize;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> RequestResult<Self> {
        if page < 1 {
            return Err(RequestError::validation("page must be >= 1"));
        }
        if page_size < 1 {
            return Err(RequestError::validation("page_size must be >= 1"));
        }
        Ok(PageRequest { page, page_size })
    }

    /// Parse optional raw query values, falling back to the defaults
    pub fn from_query(
        page: Option<&str>,
        page_size: Option<&str>,
        default_page_size: usize,
    ) -> RequestResult<Self> {
        let page = parse_count("page", page, DEFAULT_PAGE)?;
        let page_size = parse_count("page_size", page_size, default_page_size)?;
        Self::new(page, page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn parse_count(name: &str, raw: Option<&str>, default: usize) -> RequestResult<usize> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| RequestError::validation(format!("{name} must be a positive integer"))),
    }
}

/// `{response_code, result_count, page, total_count, data}`
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub response_code: u16,
    pub result_count: usize,
    pub page: usize,
    pub total_count: usize,
    pub data: Vec<T>,
}

/// Slice `[(page-1)*page_size, page*page_size)`. Out-of-range pages are empty.
pub fn paginate<T>(records: Vec<T>, request: PageRequest) -> Paginated<T> {
    let total_count = records.len();
    let start = request.page.saturating_sub(1).saturating_mul(request.page_size);

    let data: Vec<T> = records
        .into_iter()
        .skip(start)
        .take(request.page_size)
        .collect();

    Paginated {
        response_code: 200,
        result_count: data.len(),
        page: request.page,
        total_count,
        data,
    }
}
