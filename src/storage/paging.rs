//! Paging past per-request row caps.
//!
//! Backends such as PostgREST return at most a fixed number of rows per
//! request. [`fetch_all_pages`] requests page N at offset `N × page_size`
//! until a short page signals the end of the data, or until the configured
//! page budget runs out.
//!
//! A page is short when the backend *sent* fewer rows than asked for. Rows
//! the fetcher drops afterwards (malformed, hidden) do not count, so one
//! bad row never ends the listing early.

use std::future::Future;

use crate::error::Result;
use crate::models::PagingConfig;

/// One page request handed to the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page number
    pub index: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Rows the backend returned, before any were dropped
    pub received: usize,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    /// A page where every received row was kept.
    pub fn complete(rows: Vec<T>) -> Self {
        Self {
            received: rows.len(),
            rows,
        }
    }
}

/// Fetch every page and concatenate them in the order received.
///
/// A fetch error aborts the whole listing; partial results are discarded.
pub async fn fetch_all_pages<T, F, Fut>(paging: PagingConfig, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let page_size = paging.page_size.max(1);
    let mut rows = Vec::new();

    for index in 0..paging.max_pages {
        let request = PageRequest {
            index,
            offset: index * page_size,
            limit: page_size,
        };
        let page = fetch(request).await?;
        log::debug!(
            "Page {} (offset {}): {} rows received, {} kept",
            index,
            request.offset,
            page.received,
            page.rows.len()
        );
        rows.extend(page.rows);

        if page.received < page_size {
            return Ok(rows);
        }
    }

    log::warn!(
        "Stopped after {} pages of {} rows; listing may be truncated",
        paging.max_pages,
        page_size
    );
    Ok(rows)
}
