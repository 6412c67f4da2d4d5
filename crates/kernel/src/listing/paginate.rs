//! Result paginator: run a composed builder and wrap the rows in the
//! response envelope.

use serde::{Deserialize, Serialize};

use super::builder::ListBuilder;
use super::spec::ListQuerySpec;
use crate::error::AppResult;

/// Paging metadata returned alongside a page of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Rows matching the filters, ignoring paging.
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn has_next(&self) -> bool {
        self.meta.page < self.meta.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Fetch the current page and the total count in one call.
pub async fn execute<B: ListBuilder>(builder: &B) -> AppResult<(Vec<B::Row>, u64)> {
    builder.get_many_and_count().await
}

/// Wrap `items` with paging metadata.
///
/// With `limit == 0` everything is one page: 1 if anything matched, else 0.
pub fn build_response<T>(items: Vec<T>, total: u64, spec: &ListQuerySpec) -> PaginatedResponse<T> {
    let total_pages = if spec.limit > 0 {
        total.div_ceil(spec.limit)
    } else if total > 0 {
        1
    } else {
        0
    };

    PaginatedResponse {
        items,
        meta: PageMeta {
            total,
            page: spec.page,
            limit: spec.limit,
            total_pages,
        },
    }
}

/// Execute `builder` and build the envelope.
pub async fn paginate<B: ListBuilder>(
    builder: &B,
    spec: &ListQuerySpec,
) -> AppResult<PaginatedResponse<B::Row>> {
    let (items, total) = execute(builder).await?;
    Ok(build_response(items, total, spec))
}
