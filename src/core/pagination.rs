//! Paging for list endpoints.
//!
//! Every list answers with `{items, meta: {total, totalPages, page, limit}}`.
//! Pages are 1-based on the wire and 0-based inside `SeaORM`'s paginator.

use crate::{config::settings::PaginationConfig, errors::Result};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

/// Raw `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// A resolved, bounded page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u64,
    /// Items per page, between 1 and the configured maximum
    pub limit: u64,
}

impl PageRequest {
    /// Applies defaults and clamps the requested values to the configured bounds.
    ///
    /// The page is also capped so that its row offset fits a signed 64-bit
    /// SQL `OFFSET`; any page past the data answers with no items.
    #[must_use]
    pub fn resolve(query: PageQuery, config: PaginationConfig) -> Self {
        let limit = query
            .limit
            .unwrap_or(config.default_limit)
            .clamp(1, config.max_limit.max(1));
        let last_page = i64::MAX.unsigned_abs() / limit;
        let page = query.page.unwrap_or(1).clamp(1, last_page);
        Self { page, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::resolve(PageQuery::default(), PaginationConfig::default())
    }
}

/// List metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    pub limit: u64,
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Converts the items while keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Runs `select` for one page and counts the full result set.
pub async fn fetch_page<C, E>(
    db: &C,
    select: Select<E>,
    request: PageRequest,
) -> Result<Page<E::Model>>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Send + Sync,
{
    let paginator = select.paginate(db, request.limit);
    let counts = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(request.page - 1).await?;

    Ok(Page {
        items,
        meta: PageMeta {
            total: counts.number_of_items,
            total_pages: counts.number_of_pages,
            page: request.page,
            limit: request.limit,
        },
    })
}
