//! Pagination & facet engine
//!
//! Wraps a filtered pipeline so one query yields both a page of rows and a
//! total count computed over the same filter:
//!
//! ```text
//! <filter stages> → $facet ┬ metadata: [$count totalCount]
//!                          └ data:     [<sort>, $skip, $limit, <project>]
//! ```

use bson::{Bson, Document};
use serde::Serialize;

use crate::pipeline::value::as_i64;
use crate::pipeline::Pipeline;
use crate::types::{PlacementError, Result};

/// Facet branch holding the count row
pub const METADATA_BRANCH: &str = "metadata";

/// Facet branch holding the page of records
pub const DATA_BRANCH: &str = "data";

/// Field produced by the count branch
pub const TOTAL_COUNT_FIELD: &str = "totalCount";

/// A 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u64,
    limit: u64,
}

impl Page {
    /// Both values are clamped to at least 1
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Records before this page
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// `ceil(total / limit)`; zero when there is nothing to page through
pub fn page_count(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit.max(1))
}

/// Metadata block returned next to a page of results.
///
/// `page_count` is always `ceil(total_count / limit)`, so an empty result
/// reports 0 pages. The only exception is [`EmptyPagePolicy::Legacy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub total_count: u64,
    pub page_count: u64,
    pub page: u64,
}

impl PageMetadata {
    pub fn new(total_count: u64, page: &Page) -> Self {
        Self {
            total_count,
            page_count: page_count(total_count, page.limit()),
            page: page.page(),
        }
    }

    /// The zeroed block legacy clients expect for an empty page
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_count: 1,
            page: 1,
        }
    }
}

/// A page of results plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub metadata: PageMetadata,
    pub data: Vec<T>,
}

/// What to report when the requested page holds no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPagePolicy {
    /// Report the real totals from the count branch. With no matches at all
    /// the block is `{0, 0, page}`.
    #[default]
    Accurate,

    /// Always report `{totalCount: 0, pageCount: 1, page: 1}`, even when
    /// other pages hold matches
    Legacy,
}

/// Append the two-branch facet to `filtered`
pub fn faceted(filtered: Pipeline, data_branch: Pipeline) -> Pipeline {
    filtered.facet(vec![
        (METADATA_BRANCH, Pipeline::new().count(TOTAL_COUNT_FIELD)),
        (DATA_BRANCH, data_branch),
    ])
}

/// Decode the single row a faceted pipeline produces
pub fn from_facet(rows: Vec<Document>, page: &Page, policy: EmptyPagePolicy) -> Result<Paginated<Document>> {
    let row = rows.into_iter().next().unwrap_or_default();

    let data = documents_in(&row, DATA_BRANCH)?;

    // $count emits no row at all for an empty input
    let total = documents_in(&row, METADATA_BRANCH)?
        .first()
        .and_then(|meta| meta.get(TOTAL_COUNT_FIELD))
        .and_then(as_i64)
        .map(|n| u64::try_from(n).unwrap_or(0))
        .unwrap_or(0);

    let metadata = if data.is_empty() && policy == EmptyPagePolicy::Legacy {
        PageMetadata::empty()
    } else {
        PageMetadata::new(total, page)
    };

    Ok(Paginated { metadata, data })
}

fn documents_in(row: &Document, branch: &str) -> Result<Vec<Document>> {
    match row.get(branch) {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(items)) => items
            .iter()
            .map(|item| match item {
                Bson::Document(doc) => Ok(doc.clone()),
                other => Err(PlacementError::Internal(format!(
                    "facet branch '{}' holds a non-document: {}",
                    branch, other
                ))),
            })
            .collect(),
        Some(other) => Err(PlacementError::Internal(format!(
            "facet branch '{}' is not an array: {}",
            branch, other
        ))),
    }
}
