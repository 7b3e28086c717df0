//! Named read queries
//!
//! Each query composes one pipeline, runs it as a single store call and
//! shapes the rows into a response type. Identifier parsing happens first,
//! so a malformed id never reaches the store.

mod companies;
mod drives;

pub use companies::CompanyLabel;

use bson::Document;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::pagination::EmptyPagePolicy;
use crate::pipeline::Pipeline;
use crate::store::{Collection, RecordStore};
use crate::types::Result;

/// Page size used by the company options listing
pub const OPTIONS_PAGE_SIZE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Metadata reported by faceted searches when the page is empty
    pub empty_page_policy: EmptyPagePolicy,

    pub options_page_size: u64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            empty_page_policy: EmptyPagePolicy::default(),
            options_page_size: OPTIONS_PAGE_SIZE,
        }
    }
}

/// A drive with its owning company and registered students
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveDetail {
    pub drive: Document,
    pub company_details: Document,
    pub student_details: Vec<Document>,
}

/// The fields a drive coordinator edits, split by owner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveSummary {
    pub job_meta: Document,
    pub company_meta: Document,
}

/// Registered students of a drive keyed by `user_id`
pub type DriveRoster = BTreeMap<String, Document>;

/// Read-only query engine over an injected store
#[derive(Clone)]
pub struct PlacementQueries {
    store: Arc<dyn RecordStore>,
    options: QueryOptions,
}

impl PlacementQueries {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_options(store, QueryOptions::default())
    }

    pub fn with_options(store: Arc<dyn RecordStore>, options: QueryOptions) -> Self {
        Self { store, options }
    }

    async fn run(&self, name: &str, collection: Collection, pipeline: Pipeline) -> Result<Vec<Document>> {
        debug!(query = name, stages = pipeline.len(), "Running query against {}", collection);
        let rows = self.store.aggregate(collection, &pipeline).await?;
        debug!(query = name, rows = rows.len(), "Query complete");
        Ok(rows)
    }
}
