//! Placement - join/aggregation query engine for campus placement records
//!
//! Companies, recruitment drives, students and interview experiences live in
//! separate collections with no enforced references between them. This
//! crate composes the cross-collection reads (rosters, offer counts,
//! paginated searches with totals) as typed pipelines that run either on
//! MongoDB or on an in-memory store.
//!
//! ## Components
//!
//! - **Store**: `RecordStore` trait with MongoDB and in-memory backends
//! - **Join**: typed relationship descriptors and the generic resolver
//! - **Pipeline**: ordered stages rendered to BSON or evaluated in memory
//! - **Pagination**: page windows and the count/data facet
//! - **Stats**: per-year offer rollups
//! - **Queries**: the named read queries
//! - **Lifecycle**: registration, updates and finalization of drives

pub mod config;
pub mod db;
pub mod join;
pub mod lifecycle;
pub mod pagination;
pub mod pipeline;
pub mod queries;
pub mod stats;
pub mod store;
pub mod types;

pub use config::Args;
pub use lifecycle::{DriveLifecycle, DriveUpdate};
pub use queries::{PlacementQueries, QueryOptions};
pub use stats::OfferStats;
pub use store::{Collection, MemoryStore, MongoStore, RecordStore};
pub use types::{PlacementError, Result};
