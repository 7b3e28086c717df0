//! Record store abstraction
//!
//! The engine never reaches for a global database handle. A store is
//! injected as `Arc<dyn RecordStore>` so production runs against MongoDB
//! and tests run against [`MemoryStore`] seeded with fixture records.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use bson::{oid::ObjectId, Bson, Document};
use std::fmt;

use crate::pipeline::{Filter, Pipeline, Update};
use crate::types::{PlacementError, Result};

/// The logical collections the engine reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Companies,
    Drives,
    Students,
    Experiences,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Companies,
        Collection::Drives,
        Collection::Students,
        Collection::Experiences,
    ];

    /// Persisted collection name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Companies => "Companies",
            Self::Drives => "Drives",
            Self::Students => "Students",
            Self::Experiences => "Experiences",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Field holding a record's identity. Students are addressed by their
    /// institutional `user_id`, everything else by `_id`.
    pub const fn key_field(&self) -> &'static str {
        match self {
            Self::Students => "user_id",
            _ => "_id",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a single-document update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Backing store for the four collections
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Run a composed pipeline as one atomic query against `collection`
    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Document>>;

    /// All records matching `filter`, in collection order
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>>;

    /// Insert a record, returning its `_id`
    async fn insert_one(&self, collection: Collection, record: Document) -> Result<Bson>;

    /// Apply `update` to the first record matching `filter`
    async fn update_one(&self, collection: Collection, filter: &Filter, update: &Update) -> Result<UpdateOutcome>;

    /// Fetch one record by its key field
    async fn get(&self, collection: Collection, id: &Bson) -> Result<Document> {
        let filter = Filter::eq(collection.key_field(), id.clone());
        self.find(collection, &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PlacementError::NotFound(format!("{} record {}", collection, id)))
    }
}

/// Parse a caller-supplied object id.
///
/// Runs before any store access so a malformed id never reaches a pipeline.
pub fn parse_object_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id.trim())
        .map_err(|_| PlacementError::InvalidIdentifier(format!("'{}' is not a valid object id", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
        assert_eq!(Collection::from_name("students"), Some(Collection::Students));
        assert_eq!(Collection::from_name("alumni"), None);
    }

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex()).unwrap(), id);
        assert!(matches!(
            parse_object_id("12345"),
            Err(PlacementError::InvalidIdentifier(_))
        ));
    }
}
