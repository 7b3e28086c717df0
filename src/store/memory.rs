//! In-memory record store
//!
//! Holds each collection as an ordered list of BSON documents. Every
//! pipeline executes while holding the read lock, so a concurrent write is
//! either fully visible to a query or not at all.

use bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Collection, RecordStore, UpdateOutcome};
use crate::pipeline::{eval, Filter, Pipeline, Update};
use crate::types::{PlacementError, Result};

/// Record store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_collections<I>(collections: I) -> Self
    where
        I: IntoIterator<Item = (Collection, Vec<Document>)>,
    {
        Self {
            collections: RwLock::new(collections.into_iter().collect()),
        }
    }

    /// Build a store from a JSON fixture
    ///
    /// The fixture is an object keyed by collection name, each holding an
    /// array of records in MongoDB extended JSON (`{"$oid": "..."}` etc).
    pub fn from_fixture(fixture: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(entries) = fixture else {
            return Err(PlacementError::Config("fixture must be a JSON object".into()));
        };

        let mut collections = HashMap::new();
        for (name, records) in entries {
            let collection = Collection::from_name(&name)
                .ok_or_else(|| PlacementError::Config(format!("unknown collection '{}' in fixture", name)))?;
            let serde_json::Value::Array(records) = records else {
                return Err(PlacementError::Config(format!("fixture entry '{}' must be an array", name)));
            };

            let mut documents = Vec::with_capacity(records.len());
            for record in records {
                match Bson::try_from(record) {
                    Ok(Bson::Document(doc)) => documents.push(doc),
                    Ok(other) => {
                        return Err(PlacementError::Config(format!(
                            "fixture record in '{}' is not an object: {}",
                            name, other
                        )))
                    }
                    Err(e) => {
                        return Err(PlacementError::Config(format!(
                            "invalid extended JSON in '{}': {}",
                            name, e
                        )))
                    }
                }
            }
            info!("Loaded {} {} records from fixture", documents.len(), collection);
            collections.insert(collection, documents);
        }

        Ok(Self::with_collections(collections))
    }

    /// Read and parse a JSON fixture file
    pub async fn from_fixture_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let fixture: serde_json::Value = serde_json::from_str(&raw)?;
        Self::from_fixture(fixture)
    }

    /// Number of records in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Copy of every record in a collection
    pub async fn records(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Document>> {
        let view = self.collections.read().await;
        let input = view.get(&collection).cloned().unwrap_or_default();
        debug!(
            "Executing {}-stage pipeline over {} {} records",
            pipeline.len(),
            input.len(),
            collection
        );
        eval::execute(pipeline, input, &view)
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        let view = self.collections.read().await;
        Ok(view
            .get(&collection)
            .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: Collection, mut record: Document) -> Result<Bson> {
        let id = match record.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                record.insert("_id", id.clone());
                id
            }
        };

        let mut view = self.collections.write().await;
        let records = view.entry(collection).or_default();
        if records.iter().any(|r| r.get("_id") == Some(&id)) {
            return Err(PlacementError::InvalidIdentifier(format!(
                "duplicate _id {} in {}",
                id, collection
            )));
        }
        records.push(record);
        Ok(id)
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, update: &Update) -> Result<UpdateOutcome> {
        let mut view = self.collections.write().await;
        let target = view
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| filter.matches(r)));

        Ok(match target {
            Some(record) => {
                let update = update.bind_positional(record, filter)?;
                UpdateOutcome {
                    matched: 1,
                    modified: u64::from(update.apply(record)),
                }
            }
            None => UpdateOutcome::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::DRIVE_COMPANY;
    use bson::doc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_uses_collection_key_field() {
        let store = MemoryStore::with_collections([(
            Collection::Students,
            vec![doc! { "_id": ObjectId::new(), "user_id": "1rv20cs001" }],
        )]);

        let student = store
            .get(Collection::Students, &Bson::String("1rv20cs001".into()))
            .await
            .unwrap();
        assert_eq!(student.get_str("user_id").unwrap(), "1rv20cs001");

        let missing = store.get(Collection::Students, &Bson::String("nobody".into())).await;
        assert!(matches!(missing, Err(PlacementError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Companies, doc! { "company_name": "Acme" })
            .await
            .unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(store.len(Collection::Companies).await, 1);

        let duplicate = store
            .insert_one(Collection::Companies, doc! { "_id": id, "company_name": "Acme" })
            .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_update_reports_matched_and_modified() {
        let store = MemoryStore::with_collections([(
            Collection::Drives,
            vec![doc! { "_id": 1, "registered_students": [] }],
        )]);
        let update = Update::new().add_to_set("registered_students", "s1");

        let first = store
            .update_one(Collection::Drives, &Filter::eq("_id", 1), &update)
            .await
            .unwrap();
        let second = store
            .update_one(Collection::Drives, &Filter::eq("_id", 1), &update)
            .await
            .unwrap();
        let missing = store
            .update_one(Collection::Drives, &Filter::eq("_id", 2), &update)
            .await
            .unwrap();

        assert_eq!(first, UpdateOutcome { matched: 1, modified: 1 });
        assert_eq!(second, UpdateOutcome { matched: 1, modified: 0 });
        assert_eq!(missing, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn test_aggregate_leaves_collections_untouched() {
        let company_id = ObjectId::new();
        let store = Arc::new(MemoryStore::with_collections([
            (Collection::Companies, vec![doc! { "_id": company_id, "company_name": "Acme" }]),
            (Collection::Drives, vec![doc! { "_id": 1, "company_id": company_id }]),
        ]));
        let before = store.records(Collection::Drives).await;

        let rows = store
            .aggregate(
                Collection::Drives,
                &Pipeline::new().join(&DRIVE_COMPANY, "company_details"),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(store.records(Collection::Drives).await, before);
    }

    #[test]
    fn test_fixture_parses_extended_json() {
        let fixture = serde_json::json!({
            "Companies": [
                { "_id": { "$oid": "65a000000000000000000001" }, "company_name": "Acme" }
            ],
            "Students": [],
        });
        let store = MemoryStore::from_fixture(fixture).unwrap();
        let companies = tokio_test::block_on(store.records(Collection::Companies));
        assert!(matches!(companies[0].get("_id"), Some(Bson::ObjectId(_))));
    }

    #[test]
    fn test_fixture_rejects_unknown_collection() {
        let result = MemoryStore::from_fixture(serde_json::json!({ "Alumni": [] }));
        assert!(matches!(result, Err(PlacementError::Config(_))));
    }
}
