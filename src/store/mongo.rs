//! MongoDB-backed record store
//!
//! Pipelines are rendered to BSON and shipped as a single `aggregate`
//! command, so the server executes every stage atomically. Driver failures
//! surface as `StoreUnavailable`; nothing here retries.

use bson::{Bson, Document};
use futures_util::TryStreamExt;
use mongodb::Collection as MongoCollection;
use tracing::debug;

use super::{Collection, RecordStore, UpdateOutcome};
use crate::db::MongoClient;
use crate::pipeline::{Filter, Pipeline, Update};
use crate::types::{PlacementError, Result};

/// Record store talking to a MongoDB database
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
}

impl MongoStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self, collection: Collection) -> MongoCollection<Document> {
        self.client.documents(collection.name())
    }
}

#[async_trait::async_trait]
impl RecordStore for MongoStore {
    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Document>> {
        debug!("Sending {}-stage pipeline to {}", pipeline.len(), collection);

        let cursor = self
            .collection(collection)
            .aggregate(pipeline.to_bson())
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Aggregate on {} failed: {}", collection, e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Reading {} cursor failed: {}", collection, e)))
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter.to_bson())
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Find on {} failed: {}", collection, e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Reading {} cursor failed: {}", collection, e)))
    }

    async fn insert_one(&self, collection: Collection, record: Document) -> Result<Bson> {
        let result = self
            .collection(collection)
            .insert_one(record)
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Insert into {} failed: {}", collection, e)))?;

        Ok(result.inserted_id)
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, update: &Update) -> Result<UpdateOutcome> {
        let result = self
            .collection(collection)
            .update_one(filter.to_bson(), update.to_bson())
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Update on {} failed: {}", collection, e)))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }
}
