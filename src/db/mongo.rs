//! MongoDB client wrapper
//!
//! Connects with short server-selection timeouts, verifies the connection
//! with a ping and applies schema-defined indexes on startup.

use bson::{doc, Document};
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use tracing::info;

use crate::db::schemas::{CompanyDoc, DriveDoc, ExperienceDoc, StudentDoc};
use crate::store::Collection as PlacementCollection;
use crate::types::PlacementError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the database is reachable
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, PlacementError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on an unreachable server instead of hanging the query
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Untyped handle on a collection, as used by aggregation pipelines
    pub fn documents(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection::<Document>(name)
    }

    /// Apply the indexes declared by a schema to a collection
    pub async fn apply_indexes<T: IntoIndexes>(&self, name: &str) -> Result<(), PlacementError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.documents(name)
            .create_indexes(indices)
            .await
            .map_err(|e| PlacementError::StoreUnavailable(format!("Failed to create indexes on {}: {}", name, e)))?;

        Ok(())
    }

    /// Apply indexes for every placement collection
    pub async fn ensure_indexes(&self) -> Result<(), PlacementError> {
        self.apply_indexes::<CompanyDoc>(PlacementCollection::Companies.name()).await?;
        self.apply_indexes::<DriveDoc>(PlacementCollection::Drives.name()).await?;
        self.apply_indexes::<StudentDoc>(PlacementCollection::Students.name()).await?;
        self.apply_indexes::<ExperienceDoc>(PlacementCollection::Experiences.name()).await?;
        info!("Indexes applied to database '{}'", self.db_name);
        Ok(())
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}
