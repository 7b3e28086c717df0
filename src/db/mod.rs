//! Database layer for the placement engine
//!
//! MongoDB client wrapper plus the typed document schemas for the four
//! placement collections.

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient};
pub use schemas::{CompanyDoc, DriveDoc, ExperienceDoc, StudentDoc};
