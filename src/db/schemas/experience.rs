//! Interview experience document schema

use bson::{oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Free-text interview account, referenced from `CompanyDoc::interview_experiences`
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExperienceDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    pub experience: String,

    /// Author, when the account was not submitted anonymously
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

impl IntoIndexes for ExperienceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Only ever resolved by _id
        Vec::new()
    }
}
