//! Student document schema

use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// An offer recorded when a drive finalizes its placement list
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Offer {
    pub tier: Option<i32>,
    pub company_name: String,
    pub job_role: String,
    /// Stored as entered: a number or a free-form string such as "12 LPA"
    #[serde(default)]
    pub ctc: Bson,
}

/// Student document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StudentDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Institutional id; the key every other collection references
    pub user_id: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub offers: Vec<Offer>,

    /// Best (lowest) tier placed so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placed_tier: Option<i32>,

    /// Remaining profile fields (marks, contact details, ...)
    #[serde(flatten)]
    pub profile: Document,
}

impl IntoIndexes for StudentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}
