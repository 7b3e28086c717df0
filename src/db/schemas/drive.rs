//! Drive document schema

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Status of a freshly announced drive
pub const STATUS_REGISTRATION: &str = "Registration";

/// Terminal status; set when the final placement list is published
pub const STATUS_ENDED: &str = "ended";

/// Update type that carries the final placement list
pub const UPDATE_FINAL_LIST: &str = "finallist";

pub const REGISTRATION_OPEN: &str = "open";

/// Progress announcement posted against a drive
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DriveUpdateRecord {
    #[serde(rename = "type")]
    pub update_type: String,

    #[serde(default)]
    pub message: String,

    /// Students advancing past this round
    #[serde(default)]
    pub shortlist: Vec<String>,

    pub posted_at: DateTime,
}

/// Drive document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DriveDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Owning company
    pub company_id: ObjectId,

    /// Copy of the company name taken at announcement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    pub job_title: String,

    #[serde(default)]
    pub job_description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenth_cutoff: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub twelfth_cutoff: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ug_cutoff: Option<f64>,

    /// Offer tier; lower is better
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i32>,

    #[serde(default)]
    pub job_locations: Vec<String>,

    #[serde(default)]
    pub job_ctc: Bson,

    /// Eligible branches
    #[serde(default)]
    pub branch: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_end: Option<DateTime>,

    #[serde(default)]
    pub registration_status: String,

    #[serde(default)]
    pub current_status: String,

    #[serde(default)]
    pub registered_students: Vec<String>,

    #[serde(default)]
    pub placed_students: Vec<String>,

    #[serde(default)]
    pub updates: Vec<DriveUpdateRecord>,
}

impl DriveDoc {
    /// New drive open for registration
    pub fn new(company_id: ObjectId, job_title: String) -> Self {
        Self {
            _id: None,
            company_id,
            company_name: None,
            job_title,
            job_description: String::new(),
            tenth_cutoff: None,
            twelfth_cutoff: None,
            ug_cutoff: None,
            tier: None,
            job_locations: Vec::new(),
            job_ctc: Bson::Null,
            branch: Vec::new(),
            registration_end: None,
            registration_status: REGISTRATION_OPEN.to_string(),
            current_status: STATUS_REGISTRATION.to_string(),
            registered_students: Vec::new(),
            placed_students: Vec::new(),
            updates: Vec::new(),
        }
    }
}

impl IntoIndexes for DriveDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "company_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("company_id_index".to_string())
                        .build(),
                ),
            ),
            // Multikey; lets a student's drives be found without a scan
            (
                doc! { "registered_students": 1 },
                Some(
                    IndexOptions::builder()
                        .name("registered_students_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "current_status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("current_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_drive_starts_in_registration() {
        let drive = DriveDoc::new(ObjectId::new(), "SDE".into());
        assert_eq!(drive.current_status, STATUS_REGISTRATION);
        assert_eq!(drive.registration_status, REGISTRATION_OPEN);
        assert!(drive.registered_students.is_empty());
    }

    #[test]
    fn test_update_record_serializes_type_key() {
        let record = DriveUpdateRecord {
            update_type: "Aptitude".into(),
            message: "Round 1 results".into(),
            shortlist: vec!["s1".into()],
            posted_at: DateTime::from_millis(0),
        };
        let rendered = bson::to_document(&record).unwrap();
        assert_eq!(rendered.get_str("type").unwrap(), "Aptitude");
    }
}
