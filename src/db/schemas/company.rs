//! Company document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Students placed by a company in one academic year
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlacementRecord {
    pub year: i32,

    #[serde(default)]
    pub placed_students: Vec<String>,
}

/// Company document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CompanyDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    pub company_name: String,

    #[serde(default)]
    pub company_website: String,

    /// One entry per year, in the order they were first recorded
    #[serde(default)]
    pub placements: Vec<PlacementRecord>,

    #[serde(default)]
    pub interview_experiences: Vec<ObjectId>,
}

impl CompanyDoc {
    pub fn new(company_name: String, company_website: String) -> Self {
        Self {
            _id: None,
            company_name,
            company_website,
            placements: Vec::new(),
            interview_experiences: Vec::new(),
        }
    }
}

impl IntoIndexes for CompanyDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Name search and options listing sort on company_name
            (
                doc! { "company_name": 1 },
                Some(
                    IndexOptions::builder()
                        .name("company_name_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "placements.year": 1 },
                Some(
                    IndexOptions::builder()
                        .name("placements_year_index".to_string())
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
    fn test_new_company_serializes_empty_lists() {
        let company = CompanyDoc::new("Acme".into(), "acme.test".into());
        let record = bson::to_document(&company).unwrap();
        assert!(!record.contains_key("_id"));
        assert!(record.get_array("placements").unwrap().is_empty());
        assert!(record.get_array("interview_experiences").unwrap().is_empty());
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let company: CompanyDoc = bson::from_document(doc! { "company_name": "Acme" }).unwrap();
        assert!(company.placements.is_empty());
        assert!(company.interview_experiences.is_empty());
    }
}
