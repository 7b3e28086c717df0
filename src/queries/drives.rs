//! Drive queries

use bson::{oid::ObjectId, Bson, Document};
use tracing::warn;

use super::{DriveDetail, DriveRoster, DriveSummary, PlacementQueries};
use crate::join::{DRIVE_COMPANY, DRIVE_REGISTERED_STUDENTS};
use crate::pagination::Page;
use crate::pipeline::{Expr, Filter, Pipeline, Projection};
use crate::store::{parse_object_id, Collection};
use crate::types::{PlacementError, Result};

/// Job and company fields a coordinator may see and edit
const MANAGEMENT_FIELDS: [&str; 11] = [
    "_id",
    "job_title",
    "tenth_cutoff",
    "twelfth_cutoff",
    "ug_cutoff",
    "job_locations",
    "job_ctc",
    "branch",
    "job_description",
    "company_details.company_name",
    "company_details.company_website",
];

impl PlacementQueries {
    pub fn drive_detail_pipeline(drive_id: ObjectId) -> Pipeline {
        Pipeline::new()
            .matching(Filter::eq("_id", drive_id))
            .join(&DRIVE_COMPANY, "company_details")
            .project(Projection::exclude([
                "company_details.interview_experiences",
                "company_details.placements",
            ]))
            .join(&DRIVE_REGISTERED_STUDENTS, "student_details")
    }

    /// A drive with its company and the full records of every registered
    /// student. `NotFound` when the drive is missing or its company no
    /// longer exists; the message tells the two apart.
    pub async fn drive_detail(&self, drive_id: &str) -> Result<DriveDetail> {
        let id = parse_object_id(drive_id)?;
        let rows = self
            .run("drive_detail", Collection::Drives, Self::drive_detail_pipeline(id))
            .await?;

        let Some(mut drive) = rows.into_iter().next() else {
            return Err(self.missing_drive(id, drive_id).await);
        };
        let company_details = take_document(&mut drive, "company_details");
        let student_details = take_documents(&mut drive, "student_details");

        Ok(DriveDetail {
            drive,
            company_details,
            student_details,
        })
    }

    pub fn drive_roster_pipeline(drive_id: ObjectId) -> Pipeline {
        Pipeline::new()
            .matching(Filter::eq("_id", drive_id))
            .project(Projection::include(["registered_students"]))
            .unwind("registered_students")
            .join(&DRIVE_REGISTERED_STUDENTS, "student_data")
            // the row's own fields win over the student record on collision
            .merge_joined("student_data")
            .project(Projection::exclude(["_id", "student_data", "password"]))
    }

    /// Registered students of a drive merged with their profiles, keyed by
    /// the registered id. The key set is exactly `registered_students`: an
    /// id with no student record maps to an empty record. A drive with
    /// nobody registered yields an empty roster.
    pub async fn drive_roster(&self, drive_id: &str) -> Result<DriveRoster> {
        let id = parse_object_id(drive_id)?;
        let rows = self
            .run("drive_roster", Collection::Drives, Self::drive_roster_pipeline(id))
            .await?;

        let mut roster = DriveRoster::new();
        for mut row in rows {
            let registered_id = match row.remove("registered_students") {
                Some(Bson::String(registered_id)) => registered_id,
                other => {
                    warn!(drive_id, value = ?other, "Registered id is not a string, skipping");
                    continue;
                }
            };
            if !row.contains_key("user_id") {
                warn!(drive_id, user_id = %registered_id, "Registered id has no student record");
            }
            roster.insert(registered_id, row);
        }
        Ok(roster)
    }

    pub fn drive_management_pipeline(drive_id: ObjectId) -> Pipeline {
        Pipeline::new()
            .matching(Filter::eq("_id", drive_id))
            .join(&DRIVE_COMPANY, "company_details")
            .project(Projection::include(MANAGEMENT_FIELDS))
    }

    /// Editable job metadata plus the company name and website
    pub async fn drive_management_summary(&self, drive_id: &str) -> Result<DriveSummary> {
        let id = parse_object_id(drive_id)?;
        let rows = self
            .run("drive_management_summary", Collection::Drives, Self::drive_management_pipeline(id))
            .await?;

        let Some(mut job_meta) = rows.into_iter().next() else {
            return Err(self.missing_drive(id, drive_id).await);
        };
        let company_meta = take_document(&mut job_meta, "company_details");

        Ok(DriveSummary { job_meta, company_meta })
    }

    pub fn ongoing_drives_pipeline(search: Option<&str>, page: &Page) -> Pipeline {
        let mut pipeline = Pipeline::new().join(&DRIVE_COMPANY, "company_details");
        if let Some(search) = search {
            pipeline = pipeline.matching(Filter::contains_ignore_case("company_details.company_name", search));
        }
        pipeline
            .project(
                Projection::include(["_id", "company_id", "job_title", "job_ctc"])
                    .computed("company_name", Expr::field("company_details.company_name"))
                    .computed("company_website", Expr::field("company_details.company_website")),
            )
            .paginate(page)
    }

    /// One page of drives with their company fields flattened onto each row.
    /// No total count is computed.
    pub async fn ongoing_drives(&self, search: Option<&str>, page: &Page) -> Result<Vec<Document>> {
        self.run("ongoing_drives", Collection::Drives, Self::ongoing_drives_pipeline(search, page))
            .await
    }
}


fn take_document(row: &mut Document, field: &str) -> Document {
    match row.remove(field) {
        Some(Bson::Document(doc)) => doc,
        _ => Document::new(),
    }
}

fn take_documents(row: &mut Document, field: &str) -> Vec<Document> {
    match row.remove(field) {
        Some(Bson::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Bson::Document(doc) => Some(doc),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bson::{doc, oid::ObjectId};
    use std::sync::Arc;

    struct Fixture {
        queries: PlacementQueries,
        drive_id: ObjectId,
        orphan_drive_id: ObjectId,
    }

    fn fixture() -> Fixture {
        let company_id = ObjectId::new();
        let drive_id = ObjectId::new();
        let orphan_drive_id = ObjectId::new();

        let store = MemoryStore::with_collections([
            (
                Collection::Companies,
                vec![doc! {
                    "_id": company_id,
                    "company_name": "Acme",
                    "company_website": "acme.test",
                    "placements": [{ "year": 2023, "placed_students": ["s9"] }],
                    "interview_experiences": [],
                }],
            ),
            (
                Collection::Drives,
                vec![
                    doc! {
                        "_id": drive_id,
                        "company_id": company_id,
                        "job_title": "SDE",
                        "job_ctc": 12,
                        "tenth_cutoff": 60.0,
                        "branch": ["CSE", "ISE"],
                        "current_status": "Registration",
                        "registered_students": ["s2", "s1", "ghost"],
                        "updates": [],
                    },
                    doc! {
                        "_id": orphan_drive_id,
                        "company_id": ObjectId::new(),
                        "job_title": "Analyst",
                        "registered_students": [],
                    },
                ],
            ),
            (
                Collection::Students,
                vec![
                    doc! { "_id": ObjectId::new(), "user_id": "s1", "first_name": "Asha", "password": "x" },
                    doc! { "_id": ObjectId::new(), "user_id": "s2", "first_name": "Ravi", "password": "y" },
                    doc! { "_id": ObjectId::new(), "user_id": "s3", "first_name": "Meera", "password": "z" },
                ],
            ),
        ]);

        Fixture {
            queries: PlacementQueries::new(Arc::new(store)),
            drive_id,
            orphan_drive_id,
        }
    }

    #[tokio::test]
    async fn test_drive_detail_trims_company_and_embeds_students() {
        let f = fixture();
        let detail = f.queries.drive_detail(&f.drive_id.to_hex()).await.unwrap();

        assert_eq!(detail.drive.get_str("job_title").unwrap(), "SDE");
        assert_eq!(detail.company_details.get_str("company_name").unwrap(), "Acme");
        assert!(!detail.company_details.contains_key("placements"));
        assert!(!detail.company_details.contains_key("interview_experiences"));
        assert_eq!(detail.student_details.len(), 2);
    }

    #[tokio::test]
    async fn test_drive_detail_errors() {
        let f = fixture();
        assert!(matches!(
            f.queries.drive_detail("not-an-id").await,
            Err(PlacementError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            f.queries.drive_detail(&ObjectId::new().to_hex()).await,
            Err(PlacementError::NotFound(_))
        ));
        match f.queries.drive_detail(&ObjectId::new().to_hex()).await {
            Err(PlacementError::NotFound(what)) => assert!(what.starts_with("drive ")),
            other => panic!("unexpected result {:?}", other),
        }
        // company deleted: inner join leaves nothing, reported against the company
        match f.queries.drive_detail(&f.orphan_drive_id.to_hex()).await {
            Err(PlacementError::NotFound(what)) => assert!(what.starts_with("company of drive ")),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            f.queries.drive_management_summary(&f.orphan_drive_id.to_hex()).await,
            Err(PlacementError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_roster_is_keyed_by_user_id_without_secrets() {
        let f = fixture();
        let roster = f.queries.drive_roster(&f.drive_id.to_hex()).await.unwrap();

        assert_eq!(roster.keys().collect::<Vec<_>>(), vec!["ghost", "s1", "s2"]);
        for record in roster.values() {
            assert!(!record.contains_key("_id"));
            assert!(!record.contains_key("password"));
            assert!(!record.contains_key("registered_students"));
            assert!(!record.contains_key("student_data"));
        }
        assert_eq!(roster["s2"].get_str("first_name").unwrap(), "Ravi");
        assert_eq!(roster["s1"].get_str("user_id").unwrap(), "s1");
    }

    #[tokio::test]
    async fn test_roster_keeps_ids_without_student_record() {
        let f = fixture();
        let roster = f.queries.drive_roster(&f.drive_id.to_hex()).await.unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster["ghost"], Document::new());
    }

    #[tokio::test]
    async fn test_empty_roster_is_not_an_error() {
        let f = fixture();
        let roster = f.queries.drive_roster(&f.orphan_drive_id.to_hex()).await.unwrap();
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn test_management_summary_uses_allow_list() {
        let f = fixture();
        let summary = f
            .queries
            .drive_management_summary(&f.drive_id.to_hex())
            .await
            .unwrap();

        assert_eq!(summary.job_meta.get_str("job_title").unwrap(), "SDE");
        assert!(summary.job_meta.contains_key("branch"));
        assert!(!summary.job_meta.contains_key("updates"));
        assert!(!summary.job_meta.contains_key("registered_students"));
        assert!(!summary.job_meta.contains_key("current_status"));
        assert_eq!(
            summary.company_meta,
            doc! { "company_name": "Acme", "company_website": "acme.test" }
        );
    }

    #[tokio::test]
    async fn test_ongoing_drives_flatten_company_fields() {
        let f = fixture();
        let rows = f.queries.ongoing_drives(None, &Page::new(1, 10)).await.unwrap();

        // the drive whose company is gone is dropped by the unwind
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("company_name").unwrap(), "Acme");
        assert_eq!(rows[0].get_str("company_website").unwrap(), "acme.test");
        assert!(!rows[0].contains_key("company_details"));

        let filtered = f.queries.ongoing_drives(Some("GLOBEX"), &Page::new(1, 10)).await.unwrap();
        assert!(filtered.is_empty());
        let past_end = f.queries.ongoing_drives(None, &Page::new(2, 10)).await.unwrap();
        assert!(past_end.is_empty());
    }
}
