//! Drive lifecycle writes
//!
//! Registration, progress updates and finalization of a drive. Every write
//! is a single-document update, so concurrent writers never see a partial
//! record. Set-valued fields use add-if-absent updates, which makes
//! repeating any of these operations harmless.
//!
//! ## Status
//!
//! ```text
//! Registration → <round updates>* → ended
//! ```
//!
//! Once a drive is `ended` every write against it fails with
//! `InvalidTransition`.

use bson::{oid::ObjectId, Bson, DateTime, Document};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{
    CompanyDoc, DriveDoc, DriveUpdateRecord, Offer, PlacementRecord, STATUS_ENDED, STATUS_REGISTRATION,
    UPDATE_FINAL_LIST,
};
use crate::pipeline::value::as_f64;
use crate::pipeline::{Filter, Update};
use crate::store::{parse_object_id, Collection, RecordStore};
use crate::types::{PlacementError, Result};

/// Rounds of add-then-create when recording a company's placements
const PLACEMENT_WRITE_ATTEMPTS: usize = 2;

/// Progress announcement posted by a coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct DriveUpdate {
    pub update_type: String,
    pub message: String,
    pub shortlist: Vec<String>,
}

/// What a finalization changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    /// Students that received an offer
    pub placed: Vec<String>,

    /// Shortlisted ids with no student record
    pub unknown_students: Vec<String>,
}

/// The drive fields lifecycle writes depend on.
///
/// Read field by field rather than through `DriveDoc`, so drives written
/// by other tools (unix-seconds `registration_end`, a `tier` typed in as
/// a string) can still be registered for and finalized.
#[derive(Debug, Clone, PartialEq)]
struct DriveState {
    company_id: ObjectId,
    job_title: String,
    job_ctc: Bson,
    tier: Option<i32>,
    current_status: String,
}

impl DriveState {
    fn from_record(drive_id: &str, record: &Document) -> Result<Self> {
        let company_id = match record.get("company_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(Bson::String(id)) => parse_object_id(id)?,
            _ => {
                return Err(PlacementError::Internal(format!(
                    "drive {} has no company_id",
                    drive_id
                )))
            }
        };

        Ok(Self {
            company_id,
            job_title: record.get_str("job_title").map(str::to_string).unwrap_or_default(),
            job_ctc: record.get("job_ctc").cloned().unwrap_or(Bson::Null),
            tier: lenient_tier(record.get("tier")),
            current_status: record.get_str("current_status").map(str::to_string).unwrap_or_default(),
        })
    }

    fn is_ended(&self) -> bool {
        self.current_status == STATUS_ENDED
    }
}

/// A whole-number tier stored as any numeric type or as digits in a string
fn lenient_tier(value: Option<&Bson>) -> Option<i32> {
    let n = match value? {
        Bson::String(s) => s.trim().parse::<f64>().ok()?,
        other => as_f64(other)?,
    };
    if n.fract() != 0.0 || n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return None;
    }
    Some(n as i32)
}

pub struct DriveLifecycle {
    store: Arc<dyn RecordStore>,
}

impl DriveLifecycle {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn company_name(&self, id: ObjectId) -> Result<String> {
        let record = self.store.get(Collection::Companies, &Bson::ObjectId(id)).await?;
        Ok(record.get_str("company_name").map(str::to_string).unwrap_or_default())
    }

    async fn open_drive(&self, drive_id: &str) -> Result<(ObjectId, DriveState)> {
        let id = parse_object_id(drive_id)?;
        let record = self.store.get(Collection::Drives, &Bson::ObjectId(id)).await?;
        let drive = DriveState::from_record(drive_id, &record)?;
        if drive.is_ended() {
            return Err(PlacementError::InvalidTransition(format!(
                "drive {} has ended",
                drive_id
            )));
        }
        Ok((id, drive))
    }

    async fn update_drive(&self, id: ObjectId, update: Update) -> Result<bool> {
        let outcome = self
            .store
            .update_one(Collection::Drives, &Filter::eq("_id", id), &update)
            .await?;
        if outcome.matched == 0 {
            return Err(PlacementError::NotFound(format!("drive {}", id)));
        }
        Ok(outcome.modified > 0)
    }

    /// Merge placed students into the company's entry for `year`.
    ///
    /// Adds to an existing entry through the positional path, otherwise
    /// pushes a new entry guarded by `$ne` on the year. Both are
    /// single-document updates, so concurrent finalizations for the same
    /// company and year each keep their students; a push that loses the race
    /// falls back to the add.
    async fn record_placements(&self, company_id: ObjectId, year: i32, placed: &[String]) -> Result<()> {
        if placed.is_empty() {
            return Ok(());
        }

        let ids: Vec<Bson> = placed.iter().map(|s| Bson::String(s.clone())).collect();
        let entry = bson::to_bson(&PlacementRecord {
            year,
            placed_students: placed.to_vec(),
        })?;
        let add = Update::new().add_each_to_set("placements.$.placed_students", ids);
        let create = Update::new().push("placements", entry);

        for _ in 0..PLACEMENT_WRITE_ATTEMPTS {
            let existing = Filter::eq("_id", company_id).and(Filter::eq("placements.year", year));
            let added = self.store.update_one(Collection::Companies, &existing, &add).await?;
            if added.matched > 0 {
                return Ok(());
            }

            let missing = Filter::eq("_id", company_id).and(Filter::ne("placements.year", year));
            let created = self.store.update_one(Collection::Companies, &missing, &create).await?;
            if created.matched > 0 {
                return Ok(());
            }
        }

        Err(PlacementError::NotFound(format!("company {}", company_id)))
    }

    /// Add a company with no placements or experiences yet
    pub async fn add_company(&self, company_name: &str, company_website: &str) -> Result<Bson> {
        let company = CompanyDoc::new(company_name.to_string(), company_website.to_string());
        let id = self
            .store
            .insert_one(Collection::Companies, bson::to_document(&company)?)
            .await?;
        info!("Added company '{}' ({})", company_name, id);
        Ok(id)
    }

    /// Announce a drive for an existing company. The drive always starts
    /// in `Registration` with nobody registered.
    pub async fn announce_drive(&self, mut drive: DriveDoc) -> Result<Bson> {
        let company_name = self.company_name(drive.company_id).await?;
        if drive.company_name.is_none() {
            drive.company_name = Some(company_name);
        }
        drive._id = None;
        drive.current_status = STATUS_REGISTRATION.to_string();
        drive.registered_students.clear();
        drive.placed_students.clear();
        drive.updates.clear();

        let record: Document = bson::to_document(&drive)?;
        let id = self.store.insert_one(Collection::Drives, record).await?;
        info!("Announced drive '{}' ({})", drive.job_title, id);
        Ok(id)
    }

    /// Register a student; returns false when they were already registered
    pub async fn register_student(&self, drive_id: &str, user_id: &str) -> Result<bool> {
        let (id, _) = self.open_drive(drive_id).await?;
        let added = self
            .update_drive(id, Update::new().add_to_set("registered_students", user_id))
            .await?;
        if added {
            info!(drive_id, user_id, "Registered student");
        }
        Ok(added)
    }

    /// Append a progress update and move the drive to its status
    pub async fn post_update(&self, drive_id: &str, update: DriveUpdate) -> Result<()> {
        if update.update_type == STATUS_ENDED || update.update_type == UPDATE_FINAL_LIST {
            return Err(PlacementError::InvalidTransition(format!(
                "'{}' ends a drive; finalize it with the placement list instead",
                update.update_type
            )));
        }
        let (id, _) = self.open_drive(drive_id).await?;

        let record = DriveUpdateRecord {
            update_type: update.update_type.clone(),
            message: update.message,
            shortlist: update.shortlist,
            posted_at: DateTime::now(),
        };
        self.update_drive(
            id,
            Update::new()
                .push("updates", bson::to_bson(&record)?)
                .set("current_status", update.update_type.as_str()),
        )
        .await?;

        info!(drive_id, status = %update.update_type, "Posted drive update");
        Ok(())
    }

    /// Publish the final placement list for `year`.
    ///
    /// Students and the company are written before the drive is marked
    /// `ended`, so a failure part way leaves the drive open and the call
    /// can simply be repeated.
    pub async fn finalize(&self, drive_id: &str, shortlist: &[String], year: i32) -> Result<FinalizeOutcome> {
        let (id, drive) = self.open_drive(drive_id).await?;
        let company_name = self.company_name(drive.company_id).await?;

        let offer = Offer {
            tier: drive.tier,
            company_name,
            job_role: drive.job_title.clone(),
            ctc: drive.job_ctc.clone(),
        };
        let offer = bson::to_bson(&offer)?;

        let mut outcome = FinalizeOutcome::default();
        for user_id in shortlist {
            if outcome.placed.contains(user_id) || outcome.unknown_students.contains(user_id) {
                continue;
            }
            let mut update = Update::new().add_to_set("offers", offer.clone());
            if let Some(tier) = drive.tier {
                update = update.min("placed_tier", tier);
            }
            let result = self
                .store
                .update_one(Collection::Students, &Filter::eq("user_id", user_id.as_str()), &update)
                .await?;
            if result.matched == 0 {
                warn!(drive_id, user_id = %user_id, "Shortlisted id has no student record");
                outcome.unknown_students.push(user_id.clone());
            } else {
                outcome.placed.push(user_id.clone());
            }
        }

        self.record_placements(drive.company_id, year, &outcome.placed).await?;

        let placed: Vec<Bson> = outcome.placed.iter().map(|s| Bson::String(s.clone())).collect();
        let record = DriveUpdateRecord {
            update_type: UPDATE_FINAL_LIST.to_string(),
            message: String::new(),
            shortlist: outcome.placed.clone(),
            posted_at: DateTime::now(),
        };
        self.update_drive(
            id,
            Update::new()
                .set("current_status", STATUS_ENDED)
                .add_each_to_set("placed_students", placed)
                .push("updates", bson::to_bson(&record)?),
        )
        .await?;

        info!(
            drive_id,
            placed = outcome.placed.len(),
            unknown = outcome.unknown_students.len(),
            "Finalized drive"
        );
        Ok(outcome)
    }
}
