//! Document schemas for the placement collections
//!
//! Reads go through untyped pipelines; these types shape the records the
//! lifecycle writes produce and declare each collection's indexes.

mod company;
mod drive;
mod experience;
mod student;

pub use company::{CompanyDoc, PlacementRecord};
pub use drive::{
    DriveDoc, DriveUpdateRecord, REGISTRATION_OPEN, STATUS_ENDED, STATUS_REGISTRATION, UPDATE_FINAL_LIST,
};
pub use experience::ExperienceDoc;
pub use student::{Offer, StudentDoc};
