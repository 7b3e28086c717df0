//! Shared types for the placement engine

mod error;

pub use error::{PlacementError, Result};
