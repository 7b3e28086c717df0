//! Configuration for the placement query tool
//!
//! CLI arguments and environment variable handling using clap. Each
//! subcommand runs one named query or lifecycle write and prints JSON.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pagination::{EmptyPagePolicy, Page};
use crate::queries::{QueryOptions, OPTIONS_PAGE_SIZE};

/// Placement - join/aggregation queries over companies, drives and students
#[derive(Parser, Debug, Clone)]
#[command(name = "placement")]
#[command(about = "Query and update placement drives, companies and students")]
pub struct Args {
    /// Backing store
    #[arg(long, env = "STORE", value_enum, default_value = "mongo")]
    pub store: StoreKind,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "placement")]
    pub mongodb_db: String,

    /// JSON fixture seeding the memory store (extended JSON per collection)
    #[arg(long, env = "FIXTURES")]
    pub fixtures: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Page size when a paginated command is given no --limit
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value = "10")]
    pub default_page_size: u64,

    /// Report zeroed metadata whenever a search page comes back empty,
    /// as older clients expect
    #[arg(long, env = "LEGACY_EMPTY_PAGE_METADATA", default_value = "false")]
    pub legacy_empty_page_metadata: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

/// Page selection shared by paginated commands
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value = "1")]
    pub page: u64,

    #[arg(long)]
    pub limit: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Drive with its company and registered students
    DriveDetail { drive_id: String },

    /// Registered students keyed by user id
    DriveRoster { drive_id: String },

    /// Editable job and company fields of a drive
    DriveSummary { drive_id: String },

    /// Drives with company fields, optionally filtered by company name
    OngoingDrives {
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Companies whose name contains the query
    CompanySearch {
        #[arg(default_value = "")]
        query: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Company names for select inputs
    CompanyOptions {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value = "1")]
        page: u64,
    },

    /// `{label, id}` pairs for autocomplete
    CompanyLabels {
        #[arg(default_value = "")]
        query: String,
    },

    /// Company record without experience references
    CompanyDetails { company_id: String },

    /// Interview experiences of a company
    CompanyExperiences {
        company_id: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Total offers in a year
    OffersInYear { year: i32 },

    /// Per-company offer counts for a year
    OffersByYear {
        year: i32,
        #[arg(long, default_value = "asc")]
        sort: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Offer totals for the current and previous placement seasons
    OfferSummary,

    /// Register a student for a drive
    Register { drive_id: String, user_id: String },

    /// Post a progress update against a drive
    PostUpdate {
        drive_id: String,
        update_type: String,
        #[arg(long, default_value = "")]
        message: String,
        /// Comma-separated user ids
        #[arg(long, value_delimiter = ',')]
        shortlist: Vec<String>,
    },

    /// Publish the final placement list and end the drive
    Finalize {
        drive_id: String,
        year: i32,
        /// Comma-separated user ids
        #[arg(long, value_delimiter = ',', required = true)]
        shortlist: Vec<String>,
    },
}

impl Args {
    /// Options for the query engine
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            empty_page_policy: if self.legacy_empty_page_metadata {
                EmptyPagePolicy::Legacy
            } else {
                EmptyPagePolicy::Accurate
            },
            options_page_size: OPTIONS_PAGE_SIZE,
        }
    }

    /// Resolve a page selection, falling back to the default page size
    pub fn page(&self, args: &PageArgs) -> Page {
        Page::new(args.page, args.limit.unwrap_or(self.default_page_size))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default_page_size == 0 {
            return Err("DEFAULT_PAGE_SIZE must be at least 1".to_string());
        }

        match self.store {
            StoreKind::Mongo => {
                if !self.mongodb_uri.starts_with("mongodb://") && !self.mongodb_uri.starts_with("mongodb+srv://") {
                    return Err("MONGODB_URI must be a mongodb:// or mongodb+srv:// URI".to_string());
                }
                if self.mongodb_db.trim().is_empty() {
                    return Err("MONGODB_DB must not be empty".to_string());
                }
            }
            StoreKind::Memory => {
                if let Some(path) = &self.fixtures {
                    if !path.exists() {
                        return Err(format!("FIXTURES file {} does not exist", path.display()));
                    }
                }
            }
        }

        Ok(())
    }
}
