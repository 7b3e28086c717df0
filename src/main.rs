//! Placement - operator tool for the placement query engine
//!
//! Runs one named query or lifecycle write and prints the result as JSON.

use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use placement::{
    config::{Args, Command, StoreKind},
    db::MongoClient,
    pipeline::SortOrder,
    DriveLifecycle, DriveUpdate, MemoryStore, MongoStore, OfferStats, PlacementError, PlacementQueries, RecordStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("placement={},warn", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let store = match open_store(&args).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open {:?} store: {}", args.store, e);
            std::process::exit(1);
        }
    };

    match run(&args, store).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            // caller mistakes exit 2, store or internal failures exit 1
            let client_error = e
                .downcast_ref::<PlacementError>()
                .is_some_and(PlacementError::is_client_error);
            std::process::exit(if client_error { 2 } else { 1 });
        }
    }
}

async fn open_store(args: &Args) -> anyhow::Result<Arc<dyn RecordStore>> {
    match args.store {
        StoreKind::Mongo => {
            let client = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
            client.ensure_indexes().await?;
            info!("Using MongoDB database '{}'", client.db_name());
            Ok(Arc::new(MongoStore::new(client)))
        }
        StoreKind::Memory => match &args.fixtures {
            Some(path) => {
                info!("Seeding memory store from {}", path.display());
                Ok(Arc::new(MemoryStore::from_fixture_file(path).await?))
            }
            None => {
                warn!("Memory store without FIXTURES starts empty");
                Ok(Arc::new(MemoryStore::new()))
            }
        },
    }
}

fn render<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

async fn run(args: &Args, store: Arc<dyn RecordStore>) -> anyhow::Result<String> {
    let queries = PlacementQueries::with_options(store.clone(), args.query_options());
    let stats = OfferStats::new(store.clone());
    let lifecycle = DriveLifecycle::new(store);

    match &args.command {
        Command::DriveDetail { drive_id } => render(&queries.drive_detail(drive_id).await?),
        Command::DriveRoster { drive_id } => render(&queries.drive_roster(drive_id).await?),
        Command::DriveSummary { drive_id } => render(&queries.drive_management_summary(drive_id).await?),
        Command::OngoingDrives { search, page } => {
            render(&queries.ongoing_drives(search.as_deref(), &args.page(page)).await?)
        }
        Command::CompanySearch { query, page } => render(&queries.company_search(query, &args.page(page)).await?),
        Command::CompanyOptions { query, page } => render(&queries.company_options(query, *page).await?),
        Command::CompanyLabels { query } => render(&queries.company_labels(query).await?),
        Command::CompanyDetails { company_id } => render(&queries.company_details(company_id).await?),
        Command::CompanyExperiences { company_id, page } => {
            render(&queries.company_experiences(company_id, &args.page(page)).await?)
        }
        Command::OffersInYear { year } => render(&stats.offers_in_year(*year).await?),
        Command::OffersByYear { year, sort, page } => render(
            &stats
                .offers_by_year(*year, &args.page(page), SortOrder::parse(sort))
                .await?,
        ),
        Command::OfferSummary => render(&serde_json::json!({
            "current": stats.current_year_offers().await?,
            "previous": stats.previous_year_offers().await?,
        })),
        Command::Register { drive_id, user_id } => {
            let added = lifecycle.register_student(drive_id, user_id).await?;
            render(&serde_json::json!({ "registered": added }))
        }
        Command::PostUpdate {
            drive_id,
            update_type,
            message,
            shortlist,
        } => {
            let update = DriveUpdate {
                update_type: update_type.clone(),
                message: message.clone(),
                shortlist: shortlist.clone(),
            };
            lifecycle.post_update(drive_id, update).await?;
            render(&serde_json::json!({ "status": update_type }))
        }
        Command::Finalize {
            drive_id,
            year,
            shortlist,
        } => render(&lifecycle.finalize(drive_id, shortlist, *year).await?),
    }
}
