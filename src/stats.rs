//! Derived statistics engine
//!
//! Per-year offer rollups over the `placements` sub-lists of companies.
//! Each placement entry counts one offer per placed student.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::pagination::Page;
use crate::pipeline::value::as_i64;
use crate::pipeline::{Expr, Filter, Pipeline, Projection, SortOrder, Stage};
use crate::store::{Collection, RecordStore};
use crate::types::{PlacementError, Result};

/// Offers made across all companies in one year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OfferTotal {
    pub year: i32,
    pub total: i64,
}

/// Offers one company made in a year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyOffers {
    pub company_name: String,
    pub no_of_offers: i64,
}

/// Years the dashboard reports on, relative to `today`.
///
/// The placement season for a graduating batch is recorded under the
/// previous calendar year, so "current" is `year - 1` and "previous" is
/// `year - 2`.
pub fn reporting_years(today: NaiveDate) -> (i32, i32) {
    let year = today.year();
    (year - 1, year - 2)
}

/// Match companies with a placement entry for `year`, then unwind to one
/// row per entry of that year.
///
/// The second match is required: unwinding a matched company yields its
/// entries for every year, not only the one that matched.
fn placements_in_year(pipeline: Pipeline, year: i32) -> Pipeline {
    pipeline
        .matching(Filter::eq("placements.year", year))
        .unwind("placements")
        .matching(Filter::eq("placements.year", year))
}

pub struct OfferStats {
    store: Arc<dyn RecordStore>,
}

impl OfferStats {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn offers_in_year_pipeline(year: i32) -> Pipeline {
        placements_in_year(Pipeline::new(), year)
            .project(
                Projection::include(["placements.year"])
                    .computed("no_of_offers", Expr::size("placements.placed_students")),
            )
            .group_sum("placements.year", "total", Expr::field("no_of_offers"))
    }

    /// Total offers in `year`, or `None` when no company recorded any
    /// placement for it. A year with entries but no placed students is
    /// `Some` with a zero total.
    pub async fn offers_in_year(&self, year: i32) -> Result<Option<OfferTotal>> {
        let rows = self
            .store
            .aggregate(Collection::Companies, &Self::offers_in_year_pipeline(year))
            .await?;

        let Some(row) = rows.into_iter().next() else {
            debug!("No placements recorded for {}", year);
            return Ok(None);
        };

        let total = row
            .get("total")
            .and_then(as_i64)
            .ok_or_else(|| PlacementError::Internal(format!("offer total for {} is not numeric", year)))?;

        Ok(Some(OfferTotal { year, total }))
    }

    pub fn offers_by_year_pipeline(year: i32, page: &Page, order: SortOrder) -> Pipeline {
        let pipeline = Pipeline::new().project(Projection::include(["placements", "company_name"]));
        placements_in_year(pipeline, year)
            .project(
                Projection::include(["company_name"])
                    .computed("no_of_offers", Expr::size("placements.placed_students"))
                    .without_id(),
            )
            // name breaks ties so pages don't overlap
            .stage(Stage::Sort(vec![
                ("no_of_offers".to_string(), order),
                ("company_name".to_string(), SortOrder::Asc),
            ]))
            .paginate(page)
    }

    /// Per-company offer counts for `year`, sorted by count and paginated.
    /// No total is returned.
    pub async fn offers_by_year(&self, year: i32, page: &Page, order: SortOrder) -> Result<Vec<CompanyOffers>> {
        let rows = self
            .store
            .aggregate(Collection::Companies, &Self::offers_by_year_pipeline(year, page, order))
            .await?;

        rows.into_iter()
            .map(|row| bson::from_document(row).map_err(PlacementError::from))
            .collect()
    }

    pub async fn current_year_offers(&self) -> Result<Option<OfferTotal>> {
        let (current, _) = reporting_years(Utc::now().date_naive());
        self.offers_in_year(current).await
    }

    pub async fn previous_year_offers(&self) -> Result<Option<OfferTotal>> {
        let (_, previous) = reporting_years(Utc::now().date_naive());
        self.offers_in_year(previous).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bson::doc;

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryStore::with_collections([(
            Collection::Companies,
            vec![
                doc! {
                    "company_name": "Acme",
                    "placements": [
                        { "year": 2022, "placed_students": ["a1"] },
                        { "year": 2023, "placed_students": ["a2", "a3", "a4"] },
                    ],
                },
                doc! {
                    "company_name": "Globex",
                    "placements": [{ "year": 2023, "placed_students": ["g1", "g2"] }],
                },
                doc! {
                    "company_name": "Initech",
                    "placements": [{ "year": 2021, "placed_students": [] }],
                },
                doc! { "company_name": "Hooli" },
            ],
        )]))
    }

    #[tokio::test]
    async fn test_offers_in_year_sums_matching_entries_only() {
        let stats = OfferStats::new(store());
        assert_eq!(
            stats.offers_in_year(2023).await.unwrap(),
            Some(OfferTotal { year: 2023, total: 5 })
        );
        assert_eq!(
            stats.offers_in_year(2022).await.unwrap(),
            Some(OfferTotal { year: 2022, total: 1 })
        );
    }

    #[tokio::test]
    async fn test_absent_year_is_distinct_from_zero() {
        let stats = OfferStats::new(store());
        assert_eq!(stats.offers_in_year(1999).await.unwrap(), None);
        assert_eq!(
            stats.offers_in_year(2021).await.unwrap(),
            Some(OfferTotal { year: 2021, total: 0 })
        );
    }

    #[tokio::test]
    async fn test_offers_by_year_sorts_and_pages() {
        let stats = OfferStats::new(store());

        let desc = stats
            .offers_by_year(2023, &Page::new(1, 10), SortOrder::Desc)
            .await
            .unwrap();
        assert_eq!(
            desc,
            vec![
                CompanyOffers { company_name: "Acme".into(), no_of_offers: 3 },
                CompanyOffers { company_name: "Globex".into(), no_of_offers: 2 },
            ]
        );

        let second = stats
            .offers_by_year(2023, &Page::new(2, 1), SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(second[0].company_name, "Acme");

        let past_end = stats
            .offers_by_year(2023, &Page::new(3, 10), SortOrder::Asc)
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_reporting_years() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(reporting_years(today), (2025, 2024));
    }
}
