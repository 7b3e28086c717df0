//! Company queries

use bson::{oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

use super::PlacementQueries;
use crate::join::COMPANY_EXPERIENCES;
use crate::pagination::{faceted, from_facet, Page, PageMetadata, Paginated};
use crate::pipeline::value::as_i64;
use crate::pipeline::{Expr, Filter, Pipeline, Projection, SortOrder};
use crate::store::{parse_object_id, Collection};
use crate::types::{PlacementError, Result};

/// Autocomplete entry for the company picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyLabel {
    pub label: String,
    pub id: ObjectId,
}

fn name_contains(query: &str) -> Filter {
    Filter::contains_ignore_case("company_name", query)
}

impl PlacementQueries {
    pub fn company_search_pipeline(query: &str, page: &Page) -> Pipeline {
        let data = Pipeline::new()
            .sort("company_name", SortOrder::Asc)
            .paginate(page)
            .project(
                Projection::include(["company_name", "company_website"])
                    .computed("placements", Expr::sum_of_sizes("placements", "placed_students")),
            );
        faceted(Pipeline::new().matching(name_contains(query)), data)
    }

    /// Companies whose name contains `query`, with each company's total
    /// placements across all years
    pub async fn company_search(&self, query: &str, page: &Page) -> Result<Paginated<Document>> {
        let rows = self
            .run("company_search", Collection::Companies, Self::company_search_pipeline(query, page))
            .await?;
        from_facet(rows, page, self.options.empty_page_policy)
    }

    pub fn company_options_pipeline(query: &str, page: &Page) -> Pipeline {
        let filtered = Pipeline::new()
            .matching(name_contains(query))
            .sort("company_name", SortOrder::Asc);
        let data = Pipeline::new()
            .paginate(page)
            .project(Projection::include(["company_name"]));
        faceted(filtered, data)
    }

    /// Names only, in fixed-size pages, for select inputs
    pub async fn company_options(&self, query: &str, page: u64) -> Result<Paginated<Document>> {
        let page = Page::new(page, self.options.options_page_size);
        let rows = self
            .run("company_options", Collection::Companies, Self::company_options_pipeline(query, &page))
            .await?;
        from_facet(rows, &page, self.options.empty_page_policy)
    }

    /// `{label, id}` pairs for every company whose name contains `query`
    pub async fn company_labels(&self, query: &str) -> Result<Vec<CompanyLabel>> {
        let pipeline = Pipeline::new().matching(name_contains(query)).project(
            Projection::include(Vec::<String>::new())
                .computed("label", Expr::field("company_name"))
                .computed("id", Expr::field("_id"))
                .without_id(),
        );
        let rows = self.run("company_labels", Collection::Companies, pipeline).await?;

        rows.into_iter()
            .map(|row| bson::from_document(row).map_err(PlacementError::from))
            .collect()
    }

    /// Company record without its experience references
    pub async fn company_details(&self, company_id: &str) -> Result<Document> {
        let id = parse_object_id(company_id)?;
        let mut company = self.store.get(Collection::Companies, &Bson::ObjectId(id)).await?;
        company.remove("interview_experiences");
        Ok(company)
    }

    pub fn company_experiences_pipeline(company_id: ObjectId, page: &Page) -> Pipeline {
        Pipeline::new()
            .matching(Filter::eq("_id", company_id))
            .project(
                Projection::include(Vec::<String>::new())
                    .computed("totalCount", Expr::size("interview_experiences"))
                    .computed(
                        "data",
                        Expr::slice("interview_experiences", page.skip(), page.limit()),
                    ),
            )
            // resolve only the ids in the page window
            .join_via(&COMPANY_EXPERIENCES, "data", "data")
    }

    /// One page of a company's interview experiences. A page past the end
    /// has empty `data`; a company with none has `totalCount` and
    /// `pageCount` of 0.
    pub async fn company_experiences(&self, company_id: &str, page: &Page) -> Result<Paginated<Document>> {
        let id = parse_object_id(company_id)?;
        let rows = self
            .run(
                "company_experiences",
                Collection::Companies,
                Self::company_experiences_pipeline(id, page),
            )
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| PlacementError::NotFound(format!("company {}", company_id)))?;

        let total = row
            .get("totalCount")
            .and_then(as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        let data = match row.get("data") {
            Some(Bson::Array(items)) => items.iter().filter_map(|i| i.as_document().cloned()).collect(),
            _ => Vec::new(),
        };

        Ok(Paginated {
            metadata: PageMetadata::new(total, page),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::EmptyPagePolicy;
    use crate::queries::QueryOptions;
    use crate::store::MemoryStore;
    use bson::doc;
    use std::sync::Arc;

    fn companies(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| {
                doc! {
                    "_id": ObjectId::new(),
                    "company_name": format!("Company {:02}", n - i),
                    "company_website": format!("c{}.test", i),
                    "placements": [
                        { "year": 2022, "placed_students": ["a", "b"] },
                        { "year": 2023, "placed_students": ["c"] },
                    ],
                }
            })
            .collect()
    }

    fn queries(records: Vec<Document>, policy: EmptyPagePolicy) -> PlacementQueries {
        let store = MemoryStore::with_collections([(Collection::Companies, records)]);
        PlacementQueries::with_options(
            Arc::new(store),
            QueryOptions {
                empty_page_policy: policy,
                ..QueryOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_company_search_page_window() {
        let q = queries(companies(25), EmptyPagePolicy::Accurate);
        let result = q.company_search("company", &Page::new(2, 10)).await.unwrap();

        assert_eq!(
            result.metadata,
            PageMetadata {
                total_count: 25,
                page_count: 3,
                page: 2
            }
        );
        let names: Vec<&str> = result
            .data
            .iter()
            .filter_map(|c| c.get_str("company_name").ok())
            .collect();
        let expected: Vec<String> = (11..=20).map(|i| format!("Company {:02}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(result.data[0].get("placements").and_then(as_i64), Some(3));
    }

    #[tokio::test]
    async fn test_company_search_empty_page_policies() {
        let accurate = queries(companies(12), EmptyPagePolicy::Accurate)
            .company_search("", &Page::new(5, 10))
            .await
            .unwrap();
        assert!(accurate.data.is_empty());
        assert_eq!(accurate.metadata.total_count, 12);
        assert_eq!(accurate.metadata.page_count, 2);

        let legacy = queries(companies(12), EmptyPagePolicy::Legacy)
            .company_search("", &Page::new(5, 10))
            .await
            .unwrap();
        assert_eq!(legacy.metadata, PageMetadata::empty());
    }

    #[tokio::test]
    async fn test_company_options_use_fixed_page_size() {
        let q = queries(companies(25), EmptyPagePolicy::Accurate);
        let result = q.company_options("COMPANY", 3).await.unwrap();

        assert_eq!(result.metadata.page_count, 3);
        assert_eq!(result.data.len(), 5);
        assert!(result.data.iter().all(|c| !c.contains_key("company_website")));
    }

    #[tokio::test]
    async fn test_company_labels() {
        let q = queries(companies(3), EmptyPagePolicy::Accurate);
        let labels = q.company_labels("02").await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label, "Company 02");
    }

    #[tokio::test]
    async fn test_company_details_hides_experiences() {
        let id = ObjectId::new();
        let q = queries(
            vec![doc! { "_id": id, "company_name": "Acme", "interview_experiences": [ObjectId::new()] }],
            EmptyPagePolicy::Accurate,
        );

        let company = q.company_details(&id.to_hex()).await.unwrap();
        assert_eq!(company.get_str("company_name").unwrap(), "Acme");
        assert!(!company.contains_key("interview_experiences"));

        assert!(matches!(
            q.company_details(&ObjectId::new().to_hex()).await,
            Err(PlacementError::NotFound(_))
        ));
    }
}
