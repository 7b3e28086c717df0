//! Typed query filters
//!
//! A filter renders to a MongoDB query document and can also be evaluated
//! directly against an in-memory record.

use bson::{doc, Bson, Document};

use super::value::{bson_eq, get_path, values_at};

/// Record filter used by `$match` stages and single-collection finds
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value; a path through an array matches if any element does
    Eq { path: String, value: Bson },

    /// No value at the path equals `value`; a missing field matches
    Ne { path: String, value: Bson },

    /// Case-insensitive literal substring match on a string field
    ContainsIgnoreCase { path: String, needle: String },

    /// All filters must match
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Ne {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn contains_ignore_case(path: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::ContainsIgnoreCase {
            path: path.into(),
            needle: needle.into(),
        }
    }

    /// Combine with another filter
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Render as a MongoDB query document
    ///
    /// Search text is escaped so user input is always matched literally.
    pub fn to_bson(&self) -> Document {
        match self {
            Self::Eq { path, value } => doc! { path.as_str(): value.clone() },
            Self::Ne { path, value } => doc! { path.as_str(): { "$ne": value.clone() } },
            Self::ContainsIgnoreCase { path, needle } => doc! {
                path.as_str(): { "$regex": regex::escape(needle), "$options": "i" }
            },
            Self::And(filters) => {
                let clauses: Vec<Document> = filters.iter().map(Filter::to_bson).collect();
                // a flat query keeps positional updates on the plain form
                let mut flat = Document::new();
                let collides = clauses
                    .iter()
                    .flat_map(|clause| clause.iter())
                    .any(|(key, value)| flat.insert(key.as_str(), value.clone()).is_some());
                if collides {
                    let clauses: Vec<Bson> = clauses.into_iter().map(Bson::Document).collect();
                    doc! { "$and": clauses }
                } else {
                    flat
                }
            }
        }
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Document) -> bool {
        match self {
            Self::Eq { path, value } => values_at(record, path)
                .into_iter()
                .any(|candidate| bson_eq(candidate, value)),
            Self::Ne { path, value } => !values_at(record, path)
                .into_iter()
                .any(|candidate| bson_eq(candidate, value)),
            Self::ContainsIgnoreCase { path, needle } => {
                let needle = needle.to_lowercase();
                values_at(record, path).into_iter().any(|candidate| match candidate {
                    Bson::String(s) => s.to_lowercase().contains(&needle),
                    _ => false,
                })
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }

    /// Index of the first element of the array at `array` satisfying every
    /// equality clause this filter places on paths under it. This is the
    /// element a positional `$` update path refers to.
    pub fn matched_index(&self, record: &Document, array: &str) -> Option<usize> {
        let prefix = format!("{}.", array);
        let mut clauses = Vec::new();
        self.element_clauses(&prefix, &mut clauses);
        if clauses.is_empty() {
            return None;
        }

        let Some(Bson::Array(items)) = get_path(record, array) else {
            return None;
        };
        items.iter().position(|item| match item {
            Bson::Document(element) => clauses.iter().all(|(path, value)| {
                values_at(element, path)
                    .into_iter()
                    .any(|candidate| bson_eq(candidate, value))
            }),
            _ => false,
        })
    }

    fn element_clauses<'a>(&'a self, prefix: &str, out: &mut Vec<(&'a str, &'a Bson)>) {
        match self {
            Self::Eq { path, value } => {
                if let Some(rest) = path.strip_prefix(prefix) {
                    out.push((rest, value));
                }
            }
            Self::And(filters) => {
                for filter in filters {
                    filter.element_clauses(prefix, out);
                }
            }
            Self::Ne { .. } | Self::ContainsIgnoreCase { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn test_eq_matches_any_array_element() {
        let company = doc! {
            "company_name": "Acme",
            "placements": [{ "year": 2022 }, { "year": 2023 }],
        };
        assert!(Filter::eq("placements.year", 2023).matches(&company));
        assert!(!Filter::eq("placements.year", 2021).matches(&company));
    }

    #[test]
    fn test_ne_matches_when_no_element_equals() {
        let company = doc! { "placements": [{ "year": 2022 }, { "year": 2023 }] };
        assert!(Filter::ne("placements.year", 2024).matches(&company));
        assert!(!Filter::ne("placements.year", 2023).matches(&company));
        assert!(Filter::ne("placements.year", 2023).matches(&doc! { "company_name": "Acme" }));
        assert_eq!(
            Filter::ne("placements.year", 2024).to_bson(),
            doc! { "placements.year": { "$ne": 2024 } }
        );
    }

    #[test]
    fn test_matched_index_follows_array_clauses() {
        let company = doc! { "_id": 1, "placements": [{ "year": 2022 }, { "year": 2023 }] };
        let filter = Filter::eq("_id", 1).and(Filter::eq("placements.year", 2023));
        assert_eq!(filter.matched_index(&company, "placements"), Some(1));
        assert_eq!(Filter::eq("_id", 1).matched_index(&company, "placements"), None);
        assert_eq!(
            Filter::eq("placements.year", 2021).matched_index(&company, "placements"),
            None
        );
    }

    #[test]
    fn test_contains_ignore_case() {
        let company = doc! { "company_name": "Globex Corporation" };
        assert!(Filter::contains_ignore_case("company_name", "globex").matches(&company));
        assert!(Filter::contains_ignore_case("company_name", "").matches(&company));
        assert!(!Filter::contains_ignore_case("company_website", "").matches(&company));
    }

    #[test]
    fn test_search_text_is_escaped_for_mongo() {
        let rendered = Filter::contains_ignore_case("company_name", "a.b(c)").to_bson();
        assert_eq!(
            rendered,
            doc! { "company_name": { "$regex": "a\\.b\\(c\\)", "$options": "i" } }
        );
    }

    #[test]
    fn test_and_renders_and_evaluates() {
        let id = ObjectId::new();
        let filter = Filter::eq("_id", id).and(Filter::eq("current_status", "Registration"));
        let drive = doc! { "_id": id, "current_status": "Registration" };
        assert!(filter.matches(&drive));
        assert_eq!(filter.to_bson(), doc! { "_id": id, "current_status": "Registration" });

        let same_path = Filter::eq("placements.year", 2023).and(Filter::ne("placements.year", 2024));
        assert_eq!(same_path.to_bson().get_array("$and").map(Vec::len).ok(), Some(2));
    }
}
