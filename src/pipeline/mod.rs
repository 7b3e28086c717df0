//! Aggregation pipeline builder
//!
//! Queries are composed from ordered, typed stages. A `Pipeline` renders to
//! the MongoDB aggregation format for the server-side store and is
//! interpreted by [`eval`] for the in-memory store, so both backends run the
//! exact same stage list.
//!
//! ```text
//! Pipeline::new()
//!     .matching(Filter::eq("_id", drive_id))
//!     .join(&DRIVE_COMPANY, "company_details")              // $lookup + $unwind
//!     .project(Projection::exclude([...]))
//!     .join(&DRIVE_REGISTERED_STUDENTS, "student_details")  // $lookup
//! ```

pub mod eval;
pub mod expr;
pub mod filter;
pub mod update;
pub mod value;

pub use expr::{Expr, Projection};
pub use filter::Filter;
pub use update::Update;

use bson::{doc, Bson, Document};

use crate::join::Relationship;
use crate::pagination::Page;
use crate::store::Collection;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse a caller-supplied direction; anything but `desc` sorts ascending
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),

    /// Attach the 0..n foreign records whose `foreign_field` matches `local_field`
    Lookup {
        from: Collection,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },

    /// One output row per array element; rows with a missing or empty array are dropped
    Unwind(String),

    Project(Projection),

    /// Replace each row with the first record of the joined field overlaid by
    /// the row itself (row fields win on key collision)
    MergeJoined(String),

    /// Group by the value at `key` (output as `_id`), summing each expression
    Group {
        key: String,
        sums: Vec<(String, Expr)>,
    },

    Sort(Vec<(String, SortOrder)>),

    Skip(u64),

    Limit(u64),

    /// Single `{field: n}` row, or no row when the input is empty
    Count(String),

    /// Run each named branch over the same input, producing one row of arrays
    Facet(Vec<(String, Pipeline)>),
}

impl Stage {
    /// Render as a MongoDB aggregation stage
    pub fn to_bson(&self) -> Document {
        match self {
            Self::Match(filter) => doc! { "$match": filter.to_bson() },
            Self::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => doc! {
                "$lookup": {
                    "from": from.name(),
                    "localField": local_field.as_str(),
                    "foreignField": foreign_field.as_str(),
                    "as": as_field.as_str(),
                }
            },
            Self::Unwind(path) => doc! { "$unwind": format!("${}", path) },
            Self::Project(projection) => doc! { "$project": projection.to_bson() },
            Self::MergeJoined(field) => doc! {
                "$replaceRoot": {
                    "newRoot": {
                        "$mergeObjects": [
                            { "$arrayElemAt": [format!("${}", field), 0] },
                            "$$ROOT",
                        ]
                    }
                }
            },
            Self::Group { key, sums } => {
                let mut group = doc! { "_id": format!("${}", key) };
                for (name, expr) in sums {
                    group.insert(name.as_str(), doc! { "$sum": expr.to_bson() });
                }
                doc! { "$group": group }
            }
            Self::Sort(keys) => {
                let mut sort = Document::new();
                for (field, order) in keys {
                    sort.insert(field.as_str(), order.as_i32());
                }
                doc! { "$sort": sort }
            }
            Self::Skip(n) => doc! { "$skip": to_i64(*n) },
            Self::Limit(n) => doc! { "$limit": to_i64(*n) },
            Self::Count(field) => doc! { "$count": field.as_str() },
            Self::Facet(branches) => {
                let mut facet = Document::new();
                for (name, branch) in branches {
                    let stages: Vec<Bson> = branch.to_bson().into_iter().map(Bson::Document).collect();
                    facet.insert(name.as_str(), stages);
                }
                doc! { "$facet": facet }
            }
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Ordered list of stages executed as one logical query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn matching(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    /// Join a relationship on its declared local key
    pub fn join(self, relationship: &Relationship, as_field: &str) -> Self {
        self.join_via(relationship, relationship.local_key, as_field)
    }

    /// Join a relationship, reading the local ids from another field
    /// (e.g. a sliced copy of the id list produced by an earlier stage)
    pub fn join_via(mut self, relationship: &Relationship, local_field: &str, as_field: &str) -> Self {
        self.stages.extend(relationship.stages(local_field, as_field));
        self
    }

    pub fn unwind(self, path: &str) -> Self {
        self.stage(Stage::Unwind(path.to_string()))
    }

    pub fn project(self, projection: Projection) -> Self {
        self.stage(Stage::Project(projection))
    }

    pub fn merge_joined(self, field: &str) -> Self {
        self.stage(Stage::MergeJoined(field.to_string()))
    }

    pub fn group_sum(self, key: &str, name: &str, expr: Expr) -> Self {
        self.stage(Stage::Group {
            key: key.to_string(),
            sums: vec![(name.to_string(), expr)],
        })
    }

    pub fn sort(self, field: &str, order: SortOrder) -> Self {
        self.stage(Stage::Sort(vec![(field.to_string(), order)]))
    }

    pub fn skip(self, n: u64) -> Self {
        self.stage(Stage::Skip(n))
    }

    pub fn limit(self, n: u64) -> Self {
        self.stage(Stage::Limit(n))
    }

    /// Skip to the page window and take one page
    pub fn paginate(self, page: &Page) -> Self {
        self.skip(page.skip()).limit(page.limit())
    }

    pub fn count(self, field: &str) -> Self {
        self.stage(Stage::Count(field.to_string()))
    }

    pub fn facet(self, branches: Vec<(&str, Pipeline)>) -> Self {
        self.stage(Stage::Facet(
            branches
                .into_iter()
                .map(|(name, branch)| (name.to_string(), branch))
                .collect(),
        ))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render every stage for `Collection::aggregate`
    pub fn to_bson(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_bson).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::DRIVE_COMPANY;

    #[test]
    fn test_single_match_join_renders_lookup_then_unwind() {
        let pipeline = Pipeline::new().join(&DRIVE_COMPANY, "company_details");
        assert_eq!(
            pipeline.to_bson(),
            vec![
                doc! {
                    "$lookup": {
                        "from": "Companies",
                        "localField": "company_id",
                        "foreignField": "_id",
                        "as": "company_details",
                    }
                },
                doc! { "$unwind": "$company_details" },
            ]
        );
    }

    #[test]
    fn test_merge_joined_puts_row_last_so_it_wins() {
        let rendered = Stage::MergeJoined("student_data".into()).to_bson();
        let merge = rendered
            .get_document("$replaceRoot")
            .and_then(|r| r.get_document("newRoot"))
            .and_then(|r| r.get_array("$mergeObjects"))
            .expect("mergeObjects");
        assert_eq!(merge.last(), Some(&Bson::String("$$ROOT".into())));
    }

    #[test]
    fn test_facet_renders_each_branch() {
        let pipeline = Pipeline::new().facet(vec![
            ("metadata", Pipeline::new().count("totalCount")),
            ("data", Pipeline::new().skip(10).limit(10)),
        ]);
        assert_eq!(
            pipeline.to_bson(),
            vec![doc! {
                "$facet": {
                    "metadata": [{ "$count": "totalCount" }],
                    "data": [{ "$skip": 10_i64 }, { "$limit": 10_i64 }],
                }
            }]
        );
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("anything"), SortOrder::Asc);
    }
}
