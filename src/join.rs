//! Join resolver
//!
//! Cross-collection references are plain id fields with no foreign-key
//! enforcement. Each reference the engine follows is declared once as a
//! [`Relationship`] and resolved by the single generic [`join`] below
//! (in memory) or by the equivalent `$lookup` stage (server side). The
//! descriptor's cardinality decides the join shape; queries never choose it.
//!
//! ## Cardinality
//!
//! ```text
//! One   Drive.company_id          → Company._id       lookup + unwind (inner join)
//! Many  Drive.registered_students → Student.user_id   lookup only (0..n per row)
//! Many  Company.interview_experiences → Experience._id
//! ```

use bson::{Bson, Document};

use crate::pipeline::value::{bson_eq, values_at};
use crate::pipeline::Stage;
use crate::store::Collection;

/// How many foreign records a base row is expected to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Typed descriptor for an id reference between two collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub from: Collection,
    pub local_key: &'static str,
    pub foreign_key: &'static str,
    pub cardinality: Cardinality,
}

/// Drive → owning company
pub const DRIVE_COMPANY: Relationship = Relationship {
    from: Collection::Companies,
    local_key: "company_id",
    foreign_key: "_id",
    cardinality: Cardinality::One,
};

/// Drive → students who registered for it
pub const DRIVE_REGISTERED_STUDENTS: Relationship = Relationship {
    from: Collection::Students,
    local_key: "registered_students",
    foreign_key: "user_id",
    cardinality: Cardinality::Many,
};

/// Company → interview experiences it references
pub const COMPANY_EXPERIENCES: Relationship = Relationship {
    from: Collection::Experiences,
    local_key: "interview_experiences",
    foreign_key: "_id",
    cardinality: Cardinality::Many,
};

impl Relationship {
    /// Stages joining this relationship, reading the local ids from
    /// `local_field`.
    ///
    /// `One` attaches the foreign record as a sub-document and drops rows
    /// without a match (inner join). `Many` attaches all 0..n matches as an
    /// array and keeps every row (left-outer join).
    pub fn stages(&self, local_field: &str, as_field: &str) -> Vec<Stage> {
        let lookup = Stage::Lookup {
            from: self.from,
            local_field: local_field.to_string(),
            foreign_field: self.foreign_key.to_string(),
            as_field: as_field.to_string(),
        };
        match self.cardinality {
            Cardinality::One => vec![lookup, Stage::Unwind(as_field.to_string())],
            Cardinality::Many => vec![lookup],
        }
    }
}

/// Left-outer join: every base row gets `as_field` holding its 0..n matches.
///
/// A local value that is an array matches element-wise, as does a foreign
/// key holding an array. A row whose local key is missing matches nothing.
/// Foreign records keep their collection order and are never modified.
pub fn join(
    base: Vec<Document>,
    foreign: &[Document],
    local_key: &str,
    foreign_key: &str,
    as_field: &str,
) -> Vec<Document> {
    base.into_iter()
        .map(|mut row| {
            let matches: Vec<Bson> = {
                let locals = values_at(&row, local_key);
                foreign
                    .iter()
                    .filter(|candidate| {
                        values_at(candidate, foreign_key)
                            .into_iter()
                            .any(|f| locals.iter().any(|l| bson_eq(l, f)))
                    })
                    .cloned()
                    .map(Bson::Document)
                    .collect()
            };
            row.insert(as_field, matches);
            row
        })
        .collect()
}

/// Merge a joined record underneath a base row.
///
/// Starts from `joined` and overwrites with every field of `base`, so on a
/// key collision the base row's value is kept.
pub fn overlay_base_wins(base: &Document, joined: &Document) -> Document {
    let mut merged = joined.clone();
    for (key, value) in base {
        merged.insert(key.as_str(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn students() -> Vec<Document> {
        vec![
            doc! { "user_id": "s1", "name": "Asha" },
            doc! { "user_id": "s2", "name": "Ravi" },
            doc! { "user_id": "s3", "name": "Meera" },
        ]
    }

    #[test]
    fn test_set_match_join_collects_all_matches() {
        let drives = vec![doc! { "_id": 1, "registered_students": ["s3", "s1", "ghost"] }];
        let joined = join(drives, &students(), "registered_students", "user_id", "student_details");
        let names: Vec<&str> = joined[0]
            .get_array("student_details")
            .unwrap()
            .iter()
            .filter_map(|s| s.as_document()?.get_str("name").ok())
            .collect();
        // foreign collection order, unmatched ids silently skipped
        assert_eq!(names, vec!["Asha", "Meera"]);
    }

    #[test]
    fn test_unmatched_rows_are_kept_with_empty_side() {
        let drives = vec![doc! { "_id": 1, "company_id": 99 }, doc! { "_id": 2 }];
        let joined = join(drives, &[doc! { "_id": 7 }], "company_id", "_id", "company_details");
        assert_eq!(joined.len(), 2);
        assert!(joined.iter().all(|row| row.get_array("company_details").unwrap().is_empty()));
    }

    #[test]
    fn test_cardinality_decides_unwind() {
        assert_eq!(
            DRIVE_COMPANY.stages("company_id", "company_details").last(),
            Some(&Stage::Unwind("company_details".into()))
        );
        let many = DRIVE_REGISTERED_STUDENTS.stages("registered_students", "student_details");
        assert_eq!(many.len(), 1);
        assert!(matches!(many[0], Stage::Lookup { .. }));
        assert_eq!(COMPANY_EXPERIENCES.stages("data", "data").len(), 1);
    }

    #[test]
    fn test_join_does_not_mutate_foreign_records() {
        let foreign = students();
        let before = foreign.clone();
        let _ = join(vec![doc! { "ids": ["s1"] }], &foreign, "ids", "user_id", "matched");
        assert_eq!(foreign, before);
    }

    #[test]
    fn test_overlay_keeps_base_fields_on_collision() {
        let base = doc! { "_id": "drive-1", "registered_students": "s1" };
        let joined = doc! { "_id": "student-oid", "user_id": "s1", "name": "Asha" };
        let merged = overlay_base_wins(&base, &joined);
        assert_eq!(
            merged,
            doc! {
                "_id": "drive-1",
                "user_id": "s1",
                "name": "Asha",
                "registered_students": "s1",
            }
        );
    }
}
