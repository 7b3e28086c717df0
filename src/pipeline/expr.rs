//! Computed fields for `$project` and `$group` stages

use bson::{doc, Bson, Document};

use super::value::{as_f64, get_path, remove_path, set_path};

/// Expression producing a value from a record
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Value at a dotted path
    Field(String),

    /// Length of the array at a path (missing counts as empty)
    Size(String),

    /// Sum of `field` array lengths across the elements of `array`
    SumOfSizes { array: String, field: String },

    /// Window of the array at a path
    Slice { path: String, skip: u64, limit: u64 },
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    pub fn size(path: impl Into<String>) -> Self {
        Self::Size(path.into())
    }

    pub fn sum_of_sizes(array: impl Into<String>, field: impl Into<String>) -> Self {
        Self::SumOfSizes {
            array: array.into(),
            field: field.into(),
        }
    }

    pub fn slice(path: impl Into<String>, skip: u64, limit: u64) -> Self {
        Self::Slice {
            path: path.into(),
            skip,
            limit,
        }
    }

    /// Render as a MongoDB aggregation expression
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Field(path) => Bson::String(format!("${}", path)),
            Self::Size(path) => Bson::Document(doc! {
                "$size": { "$ifNull": [format!("${}", path), []] }
            }),
            Self::SumOfSizes { array, field } => Bson::Document(doc! {
                "$sum": {
                    "$map": {
                        "input": { "$ifNull": [format!("${}", array), []] },
                        "as": "entry",
                        "in": { "$size": { "$ifNull": [format!("$$entry.{}", field), []] } },
                    }
                }
            }),
            Self::Slice { path, skip, limit } => Bson::Document(doc! {
                "$slice": [
                    { "$ifNull": [format!("${}", path), []] },
                    clamp_i64(*skip),
                    clamp_i64(*limit),
                ]
            }),
        }
    }

    /// Evaluate against a record; `None` means the field is absent
    pub fn eval(&self, record: &Document) -> Option<Bson> {
        match self {
            Self::Field(path) => get_path(record, path).cloned(),
            Self::Size(path) => Some(Bson::Int32(array_len(get_path(record, path)) as i32)),
            Self::SumOfSizes { array, field } => {
                let total: usize = match get_path(record, array) {
                    Some(Bson::Array(entries)) => entries
                        .iter()
                        .map(|entry| match entry {
                            Bson::Document(inner) => array_len(get_path(inner, field)),
                            _ => 0,
                        })
                        .sum(),
                    _ => 0,
                };
                Some(Bson::Int64(total as i64))
            }
            Self::Slice { path, skip, limit } => {
                let window: Vec<Bson> = match get_path(record, path) {
                    Some(Bson::Array(items)) => items
                        .iter()
                        .skip(usize::try_from(*skip).unwrap_or(usize::MAX))
                        .take(usize::try_from(*limit).unwrap_or(usize::MAX))
                        .cloned()
                        .collect(),
                    _ => Vec::new(),
                };
                Some(Bson::Array(window))
            }
        }
    }

    /// Numeric contribution to a `$sum` accumulator
    pub(crate) fn eval_number(&self, record: &Document) -> Option<f64> {
        self.eval(record).as_ref().and_then(as_f64)
    }
}

fn array_len(value: Option<&Bson>) -> usize {
    match value {
        Some(Bson::Array(items)) => items.len(),
        _ => 0,
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Shape of a `$project` stage
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep only the listed paths (plus `_id` unless dropped), with optional computed values
    Include {
        fields: Vec<(String, Option<Expr>)>,
        exclude_id: bool,
    },

    /// Drop the listed paths, keep everything else
    Exclude(Vec<String>),
}

impl Projection {
    pub fn include<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include {
            fields: paths.into_iter().map(|p| (p.into(), None)).collect(),
            exclude_id: false,
        }
    }

    pub fn exclude<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exclude(paths.into_iter().map(Into::into).collect())
    }

    /// Add a computed field (include mode only)
    pub fn computed(mut self, name: impl Into<String>, expr: Expr) -> Self {
        if let Self::Include { fields, .. } = &mut self {
            fields.push((name.into(), Some(expr)));
        }
        self
    }

    /// Suppress the implicit `_id` (include mode only)
    pub fn without_id(mut self) -> Self {
        if let Self::Include { exclude_id, .. } = &mut self {
            *exclude_id = true;
        }
        self
    }

    pub fn to_bson(&self) -> Document {
        let mut stage = Document::new();
        match self {
            Self::Include { fields, exclude_id } => {
                if *exclude_id {
                    stage.insert("_id", 0);
                }
                for (path, expr) in fields {
                    match expr {
                        Some(expr) => stage.insert(path.as_str(), expr.to_bson()),
                        None => stage.insert(path.as_str(), 1),
                    };
                }
            }
            Self::Exclude(paths) => {
                for path in paths {
                    stage.insert(path.as_str(), 0);
                }
            }
        }
        stage
    }

    pub fn apply(&self, record: &Document) -> Document {
        match self {
            Self::Include { fields, exclude_id } => {
                let mut out = Document::new();
                let id_listed = fields.iter().any(|(path, _)| path == "_id");
                if !exclude_id && !id_listed {
                    if let Some(id) = record.get("_id") {
                        out.insert("_id", id.clone());
                    }
                }
                for (path, expr) in fields {
                    let value = match expr {
                        Some(expr) => expr.eval(record),
                        None => get_path(record, path).cloned(),
                    };
                    if let Some(value) = value {
                        set_path(&mut out, path, value);
                    }
                }
                out
            }
            Self::Exclude(paths) => {
                let mut out = record.clone();
                for path in paths {
                    remove_path(&mut out, path);
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> Document {
        doc! {
            "_id": 1,
            "company_name": "Acme",
            "company_website": "acme.test",
            "placements": [
                { "year": 2022, "placed_students": ["s1", "s2"] },
                { "year": 2023, "placed_students": ["s3"] },
                { "year": 2024 },
            ],
            "interview_experiences": ["e1", "e2", "e3"],
        }
    }

    #[test]
    fn test_sum_of_sizes_counts_every_placement_entry() {
        let total = Expr::sum_of_sizes("placements", "placed_students").eval(&company());
        assert_eq!(total, Some(Bson::Int64(3)));
    }

    #[test]
    fn test_size_and_slice() {
        let record = company();
        assert_eq!(Expr::size("interview_experiences").eval(&record), Some(Bson::Int32(3)));
        assert_eq!(Expr::size("missing").eval(&record), Some(Bson::Int32(0)));
        assert_eq!(
            Expr::slice("interview_experiences", 2, 10).eval(&record),
            Some(Bson::Array(vec![Bson::String("e3".into())]))
        );
        assert_eq!(
            Expr::slice("interview_experiences", 9, 10).eval(&record),
            Some(Bson::Array(vec![]))
        );
    }

    #[test]
    fn test_include_projection_keeps_id_and_computed_fields() {
        let projected = Projection::include(["company_name"])
            .computed("placements", Expr::sum_of_sizes("placements", "placed_students"))
            .apply(&company());
        assert_eq!(
            projected,
            doc! { "_id": 1, "company_name": "Acme", "placements": 3_i64 }
        );
    }

    #[test]
    fn test_include_projection_without_id() {
        let projected = Projection::include(Vec::<String>::new())
            .computed("label", Expr::field("company_name"))
            .computed("id", Expr::field("_id"))
            .without_id()
            .apply(&company());
        assert_eq!(projected, doc! { "label": "Acme", "id": 1 });
    }

    #[test]
    fn test_exclude_projection_renders_zero_flags() {
        let projection = Projection::exclude(["_id", "password"]);
        assert_eq!(projection.to_bson(), doc! { "_id": 0, "password": 0 });
    }
}
