//! Per-document update operations
//!
//! Mirrors the subset of MongoDB update operators the lifecycle writes
//! need. Applying an `Update` to a record is atomic from the store's point
//! of view: the memory store applies it under its write lock, the MongoDB
//! store sends it as a single `updateOne`.

use bson::{doc, Bson, Document};

use super::value::{bson_eq, compare, get_path, set_path};
use super::Filter;
use crate::types::{PlacementError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Bson),
    /// Add each value to the array unless already present
    AddToSet(String, Vec<Bson>),
    Push(String, Bson),
    /// Set the field when absent or when the value is lower
    Min(String, Bson),
}

impl UpdateOp {
    fn path(&self) -> &str {
        match self {
            Self::Set(path, _) | Self::AddToSet(path, _) | Self::Push(path, _) | Self::Min(path, _) => path,
        }
    }

    fn with_path(&self, path: String) -> Self {
        match self {
            Self::Set(_, value) => Self::Set(path, value.clone()),
            Self::AddToSet(_, values) => Self::AddToSet(path, values.clone()),
            Self::Push(_, value) => Self::Push(path, value.clone()),
            Self::Min(_, value) => Self::Min(path, value.clone()),
        }
    }
}

/// Ordered set of update operations against one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(path.to_string(), value.into()));
        self
    }

    pub fn add_to_set(self, path: &str, value: impl Into<Bson>) -> Self {
        self.add_each_to_set(path, vec![value.into()])
    }

    pub fn add_each_to_set(mut self, path: &str, values: Vec<Bson>) -> Self {
        self.ops.push(UpdateOp::AddToSet(path.to_string(), values));
        self
    }

    pub fn push(mut self, path: &str, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Push(path.to_string(), value.into()));
        self
    }

    pub fn min(mut self, path: &str, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Min(path.to_string(), value.into()));
        self
    }

    /// Replace the positional `$` segment of each path with the index of
    /// the array element `filter` matched, as the server does for
    /// `"placements.$.placed_students"`.
    pub fn bind_positional(&self, record: &Document, filter: &Filter) -> Result<Update> {
        let ops = self
            .ops
            .iter()
            .map(|op| match op.path().split_once(".$") {
                None => Ok(op.clone()),
                Some((array, rest)) => {
                    let index = filter.matched_index(record, array).ok_or_else(|| {
                        PlacementError::InvalidPipeline(format!(
                            "positional update on '{}' without a matching array element",
                            op.path()
                        ))
                    })?;
                    Ok(op.with_path(format!("{}.{}{}", array, index, rest)))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Update { ops })
    }

    /// Render as a MongoDB update document
    pub fn to_bson(&self) -> Document {
        let mut set = Document::new();
        let mut add_to_set = Document::new();
        let mut push = Document::new();
        let mut min = Document::new();

        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => {
                    set.insert(path.as_str(), value.clone());
                }
                UpdateOp::AddToSet(path, values) => {
                    add_to_set.insert(path.as_str(), doc! { "$each": values.clone() });
                }
                UpdateOp::Push(path, value) => {
                    push.insert(path.as_str(), value.clone());
                }
                UpdateOp::Min(path, value) => {
                    min.insert(path.as_str(), value.clone());
                }
            }
        }

        let mut update = Document::new();
        for (operator, fields) in [("$set", set), ("$addToSet", add_to_set), ("$push", push), ("$min", min)] {
            if !fields.is_empty() {
                update.insert(operator, fields);
            }
        }
        update
    }

    /// Apply to a record in place; returns whether anything changed
    pub fn apply(&self, record: &mut Document) -> bool {
        let mut modified = false;
        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => {
                    if get_path(record, path) != Some(value) {
                        set_path(record, path, value.clone());
                        modified = true;
                    }
                }
                UpdateOp::AddToSet(path, values) => {
                    let mut items = match get_path(record, path) {
                        Some(Bson::Array(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    let before = items.len();
                    for value in values {
                        if !items.iter().any(|existing| bson_eq(existing, value)) {
                            items.push(value.clone());
                        }
                    }
                    if items.len() != before || get_path(record, path).is_none() {
                        set_path(record, path, Bson::Array(items));
                        modified = true;
                    }
                }
                UpdateOp::Push(path, value) => {
                    let mut items = match get_path(record, path) {
                        Some(Bson::Array(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    items.push(value.clone());
                    set_path(record, path, Bson::Array(items));
                    modified = true;
                }
                UpdateOp::Min(path, value) => {
                    let current = get_path(record, path);
                    // null sorts below every number, so it is never replaced
                    let lower = match current {
                        None => true,
                        Some(existing) => compare(Some(value), Some(existing)).is_lt(),
                    };
                    if lower {
                        set_path(record, path, value.clone());
                        modified = true;
                    }
                }
            }
        }
        modified
    }
}
