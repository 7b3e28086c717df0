//! In-memory pipeline interpreter
//!
//! Runs a [`Pipeline`] over a slice of records, resolving `$lookup` stages
//! against a read-only view of the other collections. Input records are
//! never mutated; every stage produces new rows.

use bson::{Bson, Document};
use std::collections::HashMap;

use super::value::{bson_eq, compare, get_path, set_path};
use super::{Expr, Pipeline, SortOrder, Stage};
use crate::join::{join, overlay_base_wins};
use crate::store::Collection;
use crate::types::{PlacementError, Result};

/// Read-only view of every collection, used to resolve lookups
pub type CollectionView<'a> = &'a HashMap<Collection, Vec<Document>>;

/// Execute all stages over `input`
pub fn execute(pipeline: &Pipeline, input: Vec<Document>, view: CollectionView<'_>) -> Result<Vec<Document>> {
    let mut rows = input;
    for stage in pipeline.stages() {
        rows = execute_stage(stage, rows, view)?;
    }
    Ok(rows)
}

fn execute_stage(stage: &Stage, rows: Vec<Document>, view: CollectionView<'_>) -> Result<Vec<Document>> {
    let out = match stage {
        Stage::Match(filter) => rows.into_iter().filter(|row| filter.matches(row)).collect(),
        Stage::Lookup {
            from,
            local_field,
            foreign_field,
            as_field,
        } => {
            let foreign = view.get(from).map(Vec::as_slice).unwrap_or(&[]);
            join(rows, foreign, local_field, foreign_field, as_field)
        }
        Stage::Unwind(path) => unwind(rows, path),
        Stage::Project(projection) => rows.iter().map(|row| projection.apply(row)).collect(),
        Stage::MergeJoined(field) => rows
            .iter()
            .map(|row| {
                let joined = match row.get(field) {
                    Some(Bson::Array(matches)) => match matches.first() {
                        Some(Bson::Document(first)) => first.clone(),
                        _ => Document::new(),
                    },
                    _ => Document::new(),
                };
                overlay_base_wins(row, &joined)
            })
            .collect(),
        Stage::Group { key, sums } => group(rows, key, sums),
        Stage::Sort(keys) => {
            let mut rows = rows;
            // stable, so equal keys keep their input order
            rows.sort_by(|a, b| {
                keys.iter()
                    .map(|(field, order)| {
                        let ord = compare(get_path(a, field), get_path(b, field));
                        match order {
                            SortOrder::Asc => ord,
                            SortOrder::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            rows
        }
        Stage::Skip(n) => rows
            .into_iter()
            .skip(usize::try_from(*n).unwrap_or(usize::MAX))
            .collect(),
        Stage::Limit(n) => {
            if *n == 0 {
                return Err(PlacementError::InvalidPipeline("$limit must be positive".into()));
            }
            rows.into_iter()
                .take(usize::try_from(*n).unwrap_or(usize::MAX))
                .collect()
        }
        Stage::Count(field) => {
            if rows.is_empty() {
                Vec::new()
            } else {
                let mut counted = Document::new();
                counted.insert(field.as_str(), Bson::Int32(rows.len() as i32));
                vec![counted]
            }
        }
        Stage::Facet(branches) => {
            let mut faceted = Document::new();
            for (name, branch) in branches {
                if branch.stages().iter().any(|s| matches!(s, Stage::Facet(_))) {
                    return Err(PlacementError::InvalidPipeline(
                        "$facet branches cannot contain $facet".into(),
                    ));
                }
                let produced = execute(branch, rows.clone(), view)?;
                faceted.insert(
                    name.as_str(),
                    produced.into_iter().map(Bson::Document).collect::<Vec<_>>(),
                );
            }
            vec![faceted]
        }
    };
    Ok(out)
}

fn unwind(rows: Vec<Document>, path: &str) -> Vec<Document> {
    let mut out = Vec::new();
    for row in rows {
        let items = match get_path(&row, path) {
            Some(Bson::Array(items)) => items.clone(),
            None | Some(Bson::Null) => continue,
            // scalars unwind to themselves
            Some(_) => {
                out.push(row);
                continue;
            }
        };
        for item in items {
            let mut expanded = row.clone();
            set_path(&mut expanded, path, item);
            out.push(expanded);
        }
    }
    out
}

fn group(rows: Vec<Document>, key: &str, sums: &[(String, Expr)]) -> Vec<Document> {
    // first-seen order of keys
    let mut groups: Vec<(Bson, Vec<f64>)> = Vec::new();
    for row in &rows {
        let group_key = get_path(row, key).cloned().unwrap_or(Bson::Null);
        let index = match groups.iter().position(|(k, _)| bson_eq(k, &group_key)) {
            Some(i) => i,
            None => {
                groups.push((group_key, vec![0.0; sums.len()]));
                groups.len() - 1
            }
        };
        for (slot, (_, expr)) in groups[index].1.iter_mut().zip(sums) {
            *slot += expr.eval_number(row).unwrap_or(0.0);
        }
    }

    groups
        .into_iter()
        .map(|(group_key, totals)| {
            let mut out = Document::new();
            out.insert("_id", group_key);
            for ((name, _), total) in sums.iter().zip(totals) {
                out.insert(name.as_str(), number(total));
            }
            out
        })
        .collect()
}

fn number(n: f64) -> Bson {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Bson::Int64(n as i64)
    } else {
        Bson::Double(n)
    }
}
