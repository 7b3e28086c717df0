//! Path resolution and comparison over loosely-typed BSON records
//!
//! These follow MongoDB's semantics closely enough that a pipeline evaluated
//! in memory returns the same rows as the server would.

use bson::{Bson, Document};
use std::cmp::Ordering;

/// Resolve a dotted path without fanning out over arrays. A numeric
/// segment indexes into an array.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        match current {
            Bson::Document(inner) => current = inner.get(part)?,
            Bson::Array(items) => current = items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Collect every value a query filter would compare against for `path`.
///
/// Arrays met along the way fan out to their elements, and an array at the
/// end of the path contributes both itself and each of its elements.
pub fn values_at<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((head, rest)) = parts.split_first() {
        collect(doc.get(*head), rest, &mut out);
    }
    out
}

fn collect<'a>(value: Option<&'a Bson>, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some(value) = value else { return };
    match (value, rest.split_first()) {
        (Bson::Array(items), None) => {
            out.push(value);
            out.extend(items.iter());
        }
        (_, None) => out.push(value),
        (Bson::Document(inner), Some((head, tail))) => collect(inner.get(*head), tail, out),
        (Bson::Array(items), Some(_)) => {
            for item in items {
                if matches!(item, Bson::Document(_)) {
                    collect(Some(item), rest, out);
                }
            }
        }
        _ => {}
    }
}

/// Set a dotted path, creating intermediate sub-documents as needed.
///
/// A numeric segment addresses an existing array element; an index past
/// the end leaves the record unchanged.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, tail)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_)) | Some(Bson::Array(_))) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, tail, value),
                Some(Bson::Array(items)) => set_element(items, tail, value),
                _ => {}
            }
        }
    }
}

fn set_element(items: &mut [Bson], path: &str, value: Bson) {
    let (index, rest) = match path.split_once('.') {
        Some((index, rest)) => (index, Some(rest)),
        None => (path, None),
    };
    let Some(item) = index.parse::<usize>().ok().and_then(|i| items.get_mut(i)) else {
        return;
    };
    match (rest, item) {
        (None, item) => *item = value,
        (Some(rest), Bson::Document(inner)) => set_path(inner, rest, value),
        (Some(rest), Bson::Array(nested)) => set_element(nested, rest, value),
        _ => {}
    }
}

/// Remove a dotted path. Missing segments are ignored.
pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, tail)) => match doc.get_mut(head) {
            Some(Bson::Document(inner)) => remove_path(inner, tail),
            Some(Bson::Array(items)) => {
                for item in items.iter_mut() {
                    if let Bson::Document(inner) = item {
                        remove_path(inner, tail);
                    }
                }
            }
            _ => {}
        },
    }
}

/// Numeric view of a BSON value, across the integer and double encodings.
pub fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Integer view of a BSON value; doubles are truncated.
pub fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) => Some(*n as i64),
        _ => None,
    }
}

/// Equality with numeric widening (`Int32(3) == Double(3.0)`).
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 0,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 1,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

/// Total order used by `$sort`: missing and null first, then numbers, then
/// strings (binary order), then everything else grouped by type.
pub fn compare(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(x), Some(y)) => match (x, y) {
            (Bson::String(l), Bson::String(r)) => l.cmp(r),
            (Bson::ObjectId(l), Bson::ObjectId(r)) => l.bytes().cmp(&r.bytes()),
            (Bson::Boolean(l), Bson::Boolean(r)) => l.cmp(r),
            (Bson::DateTime(l), Bson::DateTime(r)) => l.cmp(r),
            _ => match (as_f64(x), as_f64(y)) {
                (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
        _ => Ordering::Equal,
    }
}
