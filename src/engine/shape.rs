//! Majority-shape inference over JSON-valued secrets.
//!
//! A record's shape is the sorted list of field names of its value when that
//! value is a non-empty JSON object. The most frequent shape in a set is the
//! majority shape; ties go to the shape seen first in input order.

use crate::models::SecretRecord;

/// Partition of a record set by majority shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeClassification<'a> {
    /// Field names of the majority shape, sorted; `None` if no record is an object
    pub majority_keys: Option<Vec<String>>,
    /// Records whose shape equals the majority shape, in input order
    pub conforming: Vec<&'a SecretRecord>,
    /// Everything else, in input order
    pub divergent: Vec<&'a SecretRecord>,
}

/// Sorted field names of `value` if it parses as a non-empty JSON object.
///
/// Arrays, scalars, `{}` and unparseable text all have no shape.
pub fn object_fields(value: &str) -> Option<Vec<String>> {
    let parsed: serde_json::Value = serde_json::from_str(value).ok()?;
    let object = parsed.as_object()?;
    if object.is_empty() {
        return None;
    }
    let mut fields: Vec<String> = object.keys().cloned().collect();
    fields.sort();
    Some(fields)
}

/// Classify records by shape.
pub fn classify(records: &[SecretRecord]) -> ShapeClassification<'_> {
    let shapes: Vec<Option<Vec<String>>> = records
        .iter()
        .map(|r| r.value.as_deref().and_then(object_fields))
        .collect();

    // (shape, count) in first-seen order
    let mut tally: Vec<(&Vec<String>, usize)> = Vec::new();
    for shape in shapes.iter().flatten() {
        match tally.iter_mut().find(|(s, _)| *s == shape) {
            Some(entry) => entry.1 += 1,
            None => tally.push((shape, 1)),
        }
    }

    let mut majority: Option<(&Vec<String>, usize)> = None;
    for &(shape, count) in &tally {
        if majority.is_none_or(|(_, best)| count > best) {
            majority = Some((shape, count));
        }
    }
    let majority_keys = majority.map(|(shape, _)| shape.clone());

    let mut conforming = Vec::new();
    let mut divergent = Vec::new();
    for (record, shape) in records.iter().zip(&shapes) {
        if shape.is_some() && shape.as_ref() == majority_keys.as_ref() {
            conforming.push(record);
        } else {
            divergent.push(record);
        }
    }

    ShapeClassification {
        majority_keys,
        conforming,
        divergent,
    }
}
