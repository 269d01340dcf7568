//! Built-in resource models.
//!
//! Each model maps one driving segment (plus any additional segments) to a
//! resource. Shared data-type conversions live here: timestamps, coded
//! elements, person names and references.

mod condition;
mod encounter;
mod message_header;
mod observation;
mod patient;
mod practitioner;
mod specimen;

pub use condition::ConditionModel;
pub use encounter::EncounterModel;
pub use message_header::MessageHeaderModel;
pub use observation::ObservationModel;
pub use patient::PatientModel;
pub use specimen::SpecimenModel;

use hl7_types::well_known::system_uri;
use hl7_types::{Coding, Repetition, Segment};
use serde_json::{json, Value};

use crate::model::ModelInput;
use crate::types::{EvaluationError, EvaluationResult};

/// Converts an HL7 timestamp (`YYYY[MM[DD[HH[MM[SS[.S]]]]]][+/-ZZZZ]`) to FHIR form.
///
/// Returns `None` when the value is not a timestamp.
pub fn to_fhir_datetime(value: &str) -> Option<String> {
    let value = value.trim();
    let (stamp, offset) = match value
        .char_indices()
        .skip(8)
        .find(|(_, c)| *c == '+' || *c == '-')
    {
        Some((i, _)) => (&value[..i], Some(&value[i..])),
        None => (value, None),
    };
    let stamp = stamp.split('.').next().unwrap_or(stamp);
    if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut out = match stamp.len() {
        4 => stamp.to_string(),
        6 => format!("{}-{}", &stamp[..4], &stamp[4..6]),
        8 => format!("{}-{}-{}", &stamp[..4], &stamp[4..6], &stamp[6..8]),
        10 | 12 | 14 => format!(
            "{}-{}-{}T{}:{}:{}",
            &stamp[..4],
            &stamp[4..6],
            &stamp[6..8],
            &stamp[8..10],
            stamp.get(10..12).unwrap_or("00"),
            stamp.get(12..14).unwrap_or("00"),
        ),
        _ => return None,
    };

    if let Some(offset) = offset {
        let digits = &offset[1..];
        if out.contains('T') && digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()) {
            out.push_str(&offset[..3]);
            out.push(':');
            out.push_str(&offset[3..]);
        }
    }
    Some(out)
}

/// Reads a timestamp field; an unparsable value is an `InvalidValue` error.
pub(crate) fn datetime(segment: &Segment, field: usize) -> EvaluationResult<Option<String>> {
    match segment.value(field) {
        Some(raw) => parse_datetime(segment, field, raw).map(Some),
        None => Ok(None),
    }
}

/// Reads a timestamp field as a date.
pub(crate) fn date(segment: &Segment, field: usize) -> EvaluationResult<Option<String>> {
    Ok(datetime(segment, field)?.map(|d| match d.split_once('T') {
        Some((day, _)) => day.to_string(),
        None => d,
    }))
}

pub(crate) fn parse_datetime(segment: &Segment, field: usize, raw: &str) -> EvaluationResult<String> {
    to_fhir_datetime(raw).ok_or_else(|| EvaluationError::InvalidValue {
        segment: segment.name.clone(),
        field,
        value: raw.to_string(),
    })
}

/// Drops nulls, empty arrays and empty objects, recursively.
pub(crate) fn pruned(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, pruned(v)))
                .filter(|(_, v)| !is_blank(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(pruned)
                .filter(|v| !is_blank(v))
                .collect(),
        ),
        other => other,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A `{"reference": ...}` object.
pub(crate) fn reference(target: impl Into<String>) -> Value {
    json!({ "reference": target.into() })
}

pub(crate) fn coding_json(coding: &Coding) -> Value {
    pruned(json!({
        "system": coding.system,
        "code": coding.code,
        "display": coding.display,
    }))
}

/// One coding from a coded element triplet starting after `offset` components.
fn coding_at(rep: &Repetition, offset: usize) -> Option<Value> {
    let code = rep.component(offset + 1)?;
    let system = rep.component(offset + 3).and_then(system_uri);
    Some(pruned(json!({
        "system": system,
        "code": code,
        "display": rep.component(offset + 2),
    })))
}

/// Builds a codeable concept from a CE/CWE repetition.
///
/// Both the primary and the alternate triplet become codings; text is the
/// original text (component 9) or the primary display.
pub(crate) fn codeable_concept(rep: &Repetition) -> Option<Value> {
    let codings: Vec<Value> = [0, 3].iter().filter_map(|&o| coding_at(rep, o)).collect();
    let text = rep.component(9).or_else(|| rep.component(2));
    if codings.is_empty() && text.is_none() {
        return None;
    }
    Some(pruned(json!({ "coding": codings, "text": text })))
}

/// Builds a human name from an XPN (offset 0) or XCN (offset 1) repetition.
pub(crate) fn human_name(rep: &Repetition, offset: usize) -> Option<Value> {
    let family = rep.component(offset + 1);
    let given: Vec<&str> = [offset + 2, offset + 3]
        .iter()
        .filter_map(|&p| rep.component(p))
        .collect();
    if family.is_none() && given.is_empty() {
        return None;
    }
    Some(pruned(json!({
        "family": family,
        "given": given,
        "suffix": rep.component(offset + 4).map(|s| vec![s]),
        "prefix": rep.component(offset + 5).map(|s| vec![s]),
    })))
}

/// `note` entries from the NTE segments attached to an occurrence.
pub(crate) fn notes(input: &ModelInput<'_>) -> Vec<Value> {
    input
        .additional
        .iter()
        .filter(|s| s.name == "NTE")
        .filter_map(|s| s.value(3))
        .map(|text| json!({ "text": text }))
        .collect()
}
