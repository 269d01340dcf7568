//! Observation from OBX.

use hl7_types::well_known::UCUM;
use serde_json::{json, Value};

use super::practitioner::practitioner;
use super::{codeable_concept, datetime, notes, pruned, reference};
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::model::{ModelInput, ResourceModel};
use crate::types::{EvaluationError, EvaluationResult};

/// Maps an `OBX` segment to an Observation.
///
/// OBX-3 is required. Every responsible observer in OBX-16 becomes its own
/// Practitioner, referenced from `performer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationModel;

impl ResourceModel for ObservationModel {
    fn name(&self) -> &str {
        "Observation"
    }

    fn resource_type(&self) -> &str {
        "Observation"
    }

    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>> {
        let obx = input.segment;
        input.required(3)?;

        let mut observation = ctx.create_for("Observation", obx);
        observation.set("status", status(obx.value(11)));
        observation.set_opt(
            "code",
            obx.field(3).and_then(|f| f.first()).and_then(codeable_concept),
        );
        if let Some((key, value)) = observation_value(input)? {
            observation.set(key, value);
        }
        observation.set_list(
            "referenceRange",
            obx.value(7)
                .map(|text| vec![json!({ "text": text })])
                .unwrap_or_default(),
        );
        observation.set_opt("effectiveDateTime", datetime(obx, 14)?);
        observation.set_opt("subject", ctx.reference("Patient").map(reference));

        let mut secondary = Vec::new();
        for rep in obx.repetitions(16) {
            if let Some(performer) = practitioner(rep, ctx) {
                observation.push("performer", reference(performer.reference()));
                secondary.push(performer);
            }
        }

        observation.set_list("note", notes(input));

        let mut out = Vec::with_capacity(secondary.len() + 1);
        out.push(observation);
        out.extend(secondary);
        Ok(out)
    }
}

/// OBX-11 result status.
fn status(code: Option<&str>) -> &'static str {
    match code {
        Some("F") => "final",
        Some("P") | Some("R") | Some("S") => "preliminary",
        Some("C") => "corrected",
        Some("X") => "cancelled",
        Some("D") | Some("W") => "entered-in-error",
        Some("I") => "registered",
        _ => "unknown",
    }
}

/// The `value[x]` element for OBX-5, typed by OBX-2.
fn observation_value(input: &ModelInput<'_>) -> EvaluationResult<Option<(&'static str, Value)>> {
    let obx = input.segment;
    let Some(raw) = obx.value(5) else {
        return Ok(None);
    };

    let value = match obx.value(2).unwrap_or("ST") {
        "NM" => {
            let number: f64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|n: &f64| n.is_finite())
                .ok_or_else(|| EvaluationError::InvalidValue {
                    segment: obx.name.clone(),
                    field: 5,
                    value: raw.to_string(),
                })?;
            let system = match obx.component(6, 3) {
                Some(s) if s.eq_ignore_ascii_case("UCUM") => Some(UCUM),
                _ => None,
            };
            (
                "valueQuantity",
                pruned(json!({
                    "value": number,
                    "unit": obx.component(6, 2).or_else(|| obx.component(6, 1)),
                    "system": system,
                    "code": system.and(obx.component(6, 1)),
                })),
            )
        }
        "CE" | "CWE" | "CNE" => match obx.field(5).and_then(|f| f.first()).and_then(codeable_concept) {
            Some(cc) => ("valueCodeableConcept", cc),
            None => return Ok(None),
        },
        "TS" | "DTM" | "DT" => match datetime(obx, 5)? {
            Some(dt) => ("valueDateTime", Value::String(dt)),
            None => return Ok(None),
        },
        _ => {
            let text: Vec<&str> = obx
                .repetitions(5)
                .into_iter()
                .filter_map(|r| r.value())
                .collect();
            ("valueString", Value::String(text.join("\n")))
        }
    };
    Ok(Some(value))
}
