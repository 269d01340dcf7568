//! Encounter from PV1 (and PV2).

use hl7_types::well_known::{PARTICIPATION_TYPE, V2_0004};
use serde_json::{json, Value};

use super::practitioner::practitioner;
use super::{codeable_concept, datetime, pruned, reference};
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::model::{ModelInput, ResourceModel};
use crate::types::EvaluationResult;

/// PV1 doctor fields and the participation type each maps to.
const PARTICIPANTS: &[(usize, &str, &str)] = &[
    (7, "ATND", "attender"),
    (8, "REF", "referrer"),
    (9, "CON", "consultant"),
    (17, "ADM", "admitter"),
];

/// Maps a `PV1` segment to an Encounter.
///
/// Each doctor listed in PV1-7/8/9/17 yields a Practitioner alongside the
/// encounter. `reasonReference` lists every Observation registered in scope,
/// then the Observation built from each attached `OBX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncounterModel;

impl ResourceModel for EncounterModel {
    fn name(&self) -> &str {
        "Encounter"
    }

    fn resource_type(&self) -> &str {
        "Encounter"
    }

    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>> {
        let pv1 = input.segment;
        let mut encounter = ctx.create("Encounter");
        let mut secondary = Vec::new();

        let end = datetime(pv1, 45)?;
        encounter.set("status", if end.is_some() { "finished" } else { "unknown" });
        if let Some(class) = pv1.value(2) {
            encounter.set("class", class_coding(class));
        }
        encounter.set_opt(
            "identifier",
            pv1.value(19).map(|v| json!([{ "value": v }])),
        );
        encounter.set_opt("subject", ctx.reference("Patient").map(reference));

        for (field, code, display) in PARTICIPANTS {
            for rep in pv1.repetitions(*field) {
                let Some(doctor) = practitioner(rep, ctx) else {
                    continue;
                };
                encounter.push(
                    "participant",
                    json!({
                        "type": [{ "coding": [{ "system": PARTICIPATION_TYPE, "code": code, "display": display }] }],
                        "individual": reference(doctor.reference()),
                    }),
                );
                secondary.push(doctor);
            }
        }

        let period = pruned(json!({ "start": datetime(pv1, 44)?, "end": end }));
        if period.as_object().is_some_and(|p| !p.is_empty()) {
            encounter.set("period", period);
        }

        if let Some(rep) = pv1.field(3).and_then(|f| f.first()) {
            let parts: Vec<&str> = [1, 2, 3].iter().filter_map(|&p| rep.component(p)).collect();
            if !parts.is_empty() {
                encounter.set("location", json!([{ "location": { "display": parts.join(" ") } }]));
            }
        }

        let mut reasons = ctx.references("Observation");
        for obx in input.additional.iter().filter(|s| s.name == "OBX") {
            let target = ctx.segment_reference("Observation", obx);
            if !reasons.contains(&target) {
                reasons.push(target);
            }
        }
        encounter.set_list(
            "reasonReference",
            reasons.into_iter().map(reference).collect(),
        );

        if let Some(pv2) = input.additional_segment("PV2") {
            let reasons: Vec<Value> = pv2
                .repetitions(3)
                .into_iter()
                .filter_map(codeable_concept)
                .collect();
            encounter.set_list("reasonCode", reasons);
        }

        let mut out = Vec::with_capacity(secondary.len() + 1);
        out.push(encounter);
        out.extend(secondary);
        Ok(out)
    }
}

fn class_coding(code: &str) -> Value {
    let display = match code {
        "I" => Some("Inpatient"),
        "O" => Some("Outpatient"),
        "E" => Some("Emergency"),
        "P" => Some("Preadmit"),
        "R" => Some("Recurring patient"),
        "B" => Some("Obstetrics"),
        "C" => Some("Commercial Account"),
        "N" => Some("Not Applicable"),
        "U" => Some("Unknown"),
        _ => None,
    };
    pruned(json!({ "system": V2_0004, "code": code, "display": display }))
}
