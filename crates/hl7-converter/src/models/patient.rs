//! Patient from PID.

use hl7_types::well_known::V2_0203;
use hl7_types::Repetition;
use serde_json::{json, Value};

use super::{date, human_name, pruned};
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::model::{ModelInput, ResourceModel};
use crate::types::EvaluationResult;

/// Maps a `PID` segment to a Patient.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientModel;

impl ResourceModel for PatientModel {
    fn name(&self) -> &str {
        "Patient"
    }

    fn resource_type(&self) -> &str {
        "Patient"
    }

    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>> {
        let pid = input.segment;
        let mut patient = ctx.create("Patient");

        patient.set_list(
            "identifier",
            pid.repetitions(3).into_iter().filter_map(identifier).collect(),
        );
        patient.set_list(
            "name",
            pid.repetitions(5)
                .into_iter()
                .filter_map(|r| human_name(r, 0))
                .collect(),
        );
        patient.set_opt("birthDate", date(pid, 7)?);
        patient.set_opt("gender", pid.value(8).and_then(gender));
        patient.set_list(
            "address",
            pid.repetitions(11).into_iter().filter_map(address).collect(),
        );
        patient.set_list(
            "telecom",
            pid.repetitions(13).into_iter().filter_map(telecom).collect(),
        );

        Ok(vec![patient])
    }
}

/// CX: id number, assigning authority (4), identifier type (5).
fn identifier(rep: &Repetition) -> Option<Value> {
    let value = rep.component(1)?;
    let kind = rep
        .component(5)
        .map(|code| json!({ "coding": [{ "system": V2_0203, "code": code }] }));
    Some(pruned(json!({
        "value": value,
        "type": kind,
        "assigner": rep.component(4).map(|a| json!({ "display": a })),
    })))
}

fn gender(code: &str) -> Option<&'static str> {
    match code.trim().to_ascii_uppercase().as_str() {
        "M" | "MALE" => Some("male"),
        "F" | "FEMALE" => Some("female"),
        "O" | "OTHER" => Some("other"),
        "U" | "UNKNOWN" => Some("unknown"),
        _ => None,
    }
}

/// XAD: street, other designation, city, state, zip, country.
fn address(rep: &Repetition) -> Option<Value> {
    let line: Vec<&str> = [1, 2].iter().filter_map(|&p| rep.component(p)).collect();
    let value = pruned(json!({
        "line": line,
        "city": rep.component(3),
        "state": rep.component(4),
        "postalCode": rep.component(5),
        "country": rep.component(6),
    }));
    match &value {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}

/// XTN: legacy number (1) or unformatted number (12), use code (2).
fn telecom(rep: &Repetition) -> Option<Value> {
    let value = rep.component(1).or_else(|| rep.component(12))?;
    let usage = match rep.component(2) {
        Some("PRN") => Some("home"),
        Some("WPN") => Some("work"),
        _ => None,
    };
    Some(pruned(json!({ "system": "phone", "value": value, "use": usage })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;
    use crate::types::EvaluationError;
    use hl7_types::MessageCategory;

    fn evaluate(line: &str) -> EvaluationResult<Vec<ResourceInstance>> {
        let pid = test_support::segment(line);
        test_support::evaluate(&PatientModel, MessageCategory::Adt, &pid, vec![], &[])
    }

    #[test]
    fn test_patient_fields() {
        let out = evaluate(
            "PID|1||000010016^^^MR~000010017^^^^SS||Wood^Patrick^^Sr^MR||19700101|M|||123 Main St^^Lynchburg^VA^24501^USA||(434)555-1234^PRN",
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        let patient = &out[0];
        assert_eq!(patient.resource_type(), "Patient");
        assert_eq!(patient.get("birthDate"), Some(&json!("1970-01-01")));
        assert_eq!(patient.get("gender"), Some(&json!("male")));

        let ids = patient.get("identifier").and_then(Value::as_array).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0]["assigner"]["display"], "MR");
        assert_eq!(ids[1]["type"]["coding"][0]["code"], "SS");

        assert_eq!(patient.get("name").unwrap()[0]["family"], "Wood");
        assert_eq!(patient.get("address").unwrap()[0]["city"], "Lynchburg");
        assert_eq!(patient.get("telecom").unwrap()[0]["use"], "home");
    }

    #[test]
    fn test_sparse_patient() {
        let out = evaluate("PID|1||1234").unwrap();
        let patient = &out[0];
        assert!(patient.get("name").is_none());
        assert!(patient.get("gender").is_none());
        assert!(patient.get("address").is_none());
    }

    #[test]
    fn test_bad_birth_date() {
        let err = evaluate("PID|1||1234||Doe^Jane||01/02/1970").unwrap_err();
        assert_eq!(
            err,
            EvaluationError::InvalidValue {
                segment: "PID".into(),
                field: 7,
                value: "01/02/1970".into()
            }
        );
    }
}
