//! Condition from PRB.

use hl7_types::well_known::{CONDITION_CATEGORY, CONDITION_CLINICAL};
use serde_json::json;

use super::{codeable_concept, datetime, notes, reference};
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::model::{ModelInput, ResourceModel};
use crate::types::EvaluationResult;

/// Maps a `PRB` segment to a Condition.
///
/// `evidence` carries one entry per Observation registered in scope, in
/// registration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionModel;

impl ResourceModel for ConditionModel {
    fn name(&self) -> &str {
        "Condition"
    }

    fn resource_type(&self) -> &str {
        "Condition"
    }

    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>> {
        let prb = input.segment;
        input.required(3)?;

        let mut condition = ctx.create("Condition");
        condition.set_opt(
            "identifier",
            prb.value(4).map(|v| json!([{ "value": v }])),
        );

        let resolved = datetime(prb, 9)?;
        let clinical = if resolved.is_some() { "resolved" } else { "active" };
        condition.set(
            "clinicalStatus",
            json!({ "coding": [{ "system": CONDITION_CLINICAL, "code": clinical }] }),
        );
        condition.set(
            "category",
            json!([{ "coding": [{
                "system": CONDITION_CATEGORY,
                "code": "problem-list-item",
                "display": "Problem List Item",
            }] }]),
        );
        condition.set_opt(
            "code",
            prb.field(3).and_then(|f| f.first()).and_then(codeable_concept),
        );
        condition.set_opt("subject", ctx.reference("Patient").map(reference));

        let recorded = datetime(prb, 2)?;
        let onset = datetime(prb, 16)?.or_else(|| recorded.clone());
        condition.set_opt("onsetDateTime", onset);
        condition.set_opt("abatementDateTime", resolved);
        condition.set_opt("recordedDate", recorded);

        condition.set_list(
            "evidence",
            ctx.references("Observation")
                .into_iter()
                .map(|r| json!({ "detail": [reference(r)] }))
                .collect(),
        );
        condition.set_list("note", notes(input));

        Ok(vec![condition])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;
    use crate::types::EvaluationError;
    use hl7_types::MessageCategory;

    const PRB: &str = "PRB|AD|200603150625|aortic stenosis|53692||2||200603150625";

    fn evaluate(line: &str, registered: &[(&str, &str)]) -> EvaluationResult<Vec<ResourceInstance>> {
        let prb = test_support::segment(line);
        test_support::evaluate(&ConditionModel, MessageCategory::Ppr, &prb, vec![], registered)
    }

    #[test]
    fn test_condition_fields() {
        let out = evaluate(PRB, &[("Patient", "p")]).unwrap();
        let condition = &out[0];
        assert_eq!(condition.get("code").unwrap()["coding"][0]["code"], "aortic stenosis");
        assert_eq!(condition.get("identifier").unwrap()[0]["value"], "53692");
        assert_eq!(condition.get("onsetDateTime"), Some(&json!("2006-03-15T06:25:00")));
        assert_eq!(condition.get("clinicalStatus").unwrap()["coding"][0]["code"], "active");
        assert_eq!(condition.get("subject"), Some(&json!({"reference": "Patient/p"})));
        assert!(condition.get("evidence").is_none());
    }

    #[test]
    fn test_evidence_keeps_order_and_duplicates() {
        let out = evaluate(
            PRB,
            &[("Observation", "o1"), ("Observation", "o2"), ("Observation", "o1")],
        )
        .unwrap();
        let evidence = out[0].get("evidence").unwrap().as_array().unwrap();
        let refs: Vec<_> = evidence
            .iter()
            .map(|e| e["detail"][0]["reference"].as_str().unwrap())
            .collect();
        assert_eq!(refs, vec!["Observation/o1", "Observation/o2", "Observation/o1"]);
    }

    #[test]
    fn test_missing_problem_code() {
        let err = evaluate("PRB|AD|200603150625", &[]).unwrap_err();
        assert!(matches!(err, EvaluationError::MissingField { field: 3, .. }));
    }
}
