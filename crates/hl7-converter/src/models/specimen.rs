//! Specimen from SPM.

use serde_json::{json, Map, Value};

use super::{codeable_concept, datetime, parse_datetime, reference};
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::model::{ModelInput, ResourceModel};
use crate::types::EvaluationResult;

/// Maps an `SPM` segment to a Specimen.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecimenModel;

impl ResourceModel for SpecimenModel {
    fn name(&self) -> &str {
        "Specimen"
    }

    fn resource_type(&self) -> &str {
        "Specimen"
    }

    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>> {
        let spm = input.segment;
        let mut specimen = ctx.create("Specimen");

        // SPM-2 is EIP: placer id ^ filler id
        let identifiers: Vec<Value> = [1, 2]
            .iter()
            .filter_map(|&c| spm.component(2, c))
            .map(|v| json!({ "value": v }))
            .collect();
        specimen.set_list("identifier", identifiers);

        specimen.set_opt(
            "type",
            spm.field(4).and_then(|f| f.first()).and_then(codeable_concept),
        );
        specimen.set_opt("subject", ctx.reference("Patient").map(reference));
        specimen.set_opt("receivedTime", datetime(spm, 18)?);

        let mut collection = Map::new();
        let start = spm
            .component(17, 1)
            .map(|raw| parse_datetime(spm, 17, raw))
            .transpose()?;
        let end = spm
            .component(17, 2)
            .map(|raw| parse_datetime(spm, 17, raw))
            .transpose()?;
        match (start, end) {
            (Some(start), Some(end)) => {
                collection.insert("collectedPeriod".into(), json!({ "start": start, "end": end }));
            }
            (Some(at), None) | (None, Some(at)) => {
                collection.insert("collectedDateTime".into(), Value::String(at));
            }
            (None, None) => {}
        }
        if let Some(site) = spm.field(8).and_then(|f| f.first()).and_then(codeable_concept) {
            collection.insert("bodySite".into(), site);
        }
        if !collection.is_empty() {
            specimen.set("collection", Value::Object(collection));
        }

        Ok(vec![specimen])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;
    use hl7_types::well_known::SNOMED_CT;
    use hl7_types::MessageCategory;

    fn evaluate(line: &str) -> ResourceInstance {
        let spm = test_support::segment(line);
        test_support::evaluate(&SpecimenModel, MessageCategory::Oru, &spm, vec![], &[("Patient", "p")])
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_specimen_fields() {
        let specimen = evaluate(
            "SPM|1|SpecimenID||BLOOD^Blood^^87612001^BLOOD^SCT^^|||||||||||||201110060535|201110060735",
        );
        assert_eq!(specimen.get("identifier"), Some(&json!([{"value": "SpecimenID"}])));

        let codings = specimen.get("type").unwrap()["coding"].as_array().unwrap();
        assert_eq!(codings.len(), 2);
        assert_eq!(codings[0]["code"], "BLOOD");
        assert_eq!(codings[1]["code"], "87612001");
        assert_eq!(codings[1]["system"], SNOMED_CT);

        assert_eq!(
            specimen.get("collection"),
            Some(&json!({"collectedDateTime": "2011-10-06T05:35:00"}))
        );
        assert_eq!(specimen.get("receivedTime"), Some(&json!("2011-10-06T07:35:00")));
        assert_eq!(specimen.get("subject"), Some(&json!({"reference": "Patient/p"})));
    }

    #[test]
    fn test_collection_period() {
        let specimen = evaluate("SPM|1|S1|||||||||||||||201110060535^201110060635");
        assert_eq!(
            specimen.get("collection").unwrap()["collectedPeriod"]["end"],
            "2011-10-06T06:35:00"
        );
        assert!(specimen.get("type").is_none());
    }
}
