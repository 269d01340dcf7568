//! MessageHeader from MSH (and EVN).

use serde_json::json;
use tracing::debug;

use super::{coding_json, pruned};
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::model::{ModelInput, ResourceModel};
use crate::types::EvaluationResult;

/// Maps the `MSH` segment to a MessageHeader.
///
/// The event coding comes from the header lookup for the model's category
/// and the MSH-9.2 trigger. The reason is EVN-4 decoded through table 0062
/// when present, otherwise the reason the lookup pairs with the trigger.
/// A trigger the lookup does not know leaves both unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageHeaderModel;

impl ResourceModel for MessageHeaderModel {
    fn name(&self) -> &str {
        "MessageHeader"
    }

    fn resource_type(&self) -> &str {
        "MessageHeader"
    }

    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>> {
        let msh = input.segment;
        let mut header = ctx.create("MessageHeader");

        let trigger = msh.component(9, 2);
        let mapping = trigger.and_then(|t| ctx.header_mapping(t)).cloned();
        if mapping.is_none() {
            debug!(
                category = %ctx.category(),
                trigger = trigger.unwrap_or(""),
                "No header mapping for trigger"
            );
        }

        if let Some(mapping) = &mapping {
            header.set("eventCoding", coding_json(&mapping.event));
        }

        if msh.value(3).is_some() || msh.value(4).is_some() {
            header.set(
                "source",
                pruned(json!({ "name": msh.value(3), "endpoint": msh.value(4) })),
            );
        }
        if msh.value(5).is_some() || msh.value(6).is_some() {
            header.set(
                "destination",
                json!([pruned(json!({ "name": msh.value(5), "endpoint": msh.value(6) }))]),
            );
        }

        let reason = match mapping {
            Some(mapping) => input
                .additional_segment("EVN")
                .and_then(|evn| evn.value(4))
                .and_then(|code| ctx.event_reason(code))
                .cloned()
                .or(mapping.reason),
            None => None,
        };
        header.set_opt(
            "reason",
            reason.map(|c| json!({ "coding": [coding_json(&c)] })),
        );

        Ok(vec![header])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;
    use hl7_types::well_known::{MESSAGE_REASONS_ENCOUNTER, V2_0003, V2_0062};
    use hl7_types::MessageCategory;
    use serde_json::Value;

    fn header(category: MessageCategory, msh: &str, evn: Option<&str>) -> ResourceInstance {
        let raw = format!("{}\r{}", msh, evn.unwrap_or("EVN||20240101"));
        let segments = crate::parser::Hl7Parser::new()
            .tokenize(&raw)
            .unwrap()
            .segments;
        let evn = evn.map(|_| &segments[1]);
        test_support::evaluate(
            &MessageHeaderModel,
            category,
            &segments[0],
            evn.into_iter().collect(),
            &[],
        )
        .unwrap()
        .remove(0)
    }

    fn code(value: Option<&Value>) -> Option<&str> {
        value.and_then(|v| v["coding"][0]["code"].as_str())
    }

    #[test]
    fn test_admit_event_and_reason() {
        let h = header(
            MessageCategory::Adt,
            "MSH|^~\\&|SendApp|SendFac|RecApp|RecFac|20240101||ADT^A01|1|P|2.5",
            None,
        );
        assert_eq!(h.get("eventCoding").unwrap()["code"], "A01");
        assert_eq!(h.get("eventCoding").unwrap()["system"], V2_0003);
        assert_eq!(code(h.get("reason")), Some("admit"));
        assert_eq!(h.get("reason").unwrap()["coding"][0]["system"], MESSAGE_REASONS_ENCOUNTER);
        assert_eq!(h.get("source"), Some(&json!({"name": "SendApp", "endpoint": "SendFac"})));
        assert_eq!(
            h.get("destination"),
            Some(&json!([{"name": "RecApp", "endpoint": "RecFac"}]))
        );
    }

    #[test]
    fn test_result_event_and_reason() {
        let h = header(
            MessageCategory::Oru,
            "MSH|^~\\&|Lab|Hosp|||20240101||ORU^R01|1|P|2.5",
            None,
        );
        assert_eq!(h.get("eventCoding").unwrap()["code"], "R01");
        assert_eq!(code(h.get("reason")), Some("01"));
        assert!(h.get("destination").is_none());
    }

    #[test]
    fn test_event_reason_overrides_table() {
        let h = header(
            MessageCategory::Adt,
            "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.5",
            Some("EVN|A01|20240101||02"),
        );
        assert_eq!(code(h.get("reason")), Some("02"));
        assert_eq!(h.get("reason").unwrap()["coding"][0]["system"], V2_0062);
    }

    #[test]
    fn test_unknown_trigger_leaves_codings_unset() {
        let h = header(
            MessageCategory::Adt,
            "MSH|^~\\&|A|B|C|D|20240101||ADT^Z99|1|P|2.5",
            Some("EVN|Z99|20240101||01"),
        );
        assert!(h.get("eventCoding").is_none());
        assert!(h.get("reason").is_none());
        assert!(h.get("source").is_some());
    }

    #[test]
    fn test_source_omitted_without_sender() {
        let h = header(MessageCategory::Adt, "MSH|^~\\&|||C|D|20240101||ADT^A01|1|P|2.5", None);
        assert!(h.get("source").is_none());
        assert_eq!(h.get("destination"), Some(&json!([{"name": "C", "endpoint": "D"}])));
    }
}
