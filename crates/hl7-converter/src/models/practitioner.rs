//! Practitioner instances derived from XCN fields.

use hl7_types::Repetition;
use serde_json::json;

use super::human_name;
use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;

/// Creates a practitioner from one XCN repetition.
///
/// Every call creates a new instance, even for data seen before in the same
/// message. Returns `None` when the repetition carries neither an id nor a name.
pub(crate) fn practitioner(rep: &Repetition, ctx: &mut ContextHandle<'_>) -> Option<ResourceInstance> {
    let id_number = rep.component(1);
    let name = human_name(rep, 1);
    if id_number.is_none() && name.is_none() {
        return None;
    }

    let mut practitioner = ctx.create("Practitioner");
    practitioner.set_opt("identifier", id_number.map(|v| json!([{ "value": v }])));
    practitioner.set_opt("name", name.map(|n| json!([n])));
    Some(practitioner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ConversionContext, ReferenceScope};
    use crate::lookup::HeaderLookup;
    use crate::models::test_support;
    use crate::types::IdStrategy;
    use hl7_types::MessageCategory;

    #[test]
    fn test_practitioner_from_xcn() {
        let tree = test_support::empty_tree();
        let obx = test_support::segment("OBX|1|NM|||||||||F|||||2740^Tsadok^Janetta~^^^^^^~2913^Merrit^Darren^F");
        let mut context =
            ConversionContext::new(IdStrategy::Sequential, MessageCategory::Adt, HeaderLookup::shared());
        let scope = ReferenceScope::Message;
        let mut ctx = ContextHandle::new(&mut context, &scope, &tree);

        let made: Vec<_> = obx
            .repetitions(16)
            .into_iter()
            .filter_map(|rep| practitioner(rep, &mut ctx))
            .collect();

        assert_eq!(made.len(), 2);
        assert_eq!(made[0].id(), "1");
        assert_eq!(made[0].get("identifier"), Some(&json!([{"value": "2740"}])));
        assert_eq!(
            made[1].get("name"),
            Some(&json!([{"family": "Merrit", "given": ["Darren", "F"]}]))
        );
    }
}
