//! Message models.
//!
//! A [`MessageModel`] is the ordered list of resource templates for one
//! message category. Template order is evaluation order: a template can only
//! reference resources produced by templates before it.

use hl7_types::MessageCategory;
use serde::Deserialize;
use tracing::debug;

use crate::bundle::OutputBundle;
use crate::engine::{Conversion, ConversionEngine};
use crate::model::ModelLoader;
use crate::structure::{MessageStructure, StructureRegistry};
use crate::template::ResourceTemplate;
use crate::types::{ConversionResult, TemplateConfigResult};

/// An ordered set of resource templates for one message category.
#[derive(Debug, Clone)]
pub struct MessageModel {
    name: String,
    category: MessageCategory,
    templates: Vec<ResourceTemplate>,
}

impl MessageModel {
    /// Creates a model; the category is taken from the name prefix (`ADT_A01` is ADT).
    pub fn new(name: &str, templates: Vec<ResourceTemplate>) -> Self {
        let code = name.split('_').next().unwrap_or(name);
        Self {
            name: name.to_string(),
            category: MessageCategory::from_code(code),
            templates,
        }
    }

    /// Builds a model from its configuration, loading models by name.
    ///
    /// When the message name is a known structure, every template is checked
    /// against it and an unreachable path fails the load.
    pub fn from_config(
        config: MessageModelConfig,
        loader: &dyn ModelLoader,
    ) -> TemplateConfigResult<Self> {
        let mut templates = Vec::with_capacity(config.resources.len());
        for resource in config.resources {
            let model = loader.load(&resource.resource_path)?;
            let mut builder = ResourceTemplate::builder(&resource.resource_name, model)
                .referenced(resource.is_referenced)
                .repeats(resource.repeats)
                .additional_segments(resource.additional_segments);
            if let Some(segment) = &resource.segment {
                builder = builder.segment(segment);
            }
            if let Some(group) = &resource.group {
                builder = builder.group(group);
            }
            templates.push(builder.build()?);
        }
        let model = Self::new(&config.message_name, templates);
        if let Some(structure) = StructureRegistry::default().get(&config.message_name) {
            model.validate_against(structure)?;
        }
        debug!(
            message = %config.message_name,
            templates = model.templates.len(),
            "Loaded message model"
        );
        Ok(model)
    }

    /// Parses a JSON configuration document and builds the model.
    pub fn from_json(json: &str, loader: &dyn ModelLoader) -> TemplateConfigResult<Self> {
        let config: MessageModelConfig = serde_json::from_str(json)?;
        Self::from_config(config, loader)
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the message category.
    pub fn category(&self) -> &MessageCategory {
        &self.category
    }

    /// Returns the templates in evaluation order.
    pub fn templates(&self) -> &[ResourceTemplate] {
        &self.templates
    }

    /// Checks every template against a message structure.
    pub fn validate_against(&self, structure: &MessageStructure) -> TemplateConfigResult<()> {
        self.templates
            .iter()
            .try_for_each(|t| t.validate_against(structure))
    }

    /// Converts raw message text to a serialized bundle.
    pub fn convert(&self, raw: &str, engine: &ConversionEngine) -> ConversionResult<String> {
        engine.convert(raw, self)
    }

    /// Converts raw message text to the structured bundle.
    pub fn convert_to_bundle(
        &self,
        raw: &str,
        engine: &ConversionEngine,
    ) -> ConversionResult<OutputBundle> {
        engine.convert_to_bundle(raw, self).map(|c: Conversion| c.bundle)
    }
}

/// Serialized form of a message model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageModelConfig {
    /// Model name, e.g. `ADT_A01`.
    pub message_name: String,
    /// Templates in evaluation order.
    pub resources: Vec<TemplateConfig>,
}

/// Serialized form of one resource template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    /// Resource name references are registered under.
    pub resource_name: String,
    /// Model to load, e.g. `resource/Patient`.
    pub resource_path: String,
    /// Segment path; defaults to the model's resource type.
    #[serde(default)]
    pub segment: Option<String>,
    /// Register produced instances for later templates.
    #[serde(default)]
    pub is_referenced: bool,
    /// Produce one instance per occurrence.
    #[serde(default)]
    pub repeats: bool,
    /// Extra segments handed to the model.
    #[serde(default)]
    pub additional_segments: Vec<String>,
    /// Scoping group.
    #[serde(default)]
    pub group: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelRegistry;
    use crate::template::SegmentPath;
    use crate::types::TemplateConfigError;

    const PPR_CONFIG: &str = r#"{
        "messageName": "PPR_PC1",
        "resources": [
            {"resourceName": "Patient", "resourcePath": "resource/Patient", "segment": "PID", "isReferenced": true},
            {"resourceName": "Observation", "resourcePath": "resource/Observation",
             "segment": ".PROBLEM_OBSERVATION.OBX", "group": "PROBLEM",
             "isReferenced": true, "repeats": true, "additionalSegments": ["NTE"]},
            {"resourceName": "Condition", "resourcePath": "resource/Condition",
             "segment": ".PRB", "group": "PROBLEM", "isReferenced": true, "repeats": true}
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let registry = ModelRegistry::with_builtin();
        let model = MessageModel::from_json(PPR_CONFIG, &registry).unwrap();

        assert_eq!(model.name(), "PPR_PC1");
        assert_eq!(model.category(), &MessageCategory::Ppr);
        assert_eq!(model.templates().len(), 3);

        let obs = &model.templates()[1];
        assert_eq!(obs.group(), Some("PROBLEM"));
        assert!(obs.repeats());
        assert_eq!(obs.additional_segments(), &["NTE".to_string()]);
        assert_eq!(
            obs.path(),
            &SegmentPath::Nested {
                group: "PROBLEM_OBSERVATION".into(),
                segment: "OBX".into()
            }
        );
        assert_eq!(model.templates()[2].model().resource_type(), "Condition");
    }

    #[test]
    fn test_validate_against_structure() {
        let registry = ModelRegistry::with_builtin();
        let model = MessageModel::from_json(PPR_CONFIG, &registry).unwrap();
        let structures = StructureRegistry::default();
        assert!(model.validate_against(structures.get("PPR_PC1").unwrap()).is_ok());
        assert!(model.validate_against(structures.get("ADT_A01").unwrap()).is_err());
    }

    #[test]
    fn test_from_json_rejects_unreachable_template() {
        let registry = ModelRegistry::with_builtin();
        let json = r#"{"messageName": "ADT_A01", "resources": [
            {"resourceName": "Patient", "resourcePath": "resource/Patient", "segment": "PID"},
            {"resourceName": "Condition", "resourcePath": "resource/Condition",
             "segment": ".PRB", "group": "PROBLEM"}
        ]}"#;
        let err = MessageModel::from_json(json, &registry).unwrap_err();
        assert!(matches!(err, TemplateConfigError::Unreachable { .. }));

        let unknown = json.replace("ADT_A01", "ZZZ_Z99");
        assert_eq!(MessageModel::from_json(&unknown, &registry).unwrap().templates().len(), 2);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::with_builtin();
        let json = r#"{"messageName": "ADT_A01", "resources": [
            {"resourceName": "Immunization", "resourcePath": "resource/Immunization"}
        ]}"#;
        let err = MessageModel::from_json(json, &registry).unwrap_err();
        assert!(matches!(err, TemplateConfigError::Model(_)));
    }

    #[test]
    fn test_malformed_config() {
        let registry = ModelRegistry::with_builtin();
        let err = MessageModel::from_json("{\"messageName\": 1}", &registry).unwrap_err();
        assert!(matches!(err, TemplateConfigError::InvalidConfig(_)));

        let json = r#"{"messageName": "ADT_A01", "resources": [
            {"resourceName": "Patient", "resourcePath": "Patient", "segment": "A.B.C"}
        ]}"#;
        let err = MessageModel::from_json(json, &registry).unwrap_err();
        assert!(matches!(err, TemplateConfigError::InvalidSegmentPath { .. }));
    }

    #[test]
    fn test_category_from_name() {
        assert_eq!(MessageModel::new("ORU_R01", vec![]).category(), &MessageCategory::Oru);
        assert_eq!(MessageModel::new("ADT", vec![]).category(), &MessageCategory::Adt);
    }
}
