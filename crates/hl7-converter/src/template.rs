//! Resource templates.
//!
//! A [`ResourceTemplate`] binds a resource model to a location in the message
//! structure, together with its multiplicity (`repeats`), whether later
//! templates may reference what it produces (`is_referenced`), extra segments
//! to hand to the model, and an optional scoping group.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hl7_types::{GroupInstance, Segment, StructureNode};

use crate::model::{ModelInput, ResourceModel};
use crate::structure::MessageStructure;
use crate::types::{TemplateConfigError, TemplateConfigResult};

/// Where a template's occurrences live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentPath {
    /// A segment or group that is a direct child of the scope.
    TopLevel(String),
    /// A segment directly inside each instance of a group that is a direct
    /// child of the scope.
    Nested {
        /// Intermediate group name.
        group: String,
        /// Segment name inside the group.
        segment: String,
    },
}

impl SegmentPath {
    /// Returns the name occurrences are matched on.
    pub fn target(&self) -> &str {
        match self {
            Self::TopLevel(name) => name,
            Self::Nested { segment, .. } => segment,
        }
    }

    /// Returns the intermediate group, if any.
    pub fn nested_group(&self) -> Option<&str> {
        match self {
            Self::TopLevel(_) => None,
            Self::Nested { group, .. } => Some(group),
        }
    }

    fn names(&self, name: &str) -> bool {
        match self {
            Self::TopLevel(n) => n == name,
            Self::Nested { group, segment } => group == name || segment == name,
        }
    }
}

impl FromStr for SegmentPath {
    type Err = TemplateConfigError;

    /// Parses `PID`, `.PID` or `.GROUP.SEGMENT` (the leading dot is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TemplateConfigError::InvalidSegmentPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(invalid("path is empty"));
        }

        let parts: Vec<&str> = body.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty path component"));
        }
        if parts.iter().any(|p| p.chars().any(char::is_whitespace)) {
            return Err(invalid("whitespace in path component"));
        }

        match parts.as_slice() {
            [name] => Ok(Self::TopLevel(name.to_string())),
            [group, segment] => Ok(Self::Nested {
                group: group.to_string(),
                segment: segment.to_string(),
            }),
            _ => Err(invalid("at most two components are supported")),
        }
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopLevel(name) => write!(f, ".{}", name),
            Self::Nested { group, segment } => write!(f, ".{}.{}", group, segment),
        }
    }
}

/// Binds a resource model to a structural location.
#[derive(Clone)]
pub struct ResourceTemplate {
    resource_name: String,
    model: Arc<dyn ResourceModel>,
    path: SegmentPath,
    is_referenced: bool,
    repeats: bool,
    additional_segments: Vec<String>,
    group: Option<String>,
}

impl fmt::Debug for ResourceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTemplate")
            .field("resource_name", &self.resource_name)
            .field("model", &self.model.name())
            .field("path", &self.path)
            .field("is_referenced", &self.is_referenced)
            .field("repeats", &self.repeats)
            .field("additional_segments", &self.additional_segments)
            .field("group", &self.group)
            .finish()
    }
}

impl ResourceTemplate {
    /// Starts building a template.
    pub fn builder(resource_name: &str, model: Arc<dyn ResourceModel>) -> ResourceTemplateBuilder {
        ResourceTemplateBuilder {
            resource_name: resource_name.to_string(),
            model,
            segment: None,
            is_referenced: false,
            repeats: false,
            additional_segments: Vec::new(),
            group: None,
        }
    }

    /// Returns the resource name references are registered under.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Returns the resource model.
    pub fn model(&self) -> &Arc<dyn ResourceModel> {
        &self.model
    }

    /// Returns the segment path.
    pub fn path(&self) -> &SegmentPath {
        &self.path
    }

    /// Returns true if later templates may reference this template's output.
    pub fn is_referenced(&self) -> bool {
        self.is_referenced
    }

    /// Returns true if every occurrence produces an instance.
    pub fn repeats(&self) -> bool {
        self.repeats
    }

    /// Returns the additional segment names.
    pub fn additional_segments(&self) -> &[String] {
        &self.additional_segments
    }

    /// Returns the scoping group, if any.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Resolves the occurrences of this template inside one scope.
    ///
    /// `scope` is the message root for ungrouped templates, or one instance
    /// of the scoping group. With `repeats` off at most one occurrence is
    /// returned.
    pub fn resolve<'a>(&self, scope: &'a GroupInstance) -> Vec<ModelInput<'a>> {
        let mut matches: Vec<(&'a Segment, &'a GroupInstance)> = Vec::new();
        match &self.path {
            SegmentPath::TopLevel(name) => collect_matches(scope, name, &mut matches),
            SegmentPath::Nested { group, segment } => {
                for instance in scope.groups(group) {
                    collect_matches(instance, segment, &mut matches);
                }
            }
        }

        if !self.repeats {
            matches.truncate(1);
        }

        matches
            .into_iter()
            .enumerate()
            .map(|(index, (segment, container))| ModelInput {
                segment,
                additional: self.additional_for(container, scope),
                index,
            })
            .collect()
    }

    /// Additional segments from the nearest group instance, then the scope.
    fn additional_for<'a>(
        &self,
        container: &'a GroupInstance,
        scope: &'a GroupInstance,
    ) -> Vec<&'a Segment> {
        let mut out = Vec::new();
        for name in &self.additional_segments {
            let mut found: Vec<&'a Segment> = container.segments(name).collect();
            if found.is_empty() && !std::ptr::eq(container, scope) {
                found = scope.segments(name).collect();
            }
            out.extend(found);
        }
        out
    }

    /// Checks that the path (and group) can occur in a message structure.
    pub fn validate_against(&self, structure: &MessageStructure) -> TemplateConfigResult<()> {
        let reachable = structure.is_reachable(
            self.group.as_deref(),
            self.path.nested_group(),
            self.path.target(),
        );
        if reachable {
            Ok(())
        } else {
            let path = match &self.group {
                Some(group) => format!("{}{}", group, self.path),
                None => self.path.to_string(),
            };
            Err(TemplateConfigError::Unreachable {
                template: self.resource_name.clone(),
                path,
                structure: structure.id.clone(),
            })
        }
    }
}

/// Pushes every direct child of `scope` named `name`.
///
/// A matching group contributes its leading segment, with the group instance
/// as the container additional segments are taken from.
fn collect_matches<'a>(
    scope: &'a GroupInstance,
    name: &str,
    out: &mut Vec<(&'a Segment, &'a GroupInstance)>,
) {
    for child in &scope.children {
        match child {
            StructureNode::Segment(s) if s.name == name => out.push((s, scope)),
            StructureNode::Group(g) if g.name == name => {
                if let Some(leading) = g.leading_segment() {
                    out.push((leading, g));
                }
            }
            _ => {}
        }
    }
}

/// Builder for [`ResourceTemplate`].
pub struct ResourceTemplateBuilder {
    resource_name: String,
    model: Arc<dyn ResourceModel>,
    segment: Option<String>,
    is_referenced: bool,
    repeats: bool,
    additional_segments: Vec<String>,
    group: Option<String>,
}

impl ResourceTemplateBuilder {
    /// Sets the segment path (`PID`, `.PRB`, `.PROBLEM_OBSERVATION.OBX`).
    pub fn segment(mut self, path: &str) -> Self {
        self.segment = Some(path.to_string());
        self
    }

    /// Makes the produced instances referenceable by later templates.
    pub fn referenced(mut self, is_referenced: bool) -> Self {
        self.is_referenced = is_referenced;
        self
    }

    /// Produces one instance per occurrence instead of only the first.
    pub fn repeats(mut self, repeats: bool) -> Self {
        self.repeats = repeats;
        self
    }

    /// Adds segments handed to the model alongside each occurrence.
    pub fn additional_segments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_segments
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Scopes multiplicity and references to instances of a group.
    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    /// Validates the configuration and builds the template.
    pub fn build(self) -> TemplateConfigResult<ResourceTemplate> {
        let resource_name = self.resource_name.trim().to_string();
        if resource_name.is_empty() {
            return Err(TemplateConfigError::EmptyResourceName);
        }

        let raw = self
            .segment
            .unwrap_or_else(|| self.model.resource_type().to_string());
        let path: SegmentPath = raw.parse()?;

        let group = self
            .group
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        if let Some(group) = &group {
            if path.names(group) {
                return Err(TemplateConfigError::GroupPathConflict {
                    group: group.clone(),
                    path: raw,
                });
            }
        }

        Ok(ResourceTemplate {
            resource_name,
            model: self.model,
            path,
            is_referenced: self.is_referenced,
            repeats: self.repeats,
            additional_segments: self
                .additional_segments
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservationModel, PatientModel};
    use crate::structure::StructureRegistry;

    fn seg(name: &str, first: &str) -> StructureNode {
        StructureNode::Segment(Segment::new(name, vec![hl7_types::Field::verbatim(first)]))
    }

    fn group(name: &str, children: Vec<StructureNode>) -> StructureNode {
        StructureNode::Group(GroupInstance {
            name: name.into(),
            children,
        })
    }

    fn problem_instance() -> GroupInstance {
        GroupInstance {
            name: "PROBLEM".into(),
            children: vec![
                seg("PRB", "AD"),
                seg("NTE", "n"),
                group("PROBLEM_OBSERVATION", vec![seg("OBX", "1"), seg("NTE", "o1")]),
                group("PROBLEM_OBSERVATION", vec![seg("OBX", "2")]),
            ],
        }
    }

    fn obx_template() -> ResourceTemplateBuilder {
        ResourceTemplate::builder("Observation", Arc::new(ObservationModel))
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!("PID".parse::<SegmentPath>().unwrap(), SegmentPath::TopLevel("PID".into()));
        assert_eq!(".PRB".parse::<SegmentPath>().unwrap(), SegmentPath::TopLevel("PRB".into()));
        assert_eq!(
            ".PROBLEM_OBSERVATION.OBX".parse::<SegmentPath>().unwrap(),
            SegmentPath::Nested {
                group: "PROBLEM_OBSERVATION".into(),
                segment: "OBX".into()
            }
        );
        assert_eq!(
            ".PROBLEM_OBSERVATION.OBX".parse::<SegmentPath>().unwrap().to_string(),
            ".PROBLEM_OBSERVATION.OBX"
        );
    }

    #[test]
    fn test_parse_invalid_paths() {
        for bad in ["", ".", "..OBX", ".A.B.C", "PR B"] {
            assert!(
                matches!(
                    bad.parse::<SegmentPath>(),
                    Err(TemplateConfigError::InvalidSegmentPath { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_builder_defaults_and_errors() {
        let template = ResourceTemplate::builder("Patient", Arc::new(PatientModel))
            .build()
            .unwrap();
        assert_eq!(template.path(), &SegmentPath::TopLevel("Patient".into()));
        assert!(!template.repeats());
        assert!(!template.is_referenced());

        let err = ResourceTemplate::builder(" ", Arc::new(PatientModel)).build();
        assert!(matches!(err, Err(TemplateConfigError::EmptyResourceName)));

        let err = obx_template().segment(".PROBLEM.OBX").group("PROBLEM").build();
        assert!(matches!(err, Err(TemplateConfigError::GroupPathConflict { .. })));
    }

    #[test]
    fn test_nested_resolution_repeats() {
        let instance = problem_instance();
        let template = obx_template()
            .segment(".PROBLEM_OBSERVATION.OBX")
            .group("PROBLEM")
            .repeats(true)
            .build()
            .unwrap();

        let inputs = template.resolve(&instance);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].segment.value(1), Some("1"));
        assert_eq!(inputs[1].segment.value(1), Some("2"));
        assert_eq!(inputs[1].index, 1);
    }

    #[test]
    fn test_non_repeating_takes_first() {
        let instance = problem_instance();
        let template = obx_template()
            .segment(".PROBLEM_OBSERVATION.OBX")
            .group("PROBLEM")
            .build()
            .unwrap();

        let inputs = template.resolve(&instance);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].segment.value(1), Some("1"));
    }

    #[test]
    fn test_zero_occurrences() {
        let instance = problem_instance();
        let template = obx_template().segment("SPM").repeats(true).build().unwrap();
        assert!(template.resolve(&instance).is_empty());
    }

    #[test]
    fn test_bare_name_is_top_level_only() {
        let instance = problem_instance();
        let template = obx_template().segment("OBX").repeats(true).build().unwrap();
        assert!(template.resolve(&instance).is_empty());
    }

    #[test]
    fn test_additional_segments_nearest_container_first() {
        let instance = problem_instance();
        let template = obx_template()
            .segment(".PROBLEM_OBSERVATION.OBX")
            .group("PROBLEM")
            .repeats(true)
            .additional_segments(["NTE"])
            .build()
            .unwrap();

        let inputs = template.resolve(&instance);
        assert_eq!(inputs[0].additional.len(), 1);
        assert_eq!(inputs[0].additional[0].value(1), Some("o1"));
        // second observation has no NTE of its own; falls back to the problem's
        assert_eq!(inputs[1].additional[0].value(1), Some("n"));
    }

    #[test]
    fn test_group_name_match_uses_leading_segment() {
        let root = GroupInstance {
            name: String::new(),
            children: vec![seg("MSH", "|"), group("PROBLEM", problem_instance().children)],
        };
        let template = ResourceTemplate::builder("Problem", Arc::new(ObservationModel))
            .segment("PROBLEM")
            .additional_segments(["NTE"])
            .build()
            .unwrap();

        let inputs = template.resolve(&root);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].segment.name, "PRB");
        assert_eq!(inputs[0].additional_segment("NTE").and_then(|s| s.value(1)), Some("n"));
    }

    #[test]
    fn test_validate_against_structure() {
        let structures = StructureRegistry::default();
        let ppr = structures.get("PPR_PC1").unwrap();

        let ok = obx_template()
            .segment(".PROBLEM_OBSERVATION.OBX")
            .group("PROBLEM")
            .build()
            .unwrap();
        assert!(ok.validate_against(ppr).is_ok());

        let bad = obx_template().segment(".OBX").group("PROBLEM").build().unwrap();
        match bad.validate_against(ppr) {
            Err(TemplateConfigError::Unreachable { path, structure, .. }) => {
                assert_eq!(path, "PROBLEM.OBX");
                assert_eq!(structure, "PPR_PC1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
