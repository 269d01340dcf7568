//! Message structure definitions.
//!
//! A [`MessageStructure`] lists, in order, the segments and groups a message
//! structure (e.g. `PPR_PC1`) may contain. [`StructureRegistry::group`] uses it
//! to turn the flat segment list produced by the tokenizer into a tree of
//! group instances.
//!
//! Matching is greedy and in order: each segment is taken by the first
//! element at or after the current position that matches it and may still be
//! used. A segment no element of the current group accepts closes that group
//! instance; at the root it is kept as a top-level occurrence, so no segment
//! is ever dropped. Structures the registry does not know produce a flat tree.

use std::collections::HashMap;
use std::iter::Peekable;
use std::sync::Arc;
use std::vec;

use hl7_types::{GroupInstance, Segment, StructureNode};

/// One element of a structure definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureElement {
    /// A segment slot.
    Segment {
        /// Segment name.
        name: String,
        /// Whether the slot accepts more than one occurrence.
        repeating: bool,
    },
    /// A group slot.
    Group {
        /// Group name.
        name: String,
        /// Whether the group may occur more than once.
        repeating: bool,
        /// Elements of the group; the first one starts a new instance.
        children: Vec<StructureElement>,
    },
}

impl StructureElement {
    /// Creates a single segment slot.
    pub fn segment(name: &str) -> Self {
        Self::Segment {
            name: name.to_string(),
            repeating: false,
        }
    }

    /// Creates a repeating segment slot.
    pub fn segments(name: &str) -> Self {
        Self::Segment {
            name: name.to_string(),
            repeating: true,
        }
    }

    /// Creates a single group slot.
    pub fn group(name: &str, children: Vec<StructureElement>) -> Self {
        Self::Group {
            name: name.to_string(),
            repeating: false,
            children,
        }
    }

    /// Creates a repeating group slot.
    pub fn groups(name: &str, children: Vec<StructureElement>) -> Self {
        Self::Group {
            name: name.to_string(),
            repeating: true,
            children,
        }
    }

    /// Returns the segment or group name.
    pub fn name(&self) -> &str {
        match self {
            Self::Segment { name, .. } | Self::Group { name, .. } => name,
        }
    }

    /// Returns true if the element may occur more than once.
    pub fn is_repeating(&self) -> bool {
        match self {
            Self::Segment { repeating, .. } | Self::Group { repeating, .. } => *repeating,
        }
    }

    /// Returns the segment that starts this element.
    pub fn leading_segment(&self) -> Option<&str> {
        match self {
            Self::Segment { name, .. } => Some(name),
            Self::Group { children, .. } => children.first().and_then(|c| c.leading_segment()),
        }
    }

    fn children(&self) -> &[StructureElement] {
        match self {
            Self::Segment { .. } => &[],
            Self::Group { children, .. } => children,
        }
    }
}

/// The definition of one message structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStructure {
    /// Structure id, e.g. `PPR_PC1`.
    pub id: String,
    /// Top-level elements in order.
    pub elements: Vec<StructureElement>,
}

impl MessageStructure {
    /// Creates a structure definition.
    pub fn new(id: &str, elements: Vec<StructureElement>) -> Self {
        Self {
            id: id.to_string(),
            elements,
        }
    }

    /// Returns the elements of the named group, searching the whole definition.
    pub fn find_group(&self, name: &str) -> Option<&[StructureElement]> {
        fn search<'a>(elements: &'a [StructureElement], name: &str) -> Option<&'a [StructureElement]> {
            for element in elements {
                if let StructureElement::Group { name: n, children, .. } = element {
                    if n == name {
                        return Some(children);
                    }
                    if let Some(found) = search(children, name) {
                        return Some(found);
                    }
                }
            }
            None
        }
        search(&self.elements, name)
    }

    /// Returns true if `name` can occur at the given location.
    ///
    /// `scope` is the group a template is scoped to (root when `None`);
    /// `nested` is an intermediate group that must be a direct child of the
    /// scope. `name` must be a direct child of the innermost of the two.
    pub fn is_reachable(&self, scope: Option<&str>, nested: Option<&str>, name: &str) -> bool {
        let scope_elements = match scope {
            Some(group) => match self.find_group(group) {
                Some(children) => children,
                None => return false,
            },
            None => &self.elements,
        };

        let container = match nested {
            Some(group) => match scope_elements.iter().find(|e| {
                matches!(e, StructureElement::Group { .. }) && e.name() == group
            }) {
                Some(element) => element.children(),
                None => return false,
            },
            None => scope_elements,
        };

        container.iter().any(|e| e.name() == name)
    }
}

/// Registry of known message structures, keyed by structure id.
///
/// `StructureRegistry::default()` holds the built-in definitions.
#[derive(Debug, Clone)]
pub struct StructureRegistry {
    structures: HashMap<String, Arc<MessageStructure>>,
}

impl Default for StructureRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        let adt = Arc::new(builtin::adt_a01());
        for id in ["ADT_A01", "ADT_A04", "ADT_A08", "ADT_A13"] {
            registry.structures.insert(id.to_string(), Arc::clone(&adt));
        }
        let ppr = Arc::new(builtin::ppr_pc1());
        for id in ["PPR_PC1", "PPR_PC2", "PPR_PC3"] {
            registry.structures.insert(id.to_string(), Arc::clone(&ppr));
        }
        registry
    }
}

impl StructureRegistry {
    /// Creates a registry with no definitions; every message parses flat.
    pub fn empty() -> Self {
        Self {
            structures: HashMap::new(),
        }
    }

    /// Registers a structure under its id, replacing any previous definition.
    pub fn register(&mut self, structure: MessageStructure) {
        self.structures
            .insert(structure.id.clone(), Arc::new(structure));
    }

    /// Registers an existing definition under another structure id.
    pub fn alias(&mut self, alias: &str, id: &str) -> bool {
        match self.structures.get(id).cloned() {
            Some(structure) => {
                self.structures.insert(alias.to_string(), structure);
                true
            }
            None => false,
        }
    }

    /// Returns the definition for a structure id.
    pub fn get(&self, id: &str) -> Option<&MessageStructure> {
        self.structures.get(id).map(|s| s.as_ref())
    }

    /// Returns the number of registered structure ids.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Returns true if no structures are registered.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Groups a flat segment list into a tree according to `structure_id`.
    pub fn group(&self, structure_id: &str, segments: Vec<Segment>) -> GroupInstance {
        let mut root = GroupInstance::new("");
        match self.get(structure_id) {
            Some(structure) => {
                let mut iter = segments.into_iter().peekable();
                fill(&structure.elements, &mut iter, &mut root, true);
            }
            None => {
                root.children = segments.into_iter().map(StructureNode::Segment).collect();
            }
        }
        root
    }
}

fn fill(
    elements: &[StructureElement],
    segments: &mut Peekable<vec::IntoIter<Segment>>,
    target: &mut GroupInstance,
    is_root: bool,
) {
    let mut cursor = 0;
    let mut used = vec![false; elements.len()];

    while let Some(next) = segments.peek() {
        let found = (cursor..elements.len()).find(|&i| {
            (elements[i].is_repeating() || !used[i])
                && elements[i].leading_segment() == Some(next.name.as_str())
        });

        let Some(index) = found else {
            if !is_root {
                return;
            }
            if let Some(segment) = segments.next() {
                target.children.push(StructureNode::Segment(segment));
            }
            continue;
        };

        cursor = index;
        used[index] = true;
        match &elements[index] {
            StructureElement::Segment { .. } => {
                if let Some(segment) = segments.next() {
                    target.children.push(StructureNode::Segment(segment));
                }
            }
            StructureElement::Group { name, children, .. } => {
                let mut instance = GroupInstance::new(name.as_str());
                fill(children, segments, &mut instance, false);
                if instance.children.is_empty() {
                    // nothing consumed; keep the segment here so the loop advances
                    if let Some(segment) = segments.next() {
                        target.children.push(StructureNode::Segment(segment));
                    }
                    continue;
                }
                target.children.push(StructureNode::Group(instance));
            }
        }
    }
}

mod builtin {
    use super::StructureElement as E;
    use super::MessageStructure;

    /// `ADT_A01`, also used by A04, A08 and A13.
    pub fn adt_a01() -> MessageStructure {
        MessageStructure::new(
            "ADT_A01",
            vec![
                E::segment("MSH"),
                E::segments("SFT"),
                E::segment("EVN"),
                E::segment("PID"),
                E::segment("PD1"),
                E::segments("ROL"),
                E::segments("NK1"),
                E::segment("PV1"),
                E::segment("PV2"),
                E::segments("ROL"),
                E::segments("DB1"),
                E::segments("OBX"),
                E::segments("AL1"),
                E::segments("DG1"),
                E::segment("DRG"),
                E::groups("PROCEDURE", vec![E::segment("PR1"), E::segments("ROL")]),
                E::segments("GT1"),
                E::groups(
                    "INSURANCE",
                    vec![
                        E::segment("IN1"),
                        E::segment("IN2"),
                        E::segments("IN3"),
                        E::segments("ROL"),
                    ],
                ),
                E::segment("ACC"),
                E::segment("UB1"),
                E::segment("UB2"),
                E::segment("PDA"),
            ],
        )
    }

    /// `PPR_PC1`, also used by PC2 and PC3.
    pub fn ppr_pc1() -> MessageStructure {
        MessageStructure::new(
            "PPR_PC1",
            vec![
                E::segment("MSH"),
                E::segments("SFT"),
                E::segment("UAC"),
                E::segment("PID"),
                E::group("PATIENT_VISIT", vec![E::segment("PV1"), E::segment("PV2")]),
                E::groups(
                    "PROBLEM",
                    vec![
                        E::segment("PRB"),
                        E::segments("NTE"),
                        E::segments("VAR"),
                        E::groups("PROBLEM_ROLE", vec![E::segment("ROL"), E::segments("VAR")]),
                        E::groups("PATHWAY", vec![E::segment("PTH"), E::segments("VAR")]),
                        E::groups(
                            "GOAL",
                            vec![
                                E::segment("GOL"),
                                E::segments("NTE"),
                                E::segments("VAR"),
                                E::groups("GOAL_ROLE", vec![E::segment("ROL"), E::segments("VAR")]),
                                E::groups(
                                    "GOAL_OBSERVATION",
                                    vec![E::segment("OBX"), E::segments("NTE")],
                                ),
                            ],
                        ),
                        E::groups(
                            "ORDER",
                            vec![
                                E::segment("ORC"),
                                E::segment("OBR"),
                                E::segments("NTE"),
                                E::segments("VAR"),
                            ],
                        ),
                        E::groups(
                            "PROBLEM_OBSERVATION",
                            vec![E::segment("OBX"), E::segments("NTE")],
                        ),
                    ],
                ),
            ],
        )
    }
}
