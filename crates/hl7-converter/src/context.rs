//! Per-conversion state.
//!
//! A [`ConversionContext`] is created at the start of each conversion and
//! dropped at the end. It owns the id generator and the reference registry,
//! and shares the read-only header lookup tables. Resource models see it
//! through a [`ContextHandle`] bound to the scope being evaluated.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use hl7_types::{Coding, MessageCategory, MessageTree, Segment};

use crate::bundle::ResourceInstance;
use crate::lookup::{HeaderLookup, HeaderMapping};
use crate::types::IdStrategy;

/// The scope references are registered and resolved in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceScope {
    /// Ungrouped templates; the implicit single instance.
    Message,
    /// One instance of a repeating group.
    Group {
        /// Group name.
        name: String,
        /// 0-based instance index in document order.
        index: usize,
    },
}

impl ReferenceScope {
    /// Creates a group scope.
    pub fn group(name: impl Into<String>, index: usize) -> Self {
        Self::Group {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for ReferenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => f.write_str("message"),
            Self::Group { name, index } => write!(f, "{}[{}]", name, index),
        }
    }
}

/// A registered resource: type and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Resource type.
    pub resource_type: String,
    /// Resource id.
    pub id: String,
}

impl ResourceRef {
    /// Creates a reference to a produced instance.
    pub fn of(resource: &ResourceInstance) -> Self {
        Self {
            resource_type: resource.resource_type().to_string(),
            id: resource.id().to_string(),
        }
    }

    /// Returns the relative reference, `Type/id`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

/// Ids registered per (resource name, scope).
#[derive(Debug, Clone, Default)]
pub struct ReferenceRegistry {
    entries: HashMap<String, HashMap<ReferenceScope, Vec<ResourceRef>>>,
}

impl ReferenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends ids under (name, scope), keeping registration order.
    pub fn register(
        &mut self,
        name: &str,
        scope: ReferenceScope,
        refs: impl IntoIterator<Item = ResourceRef>,
    ) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .entry(scope)
            .or_default()
            .extend(refs);
    }

    /// Returns the ids registered under `name` for `scope`.
    ///
    /// A group scope with nothing registered for `name` falls back to the
    /// message scope. Another instance of the same group is never consulted.
    pub fn resolve(&self, name: &str, scope: &ReferenceScope) -> &[ResourceRef] {
        let Some(by_scope) = self.entries.get(name) else {
            return &[];
        };
        if let Some(refs) = by_scope.get(scope) {
            return refs;
        }
        match scope {
            ReferenceScope::Group { .. } => by_scope
                .get(&ReferenceScope::Message)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            ReferenceScope::Message => &[],
        }
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generates resource ids for one conversion.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    strategy: IdStrategy,
    next: u64,
}

impl IdGenerator {
    /// Creates a generator; sequential ids start at 1.
    pub fn new(strategy: IdStrategy) -> Self {
        Self { strategy, next: 1 }
    }

    /// Returns a fresh id.
    pub fn next_id(&mut self) -> String {
        match self.strategy {
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            IdStrategy::Sequential => {
                let id = self.next;
                self.next += 1;
                id.to_string()
            }
        }
    }
}

/// An id bound to the resource of one type built from one segment.
#[derive(Debug, Clone)]
struct SegmentBinding {
    id: String,
    produced: bool,
}

/// Segment address and resource type.
type SegmentKey = (usize, String);

fn segment_key(segment: &Segment, resource_type: &str) -> SegmentKey {
    (segment as *const Segment as usize, resource_type.to_string())
}

/// Mutable state for one conversion.
#[derive(Debug)]
pub struct ConversionContext {
    ids: IdGenerator,
    registry: ReferenceRegistry,
    bindings: HashMap<SegmentKey, SegmentBinding>,
    lookup: Arc<HeaderLookup>,
    category: MessageCategory,
}

impl ConversionContext {
    /// Creates a fresh context.
    pub fn new(strategy: IdStrategy, category: MessageCategory, lookup: Arc<HeaderLookup>) -> Self {
        Self {
            ids: IdGenerator::new(strategy),
            registry: ReferenceRegistry::new(),
            bindings: HashMap::new(),
            lookup,
            category,
        }
    }

    /// Returns a fresh id.
    pub fn next_id(&mut self) -> String {
        self.ids.next_id()
    }

    /// Registers produced ids for later templates.
    pub fn register(&mut self, name: &str, scope: ReferenceScope, refs: Vec<ResourceRef>) {
        self.registry.register(name, scope, refs);
    }

    /// Returns the reference registry.
    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    /// Returns the category of the message model being converted.
    pub fn category(&self) -> &MessageCategory {
        &self.category
    }

    /// Returns the references handed out for segments whose resource was never produced.
    pub fn unresolved_references(&self) -> HashSet<String> {
        self.bindings
            .iter()
            .filter(|(_, binding)| !binding.produced)
            .map(|((_, resource_type), binding)| format!("{}/{}", resource_type, binding.id))
            .collect()
    }
}

/// The view of a [`ConversionContext`] a resource model evaluates against.
///
/// Bound to the scope of the occurrence, so reference lookups only see ids
/// registered for the same group instance (or for the message).
pub struct ContextHandle<'a> {
    context: &'a mut ConversionContext,
    scope: &'a ReferenceScope,
    tree: &'a MessageTree,
}

impl<'a> ContextHandle<'a> {
    /// Binds a handle to a scope of a parsed message.
    pub fn new(
        context: &'a mut ConversionContext,
        scope: &'a ReferenceScope,
        tree: &'a MessageTree,
    ) -> Self {
        Self {
            context,
            scope,
            tree,
        }
    }

    /// Creates an empty resource with a fresh id.
    pub fn create(&mut self, resource_type: &str) -> ResourceInstance {
        let id = self.context.next_id();
        ResourceInstance::new(resource_type, id)
    }

    /// Creates the resource of `resource_type` built from `segment`.
    ///
    /// Takes the id already bound by [`segment_reference`](Self::segment_reference)
    /// when there is one, so earlier references resolve to this instance.
    pub fn create_for(&mut self, resource_type: &str, segment: &Segment) -> ResourceInstance {
        let context = &mut *self.context;
        let key = segment_key(segment, resource_type);
        match context.bindings.get_mut(&key) {
            Some(binding) if !binding.produced => {
                binding.produced = true;
                ResourceInstance::new(resource_type, binding.id.clone())
            }
            _ => {
                let id = context.ids.next_id();
                context.bindings.insert(
                    key,
                    SegmentBinding {
                        id: id.clone(),
                        produced: true,
                    },
                );
                ResourceInstance::new(resource_type, id)
            }
        }
    }

    /// Returns the reference to the resource of `resource_type` built from `segment`.
    ///
    /// The resource may come from a later template; the id is bound on first
    /// use. References that are still unresolved when the conversion ends are
    /// removed from the bundle.
    pub fn segment_reference(&mut self, resource_type: &str, segment: &Segment) -> String {
        let context = &mut *self.context;
        let ids = &mut context.ids;
        let binding = context
            .bindings
            .entry(segment_key(segment, resource_type))
            .or_insert_with(|| SegmentBinding {
                id: ids.next_id(),
                produced: false,
            });
        format!("{}/{}", resource_type, binding.id)
    }

    /// Returns the scope being evaluated.
    pub fn scope(&self) -> &ReferenceScope {
        self.scope
    }

    /// Returns the first registered reference for a resource name.
    pub fn reference(&self, name: &str) -> Option<String> {
        self.context
            .registry
            .resolve(name, self.scope)
            .first()
            .map(ResourceRef::reference)
    }

    /// Returns every registered reference for a resource name, in order.
    pub fn references(&self, name: &str) -> Vec<String> {
        self.context
            .registry
            .resolve(name, self.scope)
            .iter()
            .map(ResourceRef::reference)
            .collect()
    }

    /// Returns the category of the message model.
    pub fn category(&self) -> &MessageCategory {
        &self.context.category
    }

    /// Returns the message header (`MSH`) segment.
    pub fn message_header(&self) -> Option<&'a Segment> {
        self.tree.header()
    }

    /// Returns the parsed message.
    pub fn message(&self) -> &'a MessageTree {
        self.tree
    }

    /// Looks up the event and reason codings for a trigger of this category.
    pub fn header_mapping(&self, trigger: &str) -> Option<&HeaderMapping> {
        self.context.lookup.get(&self.context.category, trigger)
    }

    /// Decodes an event reason code (table 0062).
    pub fn event_reason(&self, code: &str) -> Option<&Coding> {
        self.context.lookup.event_reason(code)
    }
}
