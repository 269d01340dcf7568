//! Conversion engine.
//!
//! Drives a [`MessageModel`] over a parsed message: templates are evaluated
//! in declared order, each against every instance of its scoping group (or
//! once against the whole message), and every produced resource is collected
//! into one [`OutputBundle`] in production order.
//!
//! A template with `repeats` off yields at most one occurrence per
//! conversion, taken from the first scope it matches. References claimed for
//! a segment whose resource is never built are dropped from the bundle once
//! all templates have run.
//!
//! Batch conversion uses rayon when the `parallel` feature is enabled. Each
//! message gets its own [`ConversionContext`]; nothing mutable is shared.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, trace};

use hl7_types::{GroupInstance, MessageTree};

use crate::bundle::{BundleSerializer, JsonSerializer, OutputBundle};
use crate::context::{ContextHandle, ConversionContext, IdGenerator, ReferenceScope, ResourceRef};
use crate::lookup::HeaderLookup;
use crate::message_model::MessageModel;
use crate::parser::{Hl7Parser, MessageParser};
use crate::structure::StructureRegistry;
use crate::types::{ConversionError, ConversionResult, ConversionStats, EngineConfig};

/// A finished conversion: the bundle and what it took to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Produced resources.
    pub bundle: OutputBundle,
    /// Counters for this conversion.
    pub stats: ConversionStats,
}

/// Converts raw messages into resource bundles.
///
/// # Example
///
/// ```ignore
/// use hl7_converter::{ConversionEngine, EngineConfig, MessageModel, ModelRegistry};
///
/// let engine = ConversionEngine::with_config(EngineConfig::deterministic());
/// let model = MessageModel::from_json(config_json, &ModelRegistry::with_builtin())?;
/// let json = model.convert(raw_message, &engine)?;
/// ```
#[derive(Clone)]
pub struct ConversionEngine {
    config: EngineConfig,
    parser: Arc<dyn MessageParser>,
    lookup: Arc<HeaderLookup>,
    serializer: Arc<dyn BundleSerializer>,
}

impl fmt::Debug for ConversionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionEngine")
            .field("config", &self.config)
            .field("lookup_entries", &self.lookup.len())
            .finish()
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl ConversionEngine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the built-in parser, structures and lookup tables.
    pub fn with_config(config: EngineConfig) -> Self {
        let parser = Hl7Parser::with_config(config.parser.clone(), StructureRegistry::default());
        let serializer = JsonSerializer {
            pretty: config.pretty,
        };
        Self {
            config,
            parser: Arc::new(parser),
            lookup: HeaderLookup::shared(),
            serializer: Arc::new(serializer),
        }
    }

    /// Replaces the message parser.
    pub fn with_parser(mut self, parser: Arc<dyn MessageParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the header lookup tables.
    pub fn with_lookup(mut self, lookup: Arc<HeaderLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Replaces the bundle serializer.
    pub fn with_serializer(mut self, serializer: Arc<dyn BundleSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Converts raw message text and serializes the bundle.
    pub fn convert(&self, raw: &str, model: &MessageModel) -> ConversionResult<String> {
        let conversion = self.convert_to_bundle(raw, model)?;
        self.serializer.serialize(&conversion.bundle)
    }

    /// Converts raw message text into the structured bundle.
    pub fn convert_to_bundle(&self, raw: &str, model: &MessageModel) -> ConversionResult<Conversion> {
        let tree = self.parser.parse(raw)?;
        self.convert_tree(&tree, model)
    }

    /// Converts an already parsed message.
    pub fn convert_tree(&self, tree: &MessageTree, model: &MessageModel) -> ConversionResult<Conversion> {
        debug!(
            structure = %tree.message_type.structure,
            model = %model.name(),
            templates = model.templates().len(),
            "Starting conversion"
        );

        let mut context = ConversionContext::new(
            self.config.id_strategy,
            model.category().clone(),
            Arc::clone(&self.lookup),
        );
        let bundle_id = IdGenerator::new(self.config.id_strategy).next_id();
        let mut bundle = OutputBundle::new(bundle_id, self.config.bundle_type);
        let mut stats = ConversionStats::default();

        for template in model.templates() {
            stats.templates_evaluated += 1;

            let scopes: Vec<(&GroupInstance, ReferenceScope)> = match template.group() {
                Some(group) => tree
                    .group_instances(group)
                    .into_iter()
                    .enumerate()
                    .map(|(index, instance)| (instance, ReferenceScope::group(group, index)))
                    .collect(),
                None => vec![(&tree.root, ReferenceScope::Message)],
            };

            let mut matched = 0;
            for (instance, scope) in &scopes {
                let inputs = template.resolve(instance);
                matched += inputs.len();

                let mut registered = Vec::new();
                for input in &inputs {
                    trace!(
                        template = %template.resource_name(),
                        scope = %scope,
                        occurrence = input.index,
                        segment = %input.segment.name,
                        "Evaluating occurrence"
                    );

                    let produced = {
                        let mut handle = ContextHandle::new(&mut context, scope, tree);
                        template
                            .model()
                            .evaluate(input, &mut handle)
                            .map_err(|source| ConversionError::Evaluation {
                                template: template.resource_name().to_string(),
                                occurrence: input.index,
                                scope: scope.to_string(),
                                source,
                            })?
                    };
                    stats.occurrences += 1;

                    for mut resource in produced {
                        if resource.id().is_empty() {
                            resource.set_id(context.next_id());
                        }
                        if template.is_referenced()
                            && resource.resource_type() == template.model().resource_type()
                        {
                            registered.push(ResourceRef::of(&resource));
                        }
                        stats.resources += 1;
                        bundle.push(resource);
                    }
                }

                if !registered.is_empty() {
                    context.register(template.resource_name(), scope.clone(), registered);
                }
                if !template.repeats() && !inputs.is_empty() {
                    break;
                }
            }

            if matched == 0 {
                stats.skipped_templates += 1;
                debug!(
                    template = %template.resource_name(),
                    path = %template.path(),
                    "Template matched no occurrence"
                );
            }
        }

        let dangling = context.unresolved_references();
        if !dangling.is_empty() {
            debug!(count = dangling.len(), "Dropping references to resources never produced");
            bundle.drop_references(&dangling);
        }

        debug!(
            resources = stats.resources,
            occurrences = stats.occurrences,
            skipped = stats.skipped_templates,
            "Conversion complete"
        );

        Ok(Conversion { bundle, stats })
    }

    /// Converts many messages; results are returned in input order.
    ///
    /// Runs on rayon's thread pool with the `parallel` feature.
    #[cfg(feature = "parallel")]
    pub fn convert_batch(&self, raws: &[&str], model: &MessageModel) -> Vec<ConversionResult<String>> {
        raws.par_iter().map(|raw| self.convert(raw, model)).collect()
    }

    /// Converts many messages; results are returned in input order.
    #[cfg(not(feature = "parallel"))]
    pub fn convert_batch(&self, raws: &[&str], model: &MessageModel) -> Vec<ConversionResult<String>> {
        raws.iter().map(|raw| self.convert(raw, model)).collect()
    }
}
