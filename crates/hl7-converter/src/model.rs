//! Resource model interface and registry.
//!
//! A resource model turns one structural occurrence into resource instances.
//! Models are loaded once, shared behind `Arc`, and read concurrently by any
//! number of conversions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hl7_types::Segment;

use crate::bundle::ResourceInstance;
use crate::context::ContextHandle;
use crate::models;
use crate::types::{EvaluationError, EvaluationResult, NotFoundError};

/// Data handed to a resource model for one occurrence.
#[derive(Debug, Clone)]
pub struct ModelInput<'a> {
    /// The segment that drives this occurrence.
    pub segment: &'a Segment,
    /// Segments attached through `additionalSegments`, in configured order.
    pub additional: Vec<&'a Segment>,
    /// 0-based occurrence index within the scope.
    pub index: usize,
}

impl<'a> ModelInput<'a> {
    /// Returns the first additional segment with the given name.
    pub fn additional_segment(&self, name: &str) -> Option<&'a Segment> {
        self.additional.iter().copied().find(|s| s.name == name)
    }

    /// Returns a field value of the primary segment, or `MissingField`.
    pub fn required(&self, field: usize) -> EvaluationResult<&'a str> {
        self.segment
            .value(field)
            .ok_or_else(|| EvaluationError::MissingField {
                segment: self.segment.name.clone(),
                field,
            })
    }
}

/// Computes resource instances from one structural occurrence.
///
/// Instances whose type equals [`ResourceModel::resource_type`] are the
/// primary instances of the occurrence; anything else (e.g. a practitioner
/// derived from a performer field) is secondary and is never registered for
/// referencing.
pub trait ResourceModel: Send + Sync {
    /// Registry name of the model.
    fn name(&self) -> &str;

    /// Resource type of the primary instances.
    fn resource_type(&self) -> &str;

    /// Evaluates one occurrence.
    fn evaluate(
        &self,
        input: &ModelInput<'_>,
        ctx: &mut ContextHandle<'_>,
    ) -> EvaluationResult<Vec<ResourceInstance>>;
}

impl fmt::Debug for dyn ResourceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceModel")
            .field("name", &self.name())
            .field("resource_type", &self.resource_type())
            .finish()
    }
}

/// Resolves resource models by name.
pub trait ModelLoader {
    /// Loads a model; unknown names fail with [`NotFoundError`].
    fn load(&self, name: &str) -> Result<Arc<dyn ResourceModel>, NotFoundError>;
}

/// In-memory resource model registry.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn ResourceModel>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.models.keys().collect();
        names.sort();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in models.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(models::PatientModel));
        registry.register(Arc::new(models::EncounterModel));
        registry.register(Arc::new(models::ObservationModel));
        registry.register(Arc::new(models::ConditionModel));
        registry.register(Arc::new(models::MessageHeaderModel));
        registry.register(Arc::new(models::SpecimenModel));
        registry
    }

    /// Adds a model under its name, replacing any model of the same name.
    pub fn register(&mut self, model: Arc<dyn ResourceModel>) {
        self.models.insert(model.name().to_string(), model);
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelLoader for ModelRegistry {
    fn load(&self, name: &str) -> Result<Arc<dyn ResourceModel>, NotFoundError> {
        let key = name.trim();
        let key = key.strip_prefix("resource/").unwrap_or(key);
        let key = key.strip_suffix(".yml").unwrap_or(key);
        self.models
            .get(key)
            .cloned()
            .ok_or_else(|| NotFoundError {
                name: name.to_string(),
            })
    }
}
