//! Resource instances, the output bundle, and bundle serialization.

use std::collections::HashSet;

use hl7_types::BundleType;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::types::ConversionResult;

/// One produced resource.
///
/// Attributes are kept as a JSON object; `resourceType` and `id` are
/// written first when serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstance {
    resource_type: String,
    id: String,
    body: Map<String, Value>,
}

impl ResourceInstance {
    /// Creates an empty resource of the given type.
    ///
    /// An empty id is filled in by the engine when the resource is collected.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            body: Map::new(),
        }
    }

    /// Returns the resource type, e.g. `Observation`.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the resource id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the resource id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Returns the relative reference to this resource, `Type/id`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.body.insert(key.to_string(), value.into());
    }

    /// Sets an attribute only when a value is present.
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    /// Sets an array attribute only when it is non-empty.
    pub fn set_list(&mut self, key: &str, values: Vec<Value>) {
        if !values.is_empty() {
            self.set(key, Value::Array(values));
        }
    }

    /// Appends a value to an array attribute, creating it when missing.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) {
        let entry = self
            .body
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value.into()),
            other => *other = Value::Array(vec![other.take(), value.into()]),
        }
    }

    /// Returns an attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Returns the attribute map, without `resourceType` and `id`.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Removes `{"reference": ...}` values pointing at any of `targets`.
    ///
    /// Arrays and objects left empty by the removal are removed as well.
    pub(crate) fn drop_references(&mut self, targets: &HashSet<String>) {
        let emptied: Vec<String> = self
            .body
            .iter_mut()
            .filter_map(|(key, value)| strip_references(value, targets).then(|| key.clone()))
            .collect();
        for key in &emptied {
            self.body.remove(key);
        }
    }

    /// Renders the resource as a JSON object.
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.body.len() + 2);
        object.insert("resourceType".into(), Value::String(self.resource_type.clone()));
        object.insert("id".into(), Value::String(self.id.clone()));
        for (k, v) in &self.body {
            object.insert(k.clone(), v.clone());
        }
        Value::Object(object)
    }
}

impl Serialize for ResourceInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.body.len() + 2))?;
        map.serialize_entry("resourceType", &self.resource_type)?;
        map.serialize_entry("id", &self.id)?;
        for (k, v) in &self.body {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Strips references to `targets` below `value`; true when `value` itself should go.
fn strip_references(value: &mut Value, targets: &HashSet<String>) -> bool {
    match value {
        Value::Object(map) => {
            let dangling = map
                .get("reference")
                .and_then(Value::as_str)
                .is_some_and(|r| targets.contains(r));
            if dangling {
                return true;
            }
            let before = map.len();
            let emptied: Vec<String> = map
                .iter_mut()
                .filter_map(|(key, child)| strip_references(child, targets).then(|| key.clone()))
                .collect();
            for key in &emptied {
                map.remove(key);
            }
            before > 0 && map.is_empty()
        }
        Value::Array(items) => {
            let before = items.len();
            items.retain_mut(|item| !strip_references(item, targets));
            before > 0 && items.is_empty()
        }
        _ => false,
    }
}

/// The ordered collection of resources produced by one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBundle {
    id: String,
    bundle_type: BundleType,
    entries: Vec<ResourceInstance>,
}

impl OutputBundle {
    /// Creates an empty bundle.
    pub fn new(id: impl Into<String>, bundle_type: BundleType) -> Self {
        Self {
            id: id.into(),
            bundle_type,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, resource: ResourceInstance) {
        self.entries.push(resource);
    }

    /// Returns the bundle id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the bundle type.
    pub fn bundle_type(&self) -> BundleType {
        self.bundle_type
    }

    /// Returns every resource in production order.
    pub fn entries(&self) -> &[ResourceInstance] {
        &self.entries
    }

    /// Returns the resources of one type in production order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ResourceInstance> + 'a {
        self.entries
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    /// Counts the resources of one type.
    pub fn count_of_type(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).count()
    }

    /// Finds a resource by its relative reference (`Type/id`).
    pub fn get(&self, reference: &str) -> Option<&ResourceInstance> {
        let (resource_type, id) = reference.split_once('/')?;
        self.entries
            .iter()
            .find(|r| r.resource_type == resource_type && r.id == id)
    }

    /// Removes references to `targets` from every resource.
    pub(crate) fn drop_references(&mut self, targets: &HashSet<String>) {
        for resource in &mut self.entries {
            resource.drop_references(targets);
        }
    }

    /// Returns the number of resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no resource was produced.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Full URL for an entry: `urn:uuid:` for UUID ids, the relative reference otherwise.
fn full_url(resource: &ResourceInstance) -> String {
    if uuid::Uuid::parse_str(resource.id()).is_ok() {
        format!("urn:uuid:{}", resource.id())
    } else {
        resource.reference()
    }
}

#[derive(serde::Serialize)]
struct EntryRef<'a> {
    #[serde(rename = "fullUrl")]
    full_url: String,
    resource: &'a ResourceInstance,
}

impl Serialize for OutputBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<EntryRef<'_>> = self
            .entries
            .iter()
            .map(|resource| EntryRef {
                full_url: full_url(resource),
                resource,
            })
            .collect();

        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("resourceType", "Bundle")?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", self.bundle_type.code())?;
        map.serialize_entry("entry", &entries)?;
        map.end()
    }
}

/// Renders an output bundle as document text.
pub trait BundleSerializer: Send + Sync {
    /// Serializes the bundle.
    fn serialize(&self, bundle: &OutputBundle) -> ConversionResult<String>;
}

/// JSON serializer backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    /// Pretty-print with indentation.
    pub pretty: bool,
}

impl BundleSerializer for JsonSerializer {
    fn serialize(&self, bundle: &OutputBundle) -> ConversionResult<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(bundle)?
        } else {
            serde_json::to_string(bundle)?
        };
        Ok(text)
    }
}
