//! # hl7-converter
//!
//! Template-driven conversion of HL7 v2 messages into bundles of linked
//! FHIR-style resources.
//!
//! A [`MessageModel`] is an ordered list of [`ResourceTemplate`]s. Each
//! template names a [`ResourceModel`], the segment path its occurrences are
//! found at, and an optional scoping group. The [`ConversionEngine`] parses
//! the message, evaluates the templates in order and collects every
//! resource into one [`OutputBundle`]. Resources produced by a referenced
//! template can be linked from later templates in the same scope.
//!
//! ## Features
//!
//! - `parallel` (default): Converts batches of messages on rayon's thread pool.
//!
//! ## Usage
//!
//! ```rust
//! use hl7_converter::{ConversionEngine, EngineConfig, MessageModel, ModelRegistry};
//!
//! let config = r#"{
//!     "messageName": "ADT_A01",
//!     "resources": [
//!         { "resourceName": "Patient", "resourcePath": "resource/Patient",
//!           "segment": "PID", "isReferenced": true },
//!         { "resourceName": "Encounter", "resourcePath": "resource/Encounter",
//!           "segment": "PV1", "additionalSegments": ["PV2"] }
//!     ]
//! }"#;
//! let model = MessageModel::from_json(config, &ModelRegistry::with_builtin()).unwrap();
//!
//! let engine = ConversionEngine::with_config(EngineConfig::deterministic());
//! let raw = "MSH|^~\\&|App|Fac|||20240101||ADT^A01|1|P|2.5\r\
//!            PID|1||12345^^^MR||Doe^Jane||19800101|F\r\
//!            PV1|1|I|W^1^1";
//! let conversion = engine.convert_to_bundle(raw, &model).unwrap();
//!
//! assert_eq!(conversion.bundle.len(), 2);
//! let encounter = conversion.bundle.resources_of_type("Encounter").next().unwrap();
//! assert_eq!(encounter.get("subject").unwrap()["reference"], "Patient/1");
//! ```

#![warn(missing_docs)]

pub mod bundle;
pub mod context;
pub mod engine;
pub mod lookup;
pub mod message_model;
pub mod model;
pub mod models;
pub mod parser;
pub mod structure;
pub mod template;
pub mod types;

// Re-export hl7-types for convenience
pub use hl7_types;

pub use bundle::{BundleSerializer, JsonSerializer, OutputBundle, ResourceInstance};
pub use context::{ContextHandle, ConversionContext, ReferenceScope, ResourceRef};
pub use engine::{Conversion, ConversionEngine};
pub use lookup::{HeaderLookup, HeaderMapping};
pub use message_model::{MessageModel, MessageModelConfig, TemplateConfig};
pub use model::{ModelInput, ModelLoader, ModelRegistry, ResourceModel};
pub use parser::{Hl7Parser, MessageParser};
pub use structure::{MessageStructure, StructureElement, StructureRegistry};
pub use template::{ResourceTemplate, ResourceTemplateBuilder, SegmentPath};
pub use types::{
    ConversionError, ConversionResult, ConversionStats, EngineConfig, EvaluationError,
    EvaluationResult, IdStrategy, NotFoundError, ParseError, ParserConfig, TemplateConfigError,
};
