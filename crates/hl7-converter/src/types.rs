//! Converter-wide error, configuration and statistics types.

use hl7_types::BundleType;
use thiserror::Error;

/// Errors that can occur while tokenizing a raw message.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The message contained no segments.
    #[error("message is empty")]
    Empty,

    /// The first segment was not `MSH`.
    #[error("message must start with an MSH segment, found '{found}'")]
    MissingHeader {
        /// The segment name (or prefix) that was found instead.
        found: String,
    },

    /// The field separator or `MSH-2` encoding characters are unusable.
    #[error("invalid encoding characters: '{value}'")]
    InvalidEncoding {
        /// The offending `MSH-1`/`MSH-2` text.
        value: String,
    },

    /// A segment name was not three upper-case alphanumerics.
    #[error("invalid segment name '{name}' at segment {index}")]
    InvalidSegmentName {
        /// 1-based index of the segment in the message.
        index: usize,
        /// The name that was read.
        name: String,
    },

    /// Low-level delimited record read failure.
    #[error("delimited record error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for tokenizer operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// An unknown resource model was requested from a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("resource model not found: {name}")]
pub struct NotFoundError {
    /// The name that was looked up.
    pub name: String,
}

/// Invalid template or message model configuration.
///
/// Raised while building templates and message models, never per message.
#[derive(Error, Debug)]
pub enum TemplateConfigError {
    /// The template has no resource name.
    #[error("template resource name must not be empty")]
    EmptyResourceName,

    /// The segment path could not be parsed.
    #[error("invalid segment path '{path}': {reason}")]
    InvalidSegmentPath {
        /// The path as configured.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The path names the scoping group itself instead of something inside it.
    #[error("segment path '{path}' must name a location inside group '{group}'")]
    GroupPathConflict {
        /// The scoping group.
        group: String,
        /// The path as configured.
        path: String,
    },

    /// The path or group is not reachable in the supplied message structure.
    #[error("template '{template}': '{path}' is not reachable in structure {structure}")]
    Unreachable {
        /// Resource name of the template.
        template: String,
        /// The path (prefixed with the group when scoped).
        path: String,
        /// The structure id it was checked against.
        structure: String,
    },

    /// The configured resource model does not exist.
    #[error(transparent)]
    Model(#[from] NotFoundError),

    /// The message model configuration document is malformed.
    #[error("invalid message model configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Result type for template configuration.
pub type TemplateConfigResult<T> = Result<T, TemplateConfigError>;

/// A resource model could not produce the data it requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// A field the model cannot do without is absent.
    #[error("missing required field {segment}-{field}")]
    MissingField {
        /// Segment name.
        segment: String,
        /// 1-based field position.
        field: usize,
    },

    /// A field value could not be interpreted.
    #[error("invalid value '{value}' in {segment}-{field}")]
    InvalidValue {
        /// Segment name.
        segment: String,
        /// 1-based field position.
        field: usize,
        /// The value that was read.
        value: String,
    },

    /// Any other evaluation failure.
    #[error("{0}")]
    Custom(String),
}

/// Result type for resource model evaluation.
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors surfaced by a conversion.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The raw text could not be tokenized.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A resource model failed for one occurrence; the whole conversion is aborted.
    #[error("evaluation failed for template '{template}' occurrence {occurrence} ({scope}): {source}")]
    Evaluation {
        /// Resource name of the failing template.
        template: String,
        /// 0-based index of the occurrence within its scope.
        occurrence: usize,
        /// Scope the occurrence was evaluated in, e.g. `PROBLEM[1]` or `message`.
        scope: String,
        /// The underlying failure.
        #[source]
        source: EvaluationError,
    },

    /// The bundle could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for conversions.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// How resource ids are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// Random version 4 UUIDs (process-unique).
    #[default]
    Uuid,
    /// A 1-based counter local to each conversion; reproducible output.
    Sequential,
}

/// Configuration for the tokenizer.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Reject segment names that are not three upper-case alphanumerics.
    pub strict_segment_names: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict_segment_names: true,
        }
    }
}

impl ParserConfig {
    /// Creates a config that accepts any non-empty segment name.
    pub fn lenient() -> Self {
        Self {
            strict_segment_names: false,
        }
    }
}

/// Configuration for the conversion engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Resource id generation.
    pub id_strategy: IdStrategy,
    /// Type written on the output bundle.
    pub bundle_type: BundleType,
    /// Pretty-print serialized output.
    pub pretty: bool,
    /// Tokenizer settings.
    pub parser: ParserConfig,
}

impl EngineConfig {
    /// Creates a config with sequential ids, for reproducible output.
    pub fn deterministic() -> Self {
        Self {
            id_strategy: IdStrategy::Sequential,
            ..Default::default()
        }
    }

    /// Creates a config that pretty-prints the serialized bundle.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Default::default()
        }
    }
}

/// Statistics from one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Templates evaluated (including those that matched nothing).
    pub templates_evaluated: usize,
    /// Occurrences handed to resource models.
    pub occurrences: usize,
    /// Resource instances produced, primary and secondary.
    pub resources: usize,
    /// Templates whose path matched no occurrence.
    pub skipped_templates: usize,
}

impl ConversionStats {
    /// Returns the average number of resources produced per occurrence.
    pub fn fan_out(&self) -> f64 {
        if self.occurrences == 0 {
            0.0
        } else {
            self.resources as f64 / self.occurrences as f64
        }
    }
}
