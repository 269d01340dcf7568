//! HL7 v2 segment types.
//!
//! A segment is a named list of fields. Each field holds one or more
//! repetitions, each repetition a list of components, and each component a
//! list of subcomponents. All positions exposed by accessors are 1-based, the
//! way HL7 numbers them (`PID-5.2` is field 5, component 2).

/// A single component, split into its subcomponents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Component {
    /// Decoded subcomponent values.
    pub subcomponents: Vec<String>,
}

impl Component {
    /// Creates a component holding a single value.
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            subcomponents: vec![value.into()],
        }
    }

    /// Returns the first subcomponent, or `None` when it is empty.
    pub fn value(&self) -> Option<&str> {
        self.subcomponents
            .first()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns the subcomponent at a 1-based position, or `None` when empty.
    pub fn subcomponent(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.subcomponents.get(i))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns true if every subcomponent is empty.
    pub fn is_empty(&self) -> bool {
        self.subcomponents.iter().all(|s| s.is_empty())
    }
}

/// One repetition of a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Repetition {
    /// Components of this repetition.
    pub components: Vec<Component>,
}

impl Repetition {
    /// Returns the component value at a 1-based position, or `None` when empty.
    pub fn component(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.components.get(i))
            .and_then(Component::value)
    }

    /// Returns the first component value.
    pub fn value(&self) -> Option<&str> {
        self.component(1)
    }

    /// Returns true if every component is empty.
    pub fn is_empty(&self) -> bool {
        self.components.iter().all(Component::is_empty)
    }
}

/// A field, holding zero or more repetitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    /// Repetitions of this field in source order.
    pub repetitions: Vec<Repetition>,
}

impl Field {
    /// Creates a field holding one verbatim value.
    ///
    /// Used for `MSH-1` and `MSH-2`, which are never split.
    pub fn verbatim(value: impl Into<String>) -> Self {
        Self {
            repetitions: vec![Repetition {
                components: vec![Component::from_value(value)],
            }],
        }
    }

    /// Returns the first repetition.
    pub fn first(&self) -> Option<&Repetition> {
        self.repetitions.first()
    }

    /// Returns the first component of the first repetition.
    pub fn value(&self) -> Option<&str> {
        self.first().and_then(Repetition::value)
    }

    /// Returns a component of the first repetition.
    pub fn component(&self, position: usize) -> Option<&str> {
        self.first().and_then(|r| r.component(position))
    }

    /// Returns the non-empty repetitions of this field.
    pub fn non_empty(&self) -> impl Iterator<Item = &Repetition> {
        self.repetitions.iter().filter(|r| !r.is_empty())
    }

    /// Returns true if the field carries no data.
    pub fn is_empty(&self) -> bool {
        self.repetitions.iter().all(Repetition::is_empty)
    }
}

/// An HL7 v2 segment.
///
/// # Examples
///
/// ```
/// use hl7_types::{Component, Field, Repetition, Segment};
///
/// let name = Field {
///     repetitions: vec![Repetition {
///         components: vec![Component::from_value("Wood"), Component::from_value("Patrick")],
///     }],
/// };
/// let pid = Segment::new("PID", vec![Field::default(), Field::default(), Field::default(), Field::default(), name]);
///
/// assert_eq!(pid.component(5, 1), Some("Wood"));
/// assert_eq!(pid.component(5, 2), Some("Patrick"));
/// assert_eq!(pid.value(7), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// Three-character segment name (`MSH`, `PID`, `OBX`, ...).
    pub name: String,
    /// Fields in order; `fields[0]` is field 1.
    pub fields: Vec<Field>,
}

impl Segment {
    /// Creates a segment from its name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Returns the field at a 1-based position.
    pub fn field(&self, position: usize) -> Option<&Field> {
        position.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    /// Returns the first value of a field (first repetition, first component).
    pub fn value(&self, position: usize) -> Option<&str> {
        self.field(position).and_then(Field::value)
    }

    /// Returns a component of the first repetition of a field.
    pub fn component(&self, position: usize, component: usize) -> Option<&str> {
        self.field(position).and_then(|f| f.component(component))
    }

    /// Returns the non-empty repetitions of a field.
    pub fn repetitions(&self, position: usize) -> Vec<&Repetition> {
        self.field(position)
            .map(|f| f.non_empty().collect())
            .unwrap_or_default()
    }

    /// Returns the number of fields present.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}
