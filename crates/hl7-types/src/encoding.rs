//! HL7 v2 encoding characters.
//!
//! This module provides the `EncodingCharacters` struct describing the
//! delimiters a message declares for itself in `MSH-1` and `MSH-2`.

/// The delimiters declared by an HL7 v2 message.
///
/// The field separator is the character immediately after `MSH`; the other
/// four are read, in order, from `MSH-2`.
///
/// # Examples
///
/// ```
/// use hl7_types::EncodingCharacters;
///
/// let enc = EncodingCharacters::default();
/// assert_eq!(enc.field, '|');
/// assert_eq!(enc.to_msh2(), "^~\\&");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodingCharacters {
    /// Field separator (`|` by convention).
    pub field: char,
    /// Component separator (`^`).
    pub component: char,
    /// Repetition separator (`~`).
    pub repetition: char,
    /// Escape character (`\`).
    pub escape: char,
    /// Subcomponent separator (`&`).
    pub subcomponent: char,
}

impl Default for EncodingCharacters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl EncodingCharacters {
    /// Builds the encoding characters from a field separator and the raw `MSH-2` value.
    ///
    /// Missing trailing characters fall back to their defaults. Returns `None`
    /// when any two delimiters collide or a delimiter is alphanumeric.
    pub fn from_msh(field: char, msh2: &str) -> Option<Self> {
        let defaults = Self::default();
        let mut chars = msh2.chars();
        let enc = Self {
            field,
            component: chars.next().unwrap_or(defaults.component),
            repetition: chars.next().unwrap_or(defaults.repetition),
            escape: chars.next().unwrap_or(defaults.escape),
            subcomponent: chars.next().unwrap_or(defaults.subcomponent),
        };

        let all = enc.as_array();
        for (i, c) in all.iter().enumerate() {
            if c.is_alphanumeric() || all[i + 1..].contains(c) {
                return None;
            }
        }
        Some(enc)
    }

    /// Renders the `MSH-2` value for these characters.
    pub fn to_msh2(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    fn as_array(&self) -> [char; 5] {
        [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ]
    }
}
