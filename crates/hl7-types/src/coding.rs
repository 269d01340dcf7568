//! Coded value type.

/// A code from a code system, with optional display text.
///
/// # Examples
///
/// ```
/// use hl7_types::{Coding, well_known};
///
/// let event = Coding::new(well_known::V2_0003, "A01", "ADT/ACK - Admit/visit notification");
/// assert_eq!(event.code, "A01");
/// assert_eq!(event.display.as_deref(), Some("ADT/ACK - Admit/visit notification"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coding {
    /// Code system URI.
    pub system: Option<String>,
    /// The code itself.
    pub code: String,
    /// Human-readable display text.
    pub display: Option<String>,
}

impl Coding {
    /// Creates a coding with system, code and display.
    pub fn new(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: Some(system.to_string()),
            code: code.to_string(),
            display: Some(display.to_string()),
        }
    }

    /// Creates a coding carrying only a code.
    pub fn code_only(code: &str) -> Self {
        Self {
            system: None,
            code: code.to_string(),
            display: None,
        }
    }

    /// Returns true if this coding belongs to the given system.
    pub fn is_in(&self, system: &str) -> bool {
        self.system.as_deref() == Some(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coding_constructors() {
        let c = Coding::new("http://example.org", "x", "X");
        assert!(c.is_in("http://example.org"));
        let bare = Coding::code_only("01");
        assert!(bare.system.is_none());
        assert!(!bare.is_in("http://example.org"));
    }
}
