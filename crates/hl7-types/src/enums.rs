//! Enumeration types for conversion.
//!
//! This module provides enum representations for the message categories a
//! message model targets and the bundle types an output bundle can carry.

use std::fmt;

/// Message category (the `MSH-9.1` message code family) a message model targets.
///
/// # Examples
///
/// ```
/// use hl7_types::MessageCategory;
///
/// let category = MessageCategory::from_code("ADT");
/// assert_eq!(category, MessageCategory::Adt);
/// assert_eq!(category.code(), "ADT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageCategory {
    /// Admit, discharge, transfer.
    Adt,
    /// Unsolicited observation result.
    Oru,
    /// General order.
    Orm,
    /// Patient problem.
    Ppr,
    /// Vaccination record update.
    Vxu,
    /// Medical document management.
    Mdm,
    /// Any other message code.
    Other(String),
}

impl MessageCategory {
    /// Creates a category from a message code; matching is case-insensitive.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "ADT" => Self::Adt,
            "ORU" => Self::Oru,
            "ORM" => Self::Orm,
            "PPR" => Self::Ppr,
            "VXU" => Self::Vxu,
            "MDM" => Self::Mdm,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the message code for this category.
    pub fn code(&self) -> &str {
        match self {
            Self::Adt => "ADT",
            Self::Oru => "ORU",
            Self::Orm => "ORM",
            Self::Ppr => "PPR",
            Self::Vxu => "VXU",
            Self::Mdm => "MDM",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Output bundle type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BundleType {
    /// A set of resources collected into a single package.
    #[default]
    Collection,
    /// A message; the first resource is the message header.
    Message,
    /// A transaction to be processed as a whole.
    Transaction,
    /// A set of independent actions.
    Batch,
}

impl BundleType {
    /// Returns the code used in serialized output.
    pub fn code(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Message => "message",
            Self::Transaction => "transaction",
            Self::Batch => "batch",
        }
    }

    /// Creates a bundle type from its code.
    ///
    /// Returns `None` if the code is not recognized.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "collection" => Some(Self::Collection),
            "message" => Some(Self::Message),
            "transaction" => Some(Self::Transaction),
            "batch" => Some(Self::Batch),
            _ => None,
        }
    }
}
