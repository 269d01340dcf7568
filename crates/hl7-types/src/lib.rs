//! # hl7-types
//!
//! Type definitions for HL7 v2 message trees and clinical codings.
//!
//! This crate provides Rust type definitions for the structural tree a parsed
//! HL7 v2 message is turned into (groups, segments, fields, repetitions,
//! components and subcomponents), together with the small set of coded
//! values and enums the converter shares across crates.
//!
//! ## Features
//!
//! - `serde` (default): Enables serialization/deserialization support via serde.
//!   Disable this feature for zero-dependency usage.
//!
//! ## Usage
//!
//! ```rust
//! use hl7_types::{GroupInstance, MessageTree, MessageType, Segment, StructureNode};
//! use hl7_types::{EncodingCharacters, MessageCategory};
//!
//! let mut root = GroupInstance::new("");
//! root.children.push(StructureNode::Segment(Segment::new("MSH", vec![])));
//! root.children.push(StructureNode::Segment(Segment::new("PID", vec![])));
//!
//! let tree = MessageTree {
//!     message_type: MessageType::new("ADT", "A01", None),
//!     encoding: EncodingCharacters::default(),
//!     root,
//! };
//!
//! assert!(tree.header().is_some());
//! assert_eq!(tree.message_type.structure, "ADT_A01");
//! assert_eq!(MessageCategory::from_code(&tree.message_type.code), MessageCategory::Adt);
//! ```

#![warn(missing_docs)]

mod coding;
mod encoding;
mod enums;
mod segment;
mod tree;
pub mod well_known;

// Re-export all public types at crate root
pub use coding::Coding;
pub use encoding::EncodingCharacters;
pub use enums::{BundleType, MessageCategory};
pub use segment::{Component, Field, Repetition, Segment};
pub use tree::{GroupInstance, MessageTree, MessageType, StructureNode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_are_exported() {
        // Verify all types are accessible from crate root
        let _enc = EncodingCharacters::default();
        let _category = MessageCategory::Oru;
        let _bundle = BundleType::Collection;
        let _coding = Coding::code_only("A01");
        let _seg = Segment::new("PID", vec![Field::default()]);
        let _group = GroupInstance::new("PROBLEM");
    }

    #[test]
    fn test_well_known_accessible() {
        assert_eq!(well_known::V2_0062, "http://terminology.hl7.org/CodeSystem/v2-0062");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let seg = Segment::new(
            "OBX",
            vec![Field {
                repetitions: vec![Repetition {
                    components: vec![Component::from_value("1")],
                }],
            }],
        );

        let json = serde_json::to_string(&seg).unwrap();
        let parsed: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(seg, parsed);
    }
}
