//! Well-known code system URIs.
//!
//! This module provides constants for the code systems that converted
//! resources refer to, mostly HL7 v2 tables published under
//! `terminology.hl7.org`.
//!
//! # Examples
//!
//! ```
//! use hl7_types::well_known;
//!
//! assert_eq!(well_known::V2_0003, "http://terminology.hl7.org/CodeSystem/v2-0003");
//! assert!(well_known::MESSAGE_REASONS_ENCOUNTER.ends_with("message-reasons-encounter"));
//! ```

// =============================================================================
// HL7 v2 Tables
// =============================================================================

/// HL7 table 0003 - Event type.
pub const V2_0003: &str = "http://terminology.hl7.org/CodeSystem/v2-0003";

/// HL7 table 0004 - Patient class.
pub const V2_0004: &str = "http://terminology.hl7.org/CodeSystem/v2-0004";

/// HL7 table 0062 - Event reason.
pub const V2_0062: &str = "http://terminology.hl7.org/CodeSystem/v2-0062";

/// HL7 table 0203 - Identifier type.
pub const V2_0203: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";

/// HL7 table 0487 - Specimen type.
pub const V2_0487: &str = "http://terminology.hl7.org/CodeSystem/v2-0487";

// =============================================================================
// FHIR Code Systems
// =============================================================================

/// Encounter related message reasons.
pub const MESSAGE_REASONS_ENCOUNTER: &str =
    "http://terminology.hl7.org/CodeSystem/message-reasons-encounter";

/// Observation category.
pub const OBSERVATION_CATEGORY: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

/// Condition clinical status.
pub const CONDITION_CLINICAL: &str = "http://terminology.hl7.org/CodeSystem/condition-clinical";

/// Condition category.
pub const CONDITION_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/condition-category";

/// Participation type.
pub const PARTICIPATION_TYPE: &str = "http://terminology.hl7.org/CodeSystem/v3-ParticipationType";

// =============================================================================
// External Terminologies
// =============================================================================

/// SNOMED CT.
pub const SNOMED_CT: &str = "http://snomed.info/sct";

/// LOINC.
pub const LOINC: &str = "http://loinc.org";

/// Unified Code for Units of Measure.
pub const UCUM: &str = "http://unitsofmeasure.org";

/// Maps an HL7 v2 coding-system identifier (as sent in a coded element) to a URI.
///
/// Returns `None` for local or unknown identifiers.
pub fn system_uri(hl7_system: &str) -> Option<&'static str> {
    match hl7_system.to_ascii_uppercase().as_str() {
        "SCT" | "SNM" | "SNOMED" | "SNOMEDCT" => Some(SNOMED_CT),
        "LN" | "LOINC" => Some(LOINC),
        "UCUM" => Some(UCUM),
        "HL70487" => Some(V2_0487),
        "HL70203" => Some(V2_0203),
        _ => None,
    }
}
