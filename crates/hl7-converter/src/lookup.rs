//! Static header lookup tables.
//!
//! Maps a (message category, trigger event) pair to the event coding from
//! HL7 table 0003 and, where one exists, a reason coding. A second table
//! decodes event reason codes (table 0062) sent in `EVN-4`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use hl7_types::well_known::{MESSAGE_REASONS_ENCOUNTER, V2_0003, V2_0062};
use hl7_types::{Coding, MessageCategory};

/// Event and reason codings for one trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMapping {
    /// Event coding (table 0003).
    pub event: Coding,
    /// Reason coding, when the trigger implies one.
    pub reason: Option<Coding>,
}

/// Lookup tables consulted while building message headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderLookup {
    events: HashMap<(MessageCategory, String), HeaderMapping>,
    event_reasons: HashMap<String, Coding>,
}

/// (trigger, display) pairs from table 0003, per category.
const ADT_EVENTS: &[(&str, &str)] = &[
    ("A01", "ADT/ACK - Admit/visit notification"),
    ("A02", "ADT/ACK - Transfer a patient"),
    ("A03", "ADT/ACK - Discharge/end visit"),
    ("A04", "ADT/ACK - Register a patient"),
    ("A05", "ADT/ACK - Pre-admit a patient"),
    ("A06", "ADT/ACK - Change an outpatient to an inpatient"),
    ("A07", "ADT/ACK - Change an inpatient to an outpatient"),
    ("A08", "ADT/ACK - Update patient information"),
    ("A11", "ADT/ACK - Cancel admit/visit notification"),
    ("A12", "ADT/ACK - Cancel transfer"),
    ("A13", "ADT/ACK - Cancel discharge/end visit"),
    ("A21", "ADT/ACK - Patient goes on a leave of absence"),
    ("A22", "ADT/ACK - Patient returns from a leave of absence"),
    ("A28", "ADT/ACK - Add person information"),
    ("A31", "ADT/ACK - Update person information"),
    ("A34", "ADT/ACK - Merge patient information - patient ID only"),
    ("A40", "ADT/ACK - Merge patient - patient identifier list"),
];

const ORU_EVENTS: &[(&str, &str)] = &[
    ("R01", "ORU/ACK - Unsolicited transmission of an observation message"),
    ("R30", "ORU - Unsolicited Point-Of-Care Observation Message without Existing Order"),
    ("R32", "ORU - Unsolicited Pre-Ordered Point-Of-Care Observation"),
];

const ORM_EVENTS: &[(&str, &str)] = &[("O01", "ORM - Order message")];

const PPR_EVENTS: &[(&str, &str)] = &[
    ("PC1", "PPR - PC/ problem add"),
    ("PC2", "PPR - PC/ problem update"),
    ("PC3", "PPR - PC/ problem delete"),
];

const VXU_EVENTS: &[(&str, &str)] = &[("V04", "VXU - Unsolicited vaccination record update")];

/// (trigger, code, display) for encounter-related reasons.
const ENCOUNTER_REASONS: &[(&str, &str, &str)] = &[
    ("A01", "admit", "Admit"),
    ("A02", "moved", "Moved"),
    ("A03", "discharge", "Discharge"),
    ("A04", "admit", "Admit"),
    ("A08", "edit", "Edit"),
    ("A21", "absent", "Absent"),
    ("A22", "return", "Returned"),
];

/// Table 0062.
const EVENT_REASONS: &[(&str, &str)] = &[
    ("01", "Patient request"),
    ("02", "Physician/health practitioner order"),
    ("03", "Census management"),
    ("O", "Other"),
    ("U", "Unknown"),
];

impl HeaderLookup {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the lookup with the standard HL7 tables loaded.
    pub fn standard() -> Self {
        let mut lookup = Self::new();

        let families = [
            (MessageCategory::Adt, ADT_EVENTS),
            (MessageCategory::Oru, ORU_EVENTS),
            (MessageCategory::Orm, ORM_EVENTS),
            (MessageCategory::Ppr, PPR_EVENTS),
            (MessageCategory::Vxu, VXU_EVENTS),
        ];
        for (category, events) in families {
            for (trigger, display) in events {
                lookup.insert(
                    category.clone(),
                    trigger,
                    HeaderMapping {
                        event: Coding::new(V2_0003, trigger, display),
                        reason: None,
                    },
                );
            }
        }

        for (trigger, code, display) in ENCOUNTER_REASONS {
            lookup.set_reason(
                &MessageCategory::Adt,
                trigger,
                Coding::new(MESSAGE_REASONS_ENCOUNTER, code, display),
            );
        }

        for (code, display) in EVENT_REASONS {
            lookup
                .event_reasons
                .insert(code.to_string(), Coding::new(V2_0062, code, display));
        }

        if let Some(reason) = lookup.event_reason("01").cloned() {
            lookup.set_reason(&MessageCategory::Oru, "R01", reason);
        }

        lookup
    }

    /// Returns a process-wide shared instance of [`HeaderLookup::standard`].
    pub fn shared() -> Arc<Self> {
        static STANDARD: OnceLock<Arc<HeaderLookup>> = OnceLock::new();
        Arc::clone(STANDARD.get_or_init(|| Arc::new(HeaderLookup::standard())))
    }

    /// Adds or replaces the mapping for a trigger.
    pub fn insert(&mut self, category: MessageCategory, trigger: &str, mapping: HeaderMapping) {
        self.events.insert((category, trigger.to_string()), mapping);
    }

    fn set_reason(&mut self, category: &MessageCategory, trigger: &str, reason: Coding) {
        if let Some(mapping) = self.events.get_mut(&(category.clone(), trigger.to_string())) {
            mapping.reason = Some(reason);
        }
    }

    /// Looks up the codings for a trigger event.
    pub fn get(&self, category: &MessageCategory, trigger: &str) -> Option<&HeaderMapping> {
        self.events.get(&(category.clone(), trigger.to_ascii_uppercase()))
    }

    /// Decodes an event reason code (table 0062).
    pub fn event_reason(&self, code: &str) -> Option<&Coding> {
        self.event_reasons.get(code)
    }

    /// Returns the number of trigger mappings.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no trigger mapping is loaded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_mapping() {
        let lookup = HeaderLookup::standard();
        let mapping = lookup.get(&MessageCategory::Adt, "A01").unwrap();
        assert_eq!(mapping.event.code, "A01");
        assert!(mapping.event.is_in(V2_0003));
        let reason = mapping.reason.as_ref().unwrap();
        assert_eq!(reason.code, "admit");
        assert!(reason.is_in(MESSAGE_REASONS_ENCOUNTER));
    }

    #[test]
    fn test_result_mapping() {
        let lookup = HeaderLookup::standard();
        let mapping = lookup.get(&MessageCategory::Oru, "r01").unwrap();
        assert_eq!(mapping.event.code, "R01");
        let reason = mapping.reason.as_ref().unwrap();
        assert_eq!(reason.code, "01");
        assert_eq!(reason.display.as_deref(), Some("Patient request"));
    }

    #[test]
    fn test_unknown_keys_miss() {
        let lookup = HeaderLookup::standard();
        assert!(lookup.get(&MessageCategory::Adt, "Z99").is_none());
        assert!(lookup.get(&MessageCategory::Oru, "A01").is_none());
        assert!(lookup
            .get(&MessageCategory::Other("SIU".into()), "S12")
            .is_none());
        assert!(lookup.event_reason("99").is_none());
    }

    #[test]
    fn test_triggers_without_reason() {
        let lookup = HeaderLookup::standard();
        let mapping = lookup.get(&MessageCategory::Ppr, "PC1").unwrap();
        assert!(mapping.reason.is_none());
        assert_eq!(
            lookup.get(&MessageCategory::Adt, "A22").and_then(|m| m.reason.as_ref()).map(|c| c.code.as_str()),
            Some("return")
        );
    }

    #[test]
    fn test_shared_is_reused() {
        let a = HeaderLookup::shared();
        let b = HeaderLookup::shared();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_empty());
    }

    #[test]
    fn test_custom_entries() {
        let mut lookup = HeaderLookup::new();
        assert!(lookup.is_empty());
        lookup.insert(
            MessageCategory::Other("SIU".into()),
            "S12",
            HeaderMapping {
                event: Coding::code_only("S12"),
                reason: None,
            },
        );
        assert_eq!(lookup.len(), 1);
        assert!(lookup.get(&MessageCategory::Other("SIU".into()), "S12").is_some());
    }
}
