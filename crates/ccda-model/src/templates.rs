//! C-CDA section template identifiers.
//!
//! Each coded section has a base template OID and, for most sections, an
//! "entries required" variant (base OID with a `.1` suffix). Which variant a
//! document declares drives the entries-required flag carried in
//! [`crate::SectionMeta`].

pub const OID_ALLERGIES: &str = "2.16.840.1.113883.10.20.22.2.6";
pub const OID_ALLERGIES_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.6.1";
pub const OID_ENCOUNTERS: &str = "2.16.840.1.113883.10.20.22.2.22";
pub const OID_ENCOUNTERS_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.22.1";
pub const OID_IMMUNIZATIONS: &str = "2.16.840.1.113883.10.20.22.2.2";
pub const OID_IMMUNIZATIONS_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.2.1";
pub const OID_MEDICAL_EQUIPMENT: &str = "2.16.840.1.113883.10.20.22.2.23";
pub const OID_MEDICATIONS: &str = "2.16.840.1.113883.10.20.22.2.1";
pub const OID_MEDICATIONS_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.1.1";
pub const OID_PROBLEMS: &str = "2.16.840.1.113883.10.20.22.2.5";
pub const OID_PROBLEMS_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.5.1";
pub const OID_PROCEDURES: &str = "2.16.840.1.113883.10.20.22.2.7";
pub const OID_PROCEDURES_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.7.1";
pub const OID_RESULTS: &str = "2.16.840.1.113883.10.20.22.2.3";
pub const OID_RESULTS_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.3.1";
pub const OID_SOCIAL_HISTORY: &str = "2.16.840.1.113883.10.20.22.2.17";
pub const OID_VITAL_SIGNS: &str = "2.16.840.1.113883.10.20.22.2.4";
pub const OID_VITAL_SIGNS_ENTRIES_REQ: &str = "2.16.840.1.113883.10.20.22.2.4.1";

/// (base OID, entries-required OID, canonical section name).
///
/// Sections without an entries-required template variant repeat the base OID.
pub const SECTION_TEMPLATES: &[(&str, &str, &str)] = &[
    (OID_ALLERGIES, OID_ALLERGIES_ENTRIES_REQ, "Allergies"),
    (OID_ENCOUNTERS, OID_ENCOUNTERS_ENTRIES_REQ, "Encounters"),
    (OID_IMMUNIZATIONS, OID_IMMUNIZATIONS_ENTRIES_REQ, "Immunizations"),
    (OID_MEDICAL_EQUIPMENT, OID_MEDICAL_EQUIPMENT, "Devices"),
    (OID_MEDICATIONS, OID_MEDICATIONS_ENTRIES_REQ, "Medications"),
    (OID_PROBLEMS, OID_PROBLEMS_ENTRIES_REQ, "Problems"),
    (OID_PROCEDURES, OID_PROCEDURES_ENTRIES_REQ, "Procedures"),
    (OID_RESULTS, OID_RESULTS_ENTRIES_REQ, "LabResults"),
    (OID_SOCIAL_HISTORY, OID_SOCIAL_HISTORY, "Observations"),
    (OID_VITAL_SIGNS, OID_VITAL_SIGNS_ENTRIES_REQ, "VitalSigns"),
];

/// Canonical section name and entries-required flag for a template OID.
pub fn section_for_oid(oid: &str) -> Option<(&'static str, bool)> {
    for (base, required, name) in SECTION_TEMPLATES {
        if oid == *base {
            return Some((name, false));
        }
        if oid == *required && required != base {
            return Some((name, true));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_and_required_variants() {
        assert_eq!(section_for_oid(OID_PROBLEMS), Some(("Problems", false)));
        assert_eq!(
            section_for_oid(OID_PROBLEMS_ENTRIES_REQ),
            Some(("Problems", true))
        );
    }

    #[test]
    fn sections_without_required_variant() {
        assert_eq!(section_for_oid(OID_SOCIAL_HISTORY), Some(("Observations", false)));
        assert_eq!(section_for_oid(OID_MEDICAL_EQUIPMENT), Some(("Devices", false)));
    }

    #[test]
    fn unknown_oid() {
        assert_eq!(section_for_oid("1.2.3.4"), None);
    }
}
