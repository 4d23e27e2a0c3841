//! Fixed concept tables for demographics and visit classification.
//!
//! These mappings are small and stable, so they live in code rather than in
//! the loaded vocabulary. Codes come from HL7 administrative gender, the CDC
//! race/ethnicity code set, and HL7 ActCode encounter classes.

pub const CONCEPT_MALE: i64 = 8507;
pub const CONCEPT_FEMALE: i64 = 8532;

pub const CONCEPT_WHITE: i64 = 8527;
pub const CONCEPT_BLACK_OR_AFRICAN_AMERICAN: i64 = 8516;
pub const CONCEPT_ASIAN: i64 = 8515;
pub const CONCEPT_AMERICAN_INDIAN_OR_ALASKA: i64 = 8657;
pub const CONCEPT_NATIVE_HAWAIIAN_OR_PACIFIC: i64 = 8557;
pub const CONCEPT_OTHER_RACE: i64 = 8522;

pub const CONCEPT_HISPANIC: i64 = 38003563;
pub const CONCEPT_NOT_HISPANIC: i64 = 38003564;

pub const CONCEPT_INPATIENT: i64 = 9201;
pub const CONCEPT_OUTPATIENT: i64 = 9202;
pub const CONCEPT_EMERGENCY: i64 = 9203;
pub const CONCEPT_OFFICE: i64 = 581477;

/// Type concept for records sourced from an EHR.
pub const CONCEPT_EHR: i64 = 32817;

/// Placeholder for codes that resolve to no concept.
pub const CONCEPT_NO_MAPPING: i64 = 0;

/// HL7 administrative gender code to gender concept.
pub fn gender_concept(code: &str) -> i64 {
    match code {
        "M" => CONCEPT_MALE,
        "F" => CONCEPT_FEMALE,
        _ => CONCEPT_NO_MAPPING,
    }
}

/// CDC race code to race concept.
pub fn race_concept(code: &str) -> i64 {
    match code {
        "2106-3" => CONCEPT_WHITE,
        "2054-5" => CONCEPT_BLACK_OR_AFRICAN_AMERICAN,
        "2028-9" => CONCEPT_ASIAN,
        "1002-5" => CONCEPT_AMERICAN_INDIAN_OR_ALASKA,
        "2076-8" => CONCEPT_NATIVE_HAWAIIAN_OR_PACIFIC,
        "2131-1" => CONCEPT_OTHER_RACE,
        _ => CONCEPT_NO_MAPPING,
    }
}

/// CDC ethnicity code to ethnicity concept.
pub fn ethnicity_concept(code: &str) -> i64 {
    match code {
        "2135-2" => CONCEPT_HISPANIC,
        "2186-5" => CONCEPT_NOT_HISPANIC,
        _ => CONCEPT_NO_MAPPING,
    }
}

/// Encounter class code to visit concept. Unknown classes default to
/// outpatient.
pub fn visit_concept(class_code: &str) -> i64 {
    match class_code {
        "IMP" => CONCEPT_INPATIENT,
        "AMB" => CONCEPT_OUTPATIENT,
        "EMER" => CONCEPT_EMERGENCY,
        "VR" => CONCEPT_OFFICE,
        _ => CONCEPT_OUTPATIENT,
    }
}
