//! C-CDA code-system identification.
//!
//! Source documents identify coding systems either by OID or by a free-text
//! name with several punctuation variants in the wild. Both resolve to the
//! canonical OMOP `vocabulary_id`. The table is closed: anything else
//! resolves to the empty string.

pub const OID_SNOMED_CT: &str = "2.16.840.1.113883.6.96";
pub const OID_RXNORM: &str = "2.16.840.1.113883.6.88";
pub const OID_LOINC: &str = "2.16.840.1.113883.6.1";
pub const OID_ICD10CM: &str = "2.16.840.1.113883.6.90";
pub const OID_ICD9CM: &str = "2.16.840.1.113883.6.103";
pub const OID_CPT: &str = "2.16.840.1.113883.6.12";
pub const OID_HCPCS: &str = "2.16.840.1.113883.6.14";
pub const OID_NCI: &str = "2.16.840.1.113883.3.26.1.1";
pub const OID_ACT_CODE: &str = "2.16.840.1.113883.5.4";
pub const OID_ROUTE_OF_ADMIN: &str = "2.16.840.1.113883.5.112";
pub const OID_CVX: &str = "2.16.840.1.113883.12.292";
pub const OID_ADMIN_GENDER: &str = "2.16.840.1.113883.5.1";
pub const OID_RACE_ETHNICITY: &str = "2.16.840.1.113883.6.238";

/// Map a code-system OID or free-text name to an OMOP vocabulary id.
///
/// Returns the empty string for unrecognized identifiers.
pub fn vocabulary_id_for(identifier: &str) -> &'static str {
    match identifier {
        // Standard OIDs
        "2.16.840.1.113883.6.96" => "SNOMED",
        "2.16.840.1.113883.6.88" => "RxNorm",
        "2.16.840.1.113883.6.1" => "LOINC",
        "2.16.840.1.113883.6.90" => "ICD10CM",
        "2.16.840.1.113883.6.103" => "ICD9CM",
        "2.16.840.1.113883.6.12" => "CPT4",
        // CDT OID sometimes used for HCPCS
        "2.16.840.1.113883.6.14" | "2.16.840.1.113883.6.13" => "HCPCS",
        // Alternate CVX OID
        "2.16.840.1.113883.12.292" | "2.16.840.1.113883.6.59" => "CVX",
        "2.16.840.1.113883.6.69" => "NDC",
        "2.16.840.1.113883.4.9" => "UNII",
        "2.16.840.1.113883.3.26.1.5" => "NDFRT",
        "2.16.840.1.113883.3.26.1.1" => "NCI",
        "2.16.840.1.113883.5.4" => "ActCode",
        "2.16.840.1.113883.5.112" => "RouteOfAdministration",
        // Direct vocabulary names and aliases
        "SNOMED" | "SNOMED CT" | "SNOMEDCT" => "SNOMED",
        "RxNorm" => "RxNorm",
        "LOINC" => "LOINC",
        "ICD10CM" | "ICD-10-CM" | "ICD10" => "ICD10CM",
        "ICD9CM" | "ICD-9-CM" | "ICD9" => "ICD9CM",
        "CPT4" | "CPT" | "CPT-4" => "CPT4",
        "HCPCS" => "HCPCS",
        "CVX" => "CVX",
        "NDC" => "NDC",
        "UNII" => "UNII",
        "NDFRT" | "NDF-RT" => "NDFRT",
        "NCI" | "NCIt" => "NCI",
        "ActCode" | "ASSERTION" => "ActCode",
        "RouteOfAdministration" => "RouteOfAdministration",
        _ => "",
    }
}

/// Human-readable name for a code-system OID, the OID itself if unknown.
pub fn code_system_name(oid: &str) -> &str {
    match oid {
        OID_SNOMED_CT => "SNOMED-CT",
        OID_RXNORM => "RxNorm",
        OID_LOINC => "LOINC",
        OID_ICD10CM => "ICD-10-CM",
        OID_ICD9CM => "ICD-9-CM",
        OID_CPT => "CPT",
        OID_CVX => "CVX",
        other => other,
    }
}
