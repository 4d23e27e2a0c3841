#![deny(unsafe_code)]

//! C-CDA XML ingestion.
//!
//! Parses a clinical document into [`ccda_model::Document`]: typed patient
//! demographics and encounters, plus raw element trees for every recognized
//! clinical section.

pub mod error;
mod extract;
mod tree;

use std::path::Path;

use ccda_model::Document;

pub use error::ParseError;
pub use tree::build_tree;

/// Parse a C-CDA document from a string.
pub fn parse_str(xml: &str) -> Result<Document, ParseError> {
    let root = tree::build_tree(xml)?;
    Ok(extract::extract_document(&root))
}

/// Parse a C-CDA document from a file.
pub fn parse_file(path: &Path) -> Result<Document, ParseError> {
    let xml = std::fs::read_to_string(path).map_err(|e| ParseError::io(path, e))?;
    parse_str(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinicalDocument xmlns="urn:hl7-org:v3">
  <recordTarget>
    <patientRole>
      <id root="2.16.840.1.113883.19.5" extension="PT-1234"/>
      <patient>
        <name><given>Ada</given><family>Lovelace</family></name>
        <administrativeGenderCode code="F" codeSystem="2.16.840.1.113883.5.1" displayName="Female"/>
        <birthTime value="19801215"/>
        <raceCode code="2106-3" codeSystem="2.16.840.1.113883.6.238" displayName="White"/>
        <ethnicGroupCode code="2186-5" codeSystem="2.16.840.1.113883.6.238" displayName="Not Hispanic or Latino"/>
      </patient>
    </patientRole>
  </recordTarget>
  <component>
    <structuredBody>
      <component>
        <section>
          <templateId root="2.16.840.1.113883.10.20.22.2.22.1"/>
          <title>Encounters</title>
          <entry>
            <encounter classCode="ENC" moodCode="EVN">
              <id root="1.2.3" extension="ENC-1"/>
              <code code="99213" codeSystem="2.16.840.1.113883.6.12" displayName="Office outpatient visit"/>
              <effectiveTime><low value="20230415"/><high value="20230415"/></effectiveTime>
            </encounter>
          </entry>
        </section>
      </component>
      <component>
        <section>
          <templateId root="2.16.840.1.113883.10.20.22.2.5.1"/>
          <title>Problems</title>
          <entry>
            <act classCode="ACT" moodCode="EVN">
              <entryRelationship typeCode="SUBJ">
                <observation classCode="OBS" moodCode="EVN">
                  <id root="4.5.6" extension="PROB-1"/>
                  <statusCode code="completed"/>
                  <effectiveTime><low value="20210301"/></effectiveTime>
                  <value xsi:type="CD" code="44054006" codeSystem="2.16.840.1.113883.6.96"
                         displayName="Type 2 diabetes mellitus" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/>
                </observation>
              </entryRelationship>
            </act>
          </entry>
        </section>
      </component>
    </structuredBody>
  </component>
</ClinicalDocument>"#;

    #[test]
    fn parses_patient_demographics() {
        let doc = parse_str(SAMPLE).unwrap();
        assert_eq!(doc.patient.id, "PT-1234");
        assert_eq!(doc.patient.name.given, "Ada");
        assert_eq!(doc.patient.name.family, "Lovelace");
        assert_eq!(doc.patient.gender.code, "F");
        assert_eq!(doc.patient.race.code, "2106-3");
        assert_eq!(doc.patient.ethnicity.code, "2186-5");
        assert_eq!(
            doc.patient.birth_time,
            NaiveDate::from_ymd_opt(1980, 12, 15).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
    }

    #[test]
    fn parses_encounters() {
        let doc = parse_str(SAMPLE).unwrap();
        assert_eq!(doc.encounters.len(), 1);
        let enc = &doc.encounters[0];
        assert_eq!(enc.id, "ENC-1");
        assert_eq!(enc.code.code, "99213");
        assert!(enc.effective_time.start().is_some());
    }

    #[test]
    fn recognizes_sections_with_entry_variant() {
        let doc = parse_str(SAMPLE).unwrap();
        let problems = doc.section("Problems").unwrap();
        assert!(problems.meta.entries_required);
        assert_eq!(problems.meta.template_oid, "2.16.840.1.113883.10.20.22.2.5.1");

        // The raw tree is preserved for rule-driven extraction.
        let values = problems.node.select("entry/act/entryRelationship/observation");
        assert_eq!(values.len(), 1);
        assert_eq!(
            values[0].first_value("value/@code").as_deref(),
            Some("44054006")
        );
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let doc = parse_str(
            r#"<ClinicalDocument><component><structuredBody><component>
                 <section><templateId root="9.9.9.9"/><title>Notes</title></section>
               </component></structuredBody></component></ClinicalDocument>"#,
        )
        .unwrap();
        assert!(doc.sections.is_empty());
    }
}
