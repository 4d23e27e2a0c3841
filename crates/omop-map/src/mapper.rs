//! Document-level orchestration.
//!
//! Person and visit rows are mapped directly from the typed document model;
//! everything else flows through the rule engine. Rules are grouped by the
//! section name they declare, and each section is mapped with every rule that
//! names it, so one section can feed several tables.

use std::collections::{BTreeMap, BTreeSet};

use ccda_model::{Document, Encounter, Patient, Section};
use chrono::Datelike;
use omop_model::{
    ConditionOccurrence, DeviceExposure, DrugExposure, Measurement, Observation, OmopData, Person,
    ProcedureOccurrence, TableTarget, VisitOccurrence, ids,
};
use omop_report::ConversionReport;
use omop_vocab::{VocabIndex, demographics};
use tracing::debug;

use crate::engine::{RuleEngine, VisitMap};
use crate::error::RuleError;
use crate::loader::index_rules_by_section;
use crate::rules::MappingRule;

/// Source-system tag used when deriving person ids.
const SOURCE_SYSTEM: &str = "CCDA";

/// Maps parsed documents to OMOP rows using a loaded rule set.
pub struct DocumentMapper<'a> {
    engine: RuleEngine<'a>,
    rules_by_section: BTreeMap<String, Vec<MappingRule>>,
}

impl<'a> DocumentMapper<'a> {
    pub fn new(vocab: &'a VocabIndex, rules: Vec<MappingRule>) -> Self {
        Self {
            engine: RuleEngine::new(vocab),
            rules_by_section: index_rules_by_section(&rules),
        }
    }

    /// Map one document, folding per-section counters into `report`.
    pub fn map_document(
        &self,
        doc: &Document,
        report: &mut ConversionReport,
    ) -> Result<OmopData, RuleError> {
        let mut data = OmopData::new();

        let person_id = ids::generate_person_id(&doc.patient.id, SOURCE_SYSTEM);
        data.persons.push(self.map_person(&doc.patient, person_id));

        let mut visit_map = VisitMap::new();
        for enc in &doc.encounters {
            let visit = self.map_encounter(enc, person_id);
            visit_map.insert(enc.id.clone(), visit.visit_occurrence_id);
            data.visit_occurrences.push(visit);
        }
        debug!(person_id, encounters = doc.encounters.len(), "mapped document header");

        // Entries and vocab codes are counted once per section, under the
        // first rule that touches it, so multi-rule sections are not inflated.
        let mut counted_sections: BTreeSet<&str> = BTreeSet::new();

        for rules in self.rules_by_section.values() {
            for rule in rules {
                let Some(section) = locate_section(doc, rule) else {
                    continue;
                };
                let count_stats = counted_sections.insert(&section.name);
                self.map_section(rule, section, person_id, &visit_map, count_stats, &mut data, report)?;
            }
        }

        Ok(data)
    }

    #[allow(clippy::too_many_arguments)]
    fn map_section(
        &self,
        rule: &MappingRule,
        section: &Section,
        person_id: i64,
        visit_map: &VisitMap,
        count_stats: bool,
        data: &mut OmopData,
        report: &mut ConversionReport,
    ) -> Result<(), RuleError> {
        let entries_required = section.meta.entries_required;
        let entries = section.node.select(&rule.source.entry_path);
        debug!(
            rule = rule.name,
            section = section.name,
            entries = entries.len(),
            "applying rule"
        );

        for entry in entries {
            if count_stats {
                report.add_section_entry(&section.name);
                if let Some((vocabulary_id, code)) = self.engine.entry_source_code(rule, entry) {
                    let resolution = self.engine.vocab().resolution(&vocabulary_id, &code);
                    report.add_concept_mapping(&vocabulary_id, resolution.mapped_to_standard());
                }
            }

            let bags = self.engine.map_entry(rule, entry, person_id, visit_map, entries_required);
            if bags.is_empty() {
                if count_stats {
                    report.add_skipped(&section.name, "filtered or unmapped");
                }
                continue;
            }

            for bag in bags {
                let table = rule.target.table;
                match table {
                    TableTarget::ConditionOccurrence => {
                        data.condition_occurrences.push(ConditionOccurrence::from_record(&bag)?);
                    }
                    TableTarget::DrugExposure => {
                        data.drug_exposures.push(DrugExposure::from_record(&bag)?);
                    }
                    TableTarget::ProcedureOccurrence => {
                        data.procedure_occurrences.push(ProcedureOccurrence::from_record(&bag)?);
                    }
                    TableTarget::Measurement => {
                        data.measurements.push(Measurement::from_record(&bag)?);
                    }
                    TableTarget::Observation => {
                        data.observations.push(Observation::from_record(&bag)?);
                    }
                    TableTarget::DeviceExposure => {
                        data.device_exposures.push(DeviceExposure::from_record(&bag)?);
                    }
                    TableTarget::Person | TableTarget::VisitOccurrence => {
                        return Err(RuleError::UnsupportedTarget {
                            rule: rule.name.clone(),
                            table,
                        });
                    }
                }
                report.add_section_record(&section.name, table);
            }
        }

        Ok(())
    }

    fn map_person(&self, p: &Patient, person_id: i64) -> Person {
        Person {
            person_id,
            gender_concept_id: demographics::gender_concept(&p.gender.code),
            year_of_birth: p.birth_time.map_or(1900, |t| t.date().year()),
            month_of_birth: p.birth_time.map(|t| t.date().month()),
            day_of_birth: p.birth_time.map(|t| t.date().day()),
            birth_datetime: p.birth_time,
            race_concept_id: demographics::race_concept(&p.race.code),
            ethnicity_concept_id: demographics::ethnicity_concept(&p.ethnicity.code),
            person_source_value: p.id.clone(),
            gender_source_value: p.gender.display_name.clone(),
            race_source_value: p.race.display_name.clone(),
            ethnicity_source_value: p.ethnicity.display_name.clone(),
            mapping_rule: "RuleMapper:Person".to_string(),
            source_file: String::new(),
        }
    }

    fn map_encounter(&self, enc: &Encounter, person_id: i64) -> VisitOccurrence {
        let start = enc.effective_time.start();
        let end = enc.effective_time.end();
        VisitOccurrence {
            visit_occurrence_id: ids::generate_visit_id(person_id, &enc.id),
            person_id,
            visit_concept_id: demographics::visit_concept(&enc.code.code),
            visit_start_date: start,
            visit_start_datetime: start,
            visit_end_date: end,
            visit_end_datetime: end,
            visit_type_concept_id: demographics::CONCEPT_EHR,
            visit_source_value: enc.code.display_name.clone(),
            mapping_rule: "RuleMapper:Encounter".to_string(),
            source_file: String::new(),
        }
    }
}

/// Sections are located by template OID when the rule declares one, falling
/// back to the canonical section name.
fn locate_section<'d>(doc: &'d Document, rule: &MappingRule) -> Option<&'d Section> {
    if !rule.source.section_oid.is_empty() {
        if let Some(section) = doc.section_by_oid(
            &rule.source.section_oid,
            &rule.source.section_oid_entries_required,
        ) {
            return Some(section);
        }
    }
    doc.section(&rule.source.section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccda_model::{CodedValue, EffectiveTime, SectionMeta, XmlNode};
    use chrono::NaiveDate;
    use omop_model::OmopColumn;
    use omop_vocab::VocabIndex;

    use crate::rules::{FieldMapping, IdGenSpec, SourceSpec, TargetSpec};
    use crate::transforms::Transform;

    fn node(name: &str, attrs: &[(&str, &str)]) -> XmlNode {
        let mut n = XmlNode::new(name);
        n.attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        n
    }

    fn vocab() -> VocabIndex {
        let dir = std::env::temp_dir().join("mapper-vocab");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("CONCEPT.csv");
        std::fs::write(
            &path,
            "concept_id\tconcept_name\tdomain_id\tvocabulary_id\tconcept_class_id\tstandard_concept\tconcept_code\tvalid_start_date\tvalid_end_date\tinvalid_reason\n\
             44054006\tType 2 diabetes mellitus\tCondition\tSNOMED\tClinical Finding\tS\t44054006\t20020131\t20991231\t\n",
        )
        .unwrap();
        let mut vocab = VocabIndex::new();
        vocab.load_concepts(&path).unwrap();
        vocab
    }

    fn problems_rule() -> MappingRule {
        MappingRule {
            name: "problems_to_condition".to_string(),
            source: SourceSpec {
                section: "Problems".to_string(),
                section_oid: "2.16.840.1.113883.10.20.22.2.5".to_string(),
                section_oid_entries_required: "2.16.840.1.113883.10.20.22.2.5.1".to_string(),
                entry_path: "entry/act/entryRelationship/observation".to_string(),
                conditions: Vec::new(),
            },
            target: TargetSpec {
                table: TableTarget::ConditionOccurrence,
                type_concept_id: 32817,
            },
            fields: vec![FieldMapping {
                target: OmopColumn::ConditionConceptId,
                path: "value/@code".to_string(),
                fallback_path: String::new(),
                vocab_path: "value/@codeSystem".to_string(),
                transform: Transform::Vocab,
                optional: false,
            }],
            id_gen: IdGenSpec {
                base_fields: vec!["value.code".to_string()],
                generator: String::new(),
            },
        }
    }

    fn document_with_problem(code: &str) -> Document {
        let mut observation = node("observation", &[("moodCode", "EVN")]);
        observation
            .children
            .push(node("statusCode", &[("code", "completed")]));
        observation.children.push(node(
            "value",
            &[("code", code), ("codeSystem", "2.16.840.1.113883.6.96")],
        ));

        let mut entry_rel = XmlNode::new("entryRelationship");
        entry_rel.children.push(observation);
        let mut act = XmlNode::new("act");
        act.children.push(entry_rel);
        let mut entry = XmlNode::new("entry");
        entry.children.push(act);
        let mut section = XmlNode::new("section");
        section.children.push(entry);

        Document {
            patient: Patient {
                id: "PT-1".to_string(),
                birth_time: NaiveDate::from_ymd_opt(1980, 12, 15)
                    .unwrap()
                    .and_hms_opt(0, 0, 0),
                gender: CodedValue {
                    code: "F".to_string(),
                    display_name: "Female".to_string(),
                    ..CodedValue::default()
                },
                ..Patient::default()
            },
            encounters: vec![Encounter {
                id: "ENC-1".to_string(),
                code: CodedValue {
                    code: "AMB".to_string(),
                    display_name: "Ambulatory".to_string(),
                    ..CodedValue::default()
                },
                effective_time: EffectiveTime {
                    low: NaiveDate::from_ymd_opt(2023, 4, 15)
                        .unwrap()
                        .and_hms_opt(9, 30, 0),
                    ..EffectiveTime::default()
                },
            }],
            sections: vec![ccda_model::Section {
                name: "Problems".to_string(),
                meta: SectionMeta {
                    template_oid: "2.16.840.1.113883.10.20.22.2.5.1".to_string(),
                    entries_required: true,
                },
                node: section,
            }],
        }
    }

    #[test]
    fn maps_person_visit_and_condition() {
        let vocab = vocab();
        let mapper = DocumentMapper::new(&vocab, vec![problems_rule()]);
        let doc = document_with_problem("44054006");
        let mut report = ConversionReport::new();

        let data = mapper.map_document(&doc, &mut report).unwrap();

        assert_eq!(data.persons.len(), 1);
        let person = &data.persons[0];
        assert_eq!(person.gender_concept_id, demographics::CONCEPT_FEMALE);
        assert_eq!(person.year_of_birth, 1980);
        assert_eq!(person.person_source_value, "PT-1");
        assert_eq!(person.mapping_rule, "RuleMapper:Person");

        assert_eq!(data.visit_occurrences.len(), 1);
        let visit = &data.visit_occurrences[0];
        assert_eq!(visit.visit_concept_id, demographics::CONCEPT_OUTPATIENT);
        assert_eq!(visit.visit_type_concept_id, demographics::CONCEPT_EHR);
        assert_eq!(visit.visit_start_date, visit.visit_end_date);
        assert_eq!(visit.visit_source_value, "Ambulatory");

        assert_eq!(data.condition_occurrences.len(), 1);
        assert_eq!(data.condition_occurrences[0].condition_concept_id, 44054006);
        assert_eq!(data.condition_occurrences[0].person_id, person.person_id);
    }

    #[test]
    fn missing_birth_time_defaults_to_1900() {
        let vocab = vocab();
        let mapper = DocumentMapper::new(&vocab, Vec::new());
        let mut doc = document_with_problem("44054006");
        doc.patient.birth_time = None;
        let mut report = ConversionReport::new();

        let data = mapper.map_document(&doc, &mut report).unwrap();
        assert_eq!(data.persons[0].year_of_birth, 1900);
        assert_eq!(data.persons[0].month_of_birth, None);
    }

    #[test]
    fn report_counts_entries_records_and_skips() {
        let vocab = vocab();
        let mapper = DocumentMapper::new(&vocab, vec![problems_rule()]);
        let mut report = ConversionReport::new();

        let mapped = mapper
            .map_document(&document_with_problem("44054006"), &mut report)
            .unwrap();
        assert_eq!(mapped.condition_occurrences.len(), 1);

        // Unmapped code in an entries-required section is skipped.
        let skipped = mapper
            .map_document(&document_with_problem("99999999"), &mut report)
            .unwrap();
        assert!(skipped.condition_occurrences.is_empty());

        let json = {
            let mut buf = Vec::new();
            report.write_json(&mut buf).unwrap();
            String::from_utf8(buf).unwrap()
        };
        assert!(json.contains("Problems"));
        assert!(json.contains("filtered or unmapped"));
    }

    #[test]
    fn section_found_by_oid_despite_name_mismatch() {
        let vocab = vocab();
        let mut rule = problems_rule();
        rule.source.section = "SomethingElse".to_string();
        let mapper = DocumentMapper::new(&vocab, vec![rule]);
        let mut report = ConversionReport::new();

        let data = mapper
            .map_document(&document_with_problem("44054006"), &mut report)
            .unwrap();
        assert_eq!(data.condition_occurrences.len(), 1);
    }
}
