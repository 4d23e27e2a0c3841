//! Rule execution engine.
//!
//! Applies one rule to one entry node, producing zero, one, or many untyped
//! field bags. One entry can yield several records when its source code maps
//! to more than one standard concept; each record gets the deterministic seed
//! id plus its position in the fan-out.

use std::collections::BTreeMap;

use ccda_model::{XmlNode, parse_hl7_time, should_include_entry};
use chrono::NaiveDateTime;
use omop_model::{FieldBag, FieldValue, OmopColumn, ids};
use omop_vocab::{VocabIndex, vocabulary_id_for};
use tracing::trace;

use crate::rules::{Condition, ConditionKind, FieldMapping, MappingRule};
use crate::transforms::{Transform, format_source_value, midnight};

/// Lookup from source encounter id to visit_occurrence_id, built by the
/// orchestrator before any rule runs.
pub type VisitMap = BTreeMap<String, i64>;

/// Executes mapping rules against entry nodes.
pub struct RuleEngine<'a> {
    vocab: &'a VocabIndex,
}

impl<'a> RuleEngine<'a> {
    pub fn new(vocab: &'a VocabIndex) -> Self {
        Self { vocab }
    }

    pub fn vocab(&self) -> &VocabIndex {
        self.vocab
    }

    /// Map a list of entries with one rule.
    pub fn map_entries(
        &self,
        rule: &MappingRule,
        entries: &[&XmlNode],
        person_id: i64,
        visit_map: &VisitMap,
        entries_required: bool,
    ) -> Vec<FieldBag> {
        entries
            .iter()
            .flat_map(|entry| self.map_entry(rule, entry, person_id, visit_map, entries_required))
            .collect()
    }

    /// Map a single entry, returning one record per resolved concept.
    pub fn map_entry(
        &self,
        rule: &MappingRule,
        entry: &XmlNode,
        person_id: i64,
        _visit_map: &VisitMap,
        entries_required: bool,
    ) -> Vec<FieldBag> {
        if !should_include_entry(entry) {
            return Vec::new();
        }

        let mut concept_ids = self.resolve_concept_ids(rule, entry, entries_required);
        if concept_ids.is_empty() {
            if entries_required {
                return Vec::new();
            }
            concept_ids = vec![0];
        }

        if !self.check_conditions(&rule.source.conditions, entry, concept_ids[0]) {
            trace!(rule = rule.name, "entry dropped by rule conditions");
            return Vec::new();
        }

        let seed = self.generate_seed(rule, entry, person_id);

        concept_ids
            .iter()
            .enumerate()
            .filter_map(|(offset, concept_id)| {
                self.create_record(
                    rule,
                    entry,
                    person_id,
                    seed + offset as i64,
                    *concept_id,
                    entries_required,
                )
            })
            .collect()
    }

    /// The source code and vocabulary the rule's vocab field names on this
    /// entry, if any. Exposed so the orchestrator can record mapping-quality
    /// counters without re-running the rule.
    pub fn entry_source_code(&self, rule: &MappingRule, entry: &XmlNode) -> Option<(String, String)> {
        for fm in &rule.fields {
            if fm.transform != Transform::Vocab {
                continue;
            }
            let code = extract_with_fallback(entry, &fm.path, &fm.fallback_path);
            if code.is_empty() {
                continue;
            }
            let code_system = entry.first_value(&fm.vocab_path).unwrap_or_default();
            let vocabulary_id = vocabulary_id_for(&code_system);
            if !vocabulary_id.is_empty() {
                return Some((vocabulary_id.to_string(), code));
            }
        }
        None
    }

    /// Resolve the entry's vocab fields to standard concept ids.
    ///
    /// Vocab fields are tried in rule order: the first field whose code
    /// resolves wins. An extractable but unresolvable code yields concept 0
    /// when entries are optional; an empty result means the entry carries no
    /// mappable code at all.
    fn resolve_concept_ids(
        &self,
        rule: &MappingRule,
        entry: &XmlNode,
        entries_required: bool,
    ) -> Vec<i64> {
        for fm in &rule.fields {
            if fm.transform != Transform::Vocab {
                continue;
            }
            let code = extract_with_fallback(entry, &fm.path, &fm.fallback_path);
            if code.is_empty() {
                continue;
            }

            let code_system = entry.first_value(&fm.vocab_path).unwrap_or_default();
            let vocabulary_id = vocabulary_id_for(&code_system);
            if !vocabulary_id.is_empty() {
                let ids = self.vocab.standard_concept_ids(vocabulary_id, &code);
                if !ids.is_empty() {
                    return ids;
                }
            }

            if !entries_required {
                return vec![0];
            }
        }
        Vec::new()
    }

    /// Conditions are evaluated against the first resolved concept only;
    /// entries whose code fans out across domains keep or lose all their
    /// records together.
    fn check_conditions(&self, conditions: &[Condition], entry: &XmlNode, concept_id: i64) -> bool {
        conditions.iter().all(|cond| match cond.kind {
            ConditionKind::DomainEquals => self.vocab.domain_of(concept_id) == cond.value,
            ConditionKind::DomainNotEquals => self.vocab.domain_of(concept_id) != cond.value,
            ConditionKind::FieldEquals => {
                entry.first_value(&field_to_path(&cond.field)).unwrap_or_default() == cond.value
            }
            ConditionKind::FieldNotEquals => {
                entry.first_value(&field_to_path(&cond.field)).unwrap_or_default() != cond.value
            }
        })
    }

    /// Deterministic seed id: namespace (generator override or target table
    /// name), person id, then the values at the rule's base-field paths.
    fn generate_seed(&self, rule: &MappingRule, entry: &XmlNode, person_id: i64) -> i64 {
        let mut parts = Vec::with_capacity(rule.id_gen.base_fields.len() + 2);
        let namespace = if rule.id_gen.generator.is_empty() {
            rule.target.table.as_str().to_string()
        } else {
            rule.id_gen.generator.clone()
        };
        parts.push(namespace);
        parts.push(person_id.to_string());

        for field in &rule.id_gen.base_fields {
            if let Some(value) = entry.first_value(&field_to_path(field)) {
                parts.push(value);
            }
        }

        ids::generate_id(parts)
    }

    fn create_record(
        &self,
        rule: &MappingRule,
        entry: &XmlNode,
        person_id: i64,
        record_id: i64,
        concept_id: i64,
        entries_required: bool,
    ) -> Option<FieldBag> {
        let table = rule.target.table;
        let mut bag = FieldBag::new();
        bag.insert(table.id_column(), FieldValue::Int(record_id));
        bag.insert(OmopColumn::PersonId, FieldValue::Int(person_id));
        if let Some(type_column) = table.type_concept_column() {
            bag.insert(type_column, FieldValue::Int(rule.target.type_concept_id));
        }

        for fm in &rule.fields {
            let is_optional = fm.optional || !entries_required;
            match self.extract_field_value(entry, fm, concept_id) {
                Some(value) => bag.insert(fm.target, value),
                None if is_optional => {}
                None => return None,
            }
        }

        bag.insert(
            OmopColumn::MappingRule,
            FieldValue::Str(format!("RuleMapper:{}", rule.name)),
        );
        Some(bag)
    }

    fn extract_field_value(
        &self,
        entry: &XmlNode,
        fm: &FieldMapping,
        concept_id: i64,
    ) -> Option<FieldValue> {
        let raw = extract_with_fallback(entry, &fm.path, &fm.fallback_path);
        match fm.transform {
            Transform::Vocab => Some(FieldValue::Int(concept_id)),
            Transform::Date => extract_time(entry, &fm.path, &fm.fallback_path)
                .map(|dt| FieldValue::DateTime(midnight(dt))),
            Transform::TimePtr => {
                extract_time(entry, &fm.path, &fm.fallback_path).map(FieldValue::DateTime)
            }
            Transform::Int => raw.trim().parse::<i64>().ok().map(FieldValue::Int),
            Transform::Float => raw.trim().parse::<f64>().ok().map(FieldValue::Float),
            Transform::Unit => {
                if raw.is_empty() {
                    None
                } else {
                    Some(FieldValue::Int(self.vocab.standard_concept_id("UCUM", &raw)))
                }
            }
            Transform::Route | Transform::ValueVocab => {
                if raw.is_empty() {
                    None
                } else {
                    let code_system = entry.first_value(&fm.vocab_path).unwrap_or_default();
                    let mut vocabulary_id = vocabulary_id_for(&code_system);
                    if vocabulary_id.is_empty() {
                        vocabulary_id = "SNOMED";
                    }
                    Some(FieldValue::Int(
                        self.vocab.standard_concept_id(vocabulary_id, &raw),
                    ))
                }
            }
            Transform::FormatSource => {
                let display = entry.first_value(&fm.fallback_path).unwrap_or_default();
                Some(FieldValue::Str(format_source_value(&raw, &display)))
            }
            Transform::None | Transform::String => Some(FieldValue::Str(raw)),
        }
    }
}

/// Evaluate a path with a fallback; an empty primary path defers to the
/// fallback, a present-but-empty value does not.
fn extract_with_fallback(entry: &XmlNode, path: &str, fallback: &str) -> String {
    if path.is_empty() {
        if fallback.is_empty() {
            return String::new();
        }
        return entry.first_value(fallback).unwrap_or_default();
    }
    match entry.first_value(path) {
        Some(value) => value,
        None if !fallback.is_empty() => entry.first_value(fallback).unwrap_or_default(),
        None => String::new(),
    }
}

/// Extract a timestamp from the primary path, falling back like any other
/// field extraction.
fn extract_time(entry: &XmlNode, path: &str, fallback: &str) -> Option<NaiveDateTime> {
    time_at(entry, path).or_else(|| time_at(entry, fallback))
}

/// Paths ending in an attribute or `text()` parse that value; paths ending in
/// an element read the element's `value` attribute, the C-CDA convention for
/// timestamp elements.
fn time_at(entry: &XmlNode, path: &str) -> Option<NaiveDateTime> {
    if path.is_empty() {
        return None;
    }
    let last = path.rsplit('/').next().unwrap_or(path);
    let raw = if last.starts_with('@') || last == "text()" {
        entry.first_value(path)?
    } else {
        let nodes = entry.select(path);
        let node = nodes.first()?;
        node.attr("value").unwrap_or_default().to_string()
    };
    parse_hl7_time(&raw)
}

/// Convert a dotted id-gen field (`value.code`) or condition field into an
/// extraction path (`value/@code`); a bare name reads the element's `value`
/// attribute.
fn field_to_path(field: &str) -> String {
    match field.rsplit_once('.') {
        Some((elements, attr)) => format!("{}/@{}", elements.replace('.', "/"), attr),
        None => format!("{field}/@value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccda_model::XmlNode;
    use omop_model::TableTarget;
    use omop_vocab::VocabIndex;

    use crate::rules::{IdGenSpec, SourceSpec, TargetSpec};

    fn node(name: &str, attrs: &[(&str, &str)]) -> XmlNode {
        let mut n = XmlNode::new(name);
        n.attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        n
    }

    /// A Problems-style observation entry carrying a SNOMED code.
    fn problem_entry(code: &str) -> XmlNode {
        let mut entry = node("observation", &[("moodCode", "EVN")]);
        entry.children.push(node("statusCode", &[("code", "completed")]));
        entry.children.push(node(
            "value",
            &[
                ("code", code),
                ("codeSystem", "2.16.840.1.113883.6.96"),
                ("displayName", "Type 2 diabetes mellitus"),
            ],
        ));
        let mut et = XmlNode::new("effectiveTime");
        et.children.push(node("low", &[("value", "20210301120000")]));
        entry.children.push(et);
        entry
    }

    fn condition_rule() -> MappingRule {
        MappingRule {
            name: "problems_to_condition".to_string(),
            source: SourceSpec {
                section: "Problems".to_string(),
                entry_path: "entry/act/entryRelationship/observation".to_string(),
                ..SourceSpec::default()
            },
            target: TargetSpec {
                table: TableTarget::ConditionOccurrence,
                type_concept_id: 32817,
            },
            fields: vec![
                FieldMapping {
                    target: OmopColumn::ConditionConceptId,
                    path: "value/@code".to_string(),
                    fallback_path: String::new(),
                    vocab_path: "value/@codeSystem".to_string(),
                    transform: Transform::Vocab,
                    optional: false,
                },
                FieldMapping {
                    target: OmopColumn::ConditionStartDate,
                    path: "effectiveTime/low/@value".to_string(),
                    fallback_path: String::new(),
                    vocab_path: String::new(),
                    transform: Transform::Date,
                    optional: true,
                },
                FieldMapping {
                    target: OmopColumn::ConditionSourceValue,
                    path: "value/@code".to_string(),
                    fallback_path: "value/@displayName".to_string(),
                    vocab_path: String::new(),
                    transform: Transform::FormatSource,
                    optional: true,
                },
            ],
            id_gen: IdGenSpec {
                base_fields: vec!["value.code".to_string()],
                generator: String::new(),
            },
        }
    }

    fn vocab_with_standard_concept() -> VocabIndex {
        let dir = std::env::temp_dir().join("engine-vocab");
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

    #[test]
    fn maps_a_problem_entry_to_a_condition_record() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let rule = condition_rule();
        let entry = problem_entry("44054006");

        let records = engine.map_entry(&rule, &entry, 7, &VisitMap::new(), true);
        assert_eq!(records.len(), 1);
        let bag = &records[0];
        assert_eq!(bag.i64_or_zero(OmopColumn::ConditionConceptId), 44054006);
        assert_eq!(bag.i64_or_zero(OmopColumn::ConditionTypeConceptId), 32817);
        assert_eq!(bag.i64_or_zero(OmopColumn::PersonId), 7);
        assert!(bag.i64_or_zero(OmopColumn::ConditionOccurrenceId) > 0);
        // Date transform truncates to midnight.
        let start = bag.opt_datetime(OmopColumn::ConditionStartDate).unwrap();
        assert_eq!(start.format("%H%M%S").to_string(), "000000");
        assert_eq!(
            bag.string_or_empty(OmopColumn::ConditionSourceValue),
            "44054006: Type 2 diabetes mellitus"
        );
        assert_eq!(
            bag.string_or_empty(OmopColumn::MappingRule),
            "RuleMapper:problems_to_condition"
        );
    }

    #[test]
    fn planned_entries_are_excluded() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let rule = condition_rule();
        let mut entry = problem_entry("44054006");
        entry.attributes[0].1 = "INT".to_string();

        assert!(
            engine
                .map_entry(&rule, &entry, 7, &VisitMap::new(), true)
                .is_empty()
        );
    }

    #[test]
    fn unmapped_code_is_dropped_when_entries_required() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let rule = condition_rule();
        let entry = problem_entry("99999999");

        assert!(
            engine
                .map_entry(&rule, &entry, 7, &VisitMap::new(), true)
                .is_empty()
        );
    }

    #[test]
    fn unmapped_code_degrades_to_concept_zero_when_entries_optional() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let rule = condition_rule();
        let entry = problem_entry("99999999");

        let records = engine.map_entry(&rule, &entry, 7, &VisitMap::new(), false);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].i64_or_zero(OmopColumn::ConditionConceptId), 0);
    }

    #[test]
    fn missing_required_field_discards_the_record() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let mut rule = condition_rule();
        rule.fields.push(FieldMapping {
            target: OmopColumn::ConditionEndDate,
            path: "effectiveTime/high/@value".to_string(),
            fallback_path: String::new(),
            vocab_path: String::new(),
            transform: Transform::Date,
            optional: false,
        });
        let entry = problem_entry("44054006");

        assert!(
            engine
                .map_entry(&rule, &entry, 7, &VisitMap::new(), true)
                .is_empty()
        );
    }

    #[test]
    fn domain_condition_filters_by_first_concept() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let mut rule = condition_rule();
        rule.source.conditions = vec![Condition {
            kind: ConditionKind::DomainEquals,
            field: String::new(),
            value: "Observation".to_string(),
        }];
        let entry = problem_entry("44054006");

        // Concept 44054006 is in the Condition domain; the rule wants
        // Observation, so the entry is dropped.
        assert!(
            engine
                .map_entry(&rule, &entry, 7, &VisitMap::new(), true)
                .is_empty()
        );

        rule.source.conditions[0].value = "Condition".to_string();
        assert_eq!(
            engine
                .map_entry(&rule, &entry, 7, &VisitMap::new(), true)
                .len(),
            1
        );
    }

    #[test]
    fn seed_ids_are_deterministic_and_offset_per_concept() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let rule = condition_rule();
        let entry = problem_entry("44054006");

        let a = engine.map_entry(&rule, &entry, 7, &VisitMap::new(), true);
        let b = engine.map_entry(&rule, &entry, 7, &VisitMap::new(), true);
        assert_eq!(
            a[0].i64_or_zero(OmopColumn::ConditionOccurrenceId),
            b[0].i64_or_zero(OmopColumn::ConditionOccurrenceId)
        );

        let other_person = engine.map_entry(&rule, &entry, 8, &VisitMap::new(), true);
        assert_ne!(
            a[0].i64_or_zero(OmopColumn::ConditionOccurrenceId),
            other_person[0].i64_or_zero(OmopColumn::ConditionOccurrenceId)
        );
    }

    #[test]
    fn source_code_is_exposed_for_reporting() {
        let vocab = vocab_with_standard_concept();
        let engine = RuleEngine::new(&vocab);
        let rule = condition_rule();
        let entry = problem_entry("44054006");

        let (vocabulary_id, code) = engine.entry_source_code(&rule, &entry).unwrap();
        assert_eq!(vocabulary_id, "SNOMED");
        assert_eq!(code, "44054006");

        let no_code = node("observation", &[]);
        assert!(engine.entry_source_code(&rule, &no_code).is_none());
    }

    #[test]
    fn field_paths_convert_to_extraction_paths() {
        assert_eq!(field_to_path("value.code"), "value/@code");
        assert_eq!(field_to_path("effectiveTime.low.value"), "effectiveTime/low/@value");
        assert_eq!(field_to_path("id"), "id/@value");
    }
}
