//! Declarative mapping-rule model.
//!
//! Rules are authored in YAML, one or more per file. A rule names its source
//! section (by canonical name and template OID), how to locate entries within
//! it, which table the output rows go to, and one field mapping per output
//! column. Column and table names deserialize into closed enums, so a typo in
//! a rule file fails at load time rather than dropping data silently.

use serde::{Deserialize, Serialize};

use omop_model::{OmopColumn, TableTarget};

use crate::transforms::Transform;

/// Filter applied to an entry after concept resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    /// Extraction path, for the field condition kinds.
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Keep the entry only if the first resolved concept's domain matches.
    DomainEquals,
    /// Drop the entry if the first resolved concept's domain matches.
    DomainNotEquals,
    /// Keep the entry only if the value at `field` matches.
    FieldEquals,
    /// Drop the entry if the value at `field` matches.
    FieldNotEquals,
}

/// Where a rule's entries come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSpec {
    /// Canonical section name (e.g. "Problems").
    pub section: String,
    /// Section template OID.
    pub section_oid: String,
    /// "Entries required" variant of the template OID.
    pub section_oid_entries_required: String,
    /// Path from the section element to each entry node.
    pub entry_path: String,
    pub conditions: Vec<Condition>,
}

/// Which table a rule's records go to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub table: TableTarget,
    #[serde(default)]
    pub type_concept_id: i64,
}

/// One output column of a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub target: OmopColumn,
    /// Primary extraction path, relative to the entry node.
    #[serde(default)]
    pub path: String,
    /// Fallback path tried when the primary matches nothing.
    #[serde(default)]
    pub fallback_path: String,
    /// Path to the code-system identifier, for the vocabulary transforms.
    #[serde(default)]
    pub vocab_path: String,
    #[serde(default)]
    pub transform: Transform,
    /// A missing value in an optional field leaves the column unset instead
    /// of discarding the record.
    #[serde(default)]
    pub optional: bool,
}

/// Inputs to the deterministic primary-key hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdGenSpec {
    /// Entry-relative field paths whose values feed the hash.
    pub base_fields: Vec<String>,
    /// Namespace override; defaults to the target table name.
    pub generator: String,
}

/// A complete mapping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    pub name: String,
    #[serde(default)]
    pub source: SourceSpec,
    pub target: TargetSpec,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub id_gen: IdGenSpec,
}

impl MappingRule {
    /// Whether records of this rule can be routed into the dataset.
    /// Person and visit rows bypass the rule engine.
    pub fn has_rule_driven_target(&self) -> bool {
        !matches!(
            self.target.table,
            TableTarget::Person | TableTarget::VisitOccurrence
        )
    }
}
