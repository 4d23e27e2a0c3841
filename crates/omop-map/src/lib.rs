//! Declarative rule-driven mapping from C-CDA sections to OMOP rows.
//!
//! Rules are authored in YAML and loaded with [`load_rules`]; the
//! [`DocumentMapper`] applies them to parsed documents, handling person and
//! visit rows directly and routing everything else through the
//! [`RuleEngine`].

#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod loader;
pub mod mapper;
pub mod rules;
pub mod transforms;

pub use engine::{RuleEngine, VisitMap};
pub use error::RuleError;
pub use loader::{index_rules_by_section, load_rules, rule_by_name};
pub use mapper::DocumentMapper;
pub use rules::{
    Condition, ConditionKind, FieldMapping, IdGenSpec, MappingRule, SourceSpec, TargetSpec,
};
pub use transforms::Transform;
