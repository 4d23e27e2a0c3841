//! YAML rule-file loading.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::Value;
use tracing::debug;

use crate::error::RuleError;
use crate::rules::MappingRule;

/// Load mapping rules from a YAML file or a directory of YAML files.
///
/// Directories are read in lexicographic filename order over `.yaml` and
/// `.yml` entries, so rule ordering is deterministic. A file holds either a
/// single rule (a `name` key at the top level) or a list under a `rules` key;
/// anything else, including an empty document, yields no rules.
pub fn load_rules(path: &Path) -> Result<Vec<MappingRule>, RuleError> {
    if path.is_dir() {
        load_rules_from_dir(path)
    } else {
        load_rules_from_file(path)
    }
}

fn load_rules_from_dir(dir: &Path) -> Result<Vec<MappingRule>, RuleError> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| RuleError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml" | "yml")
                )
        })
        .collect();
    files.sort();

    let mut rules = Vec::new();
    for file in files {
        rules.extend(load_rules_from_file(&file)?);
    }
    Ok(rules)
}

fn load_rules_from_file(path: &Path) -> Result<Vec<MappingRule>, RuleError> {
    let text = std::fs::read_to_string(path).map_err(|e| RuleError::io(path, e))?;
    let doc: Value = serde_yaml::from_str(&text).map_err(|e| RuleError::yaml(path, e))?;

    let rules: Vec<MappingRule> = if doc.get("name").is_some() {
        vec![serde_yaml::from_value(doc).map_err(|e| RuleError::yaml(path, e))?]
    } else if let Some(list) = doc.get("rules") {
        serde_yaml::from_value(list.clone()).map_err(|e| RuleError::yaml(path, e))?
    } else {
        Vec::new()
    };

    for rule in &rules {
        if !rule.has_rule_driven_target() {
            return Err(RuleError::UnsupportedTarget {
                rule: rule.name.clone(),
                table: rule.target.table,
            });
        }
    }

    debug!(path = %path.display(), count = rules.len(), "loaded mapping rules");
    Ok(rules)
}

/// Group rules by their source section name, preserving load order within
/// each section.
pub fn index_rules_by_section(rules: &[MappingRule]) -> BTreeMap<String, Vec<MappingRule>> {
    let mut index: BTreeMap<String, Vec<MappingRule>> = BTreeMap::new();
    for rule in rules {
        index
            .entry(rule.source.section.clone())
            .or_default()
            .push(rule.clone());
    }
    index
}

/// Find a rule by name.
pub fn rule_by_name<'a>(rules: &'a [MappingRule], name: &str) -> Option<&'a MappingRule> {
    rules.iter().find(|r| r.name == name)
}
