//! Typed view of a parsed C-CDA document.
//!
//! Patient demographics and encounters are fully typed because they bypass
//! the rule engine. Clinical sections keep their raw element trees so that
//! mapping rules can extract fields by path.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::node::XmlNode;

/// A coded entry with its coding-system identification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodedValue {
    pub code: String,
    pub code_system: String,
    pub code_system_name: String,
    pub display_name: String,
    pub original_text: String,
}

impl CodedValue {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.display_name.is_empty()
    }
}

/// A point in time or a low/high range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectiveTime {
    pub value: Option<NaiveDateTime>,
    pub low: Option<NaiveDateTime>,
    pub high: Option<NaiveDateTime>,
}

impl EffectiveTime {
    /// Range start, falling back to the point value.
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.low.or(self.value)
    }

    /// Range end, falling back to the start.
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.high.or_else(|| self.start())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonName {
    pub given: String,
    pub family: String,
    pub prefix: String,
    pub suffix: String,
}

/// Patient demographics from the `recordTarget` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: PersonName,
    pub birth_time: Option<NaiveDateTime>,
    pub gender: CodedValue,
    pub race: CodedValue,
    pub ethnicity: CodedValue,
}

/// An encounter from the Encounters section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub code: CodedValue,
    pub effective_time: EffectiveTime,
}

/// Whether a clinical statement should be mapped at all.
///
/// Keeps entries whose `moodCode` is `EVN` or absent (an actual occurrence,
/// not an intent or a goal) and whose `statusCode` is `completed`, `active`
/// or absent.
pub fn should_include_entry(node: &XmlNode) -> bool {
    is_actual_event(node) && has_completed_status(node)
}

fn is_actual_event(node: &XmlNode) -> bool {
    matches!(node.attr("moodCode"), None | Some("EVN") | Some(""))
}

fn has_completed_status(node: &XmlNode) -> bool {
    match node.child("statusCode") {
        None => true,
        Some(status) => matches!(status.attr("code"), None | Some("completed") | Some("active") | Some("")),
    }
}

/// Which structural template variant a section declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionMeta {
    pub template_oid: String,
    pub entries_required: bool,
}

/// One recognized clinical section with its raw element tree.
#[derive(Debug, Clone)]
pub struct Section {
    /// Canonical section name (e.g. "Problems", "Medications").
    pub name: String,
    pub meta: SectionMeta,
    /// The `section` element, entries included.
    pub node: XmlNode,
}

/// A parsed C-CDA clinical document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub patient: Patient,
    pub encounters: Vec<Encounter>,
    pub sections: Vec<Section>,
}

impl Document {
    /// Section by canonical name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Section whose declared template OID matches either given variant.
    pub fn section_by_oid(&self, base_oid: &str, required_oid: &str) -> Option<&Section> {
        self.sections.iter().find(|s| {
            !s.meta.template_oid.is_empty()
                && (s.meta.template_oid == base_oid || s.meta.template_oid == required_oid)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn entry_filter_mood_and_status() {
        let mut entry = XmlNode::new("observation");
        assert!(should_include_entry(&entry));

        entry.attributes.push(("moodCode".to_string(), "EVN".to_string()));
        assert!(should_include_entry(&entry));

        let mut status = XmlNode::new("statusCode");
        status.attributes.push(("code".to_string(), "active".to_string()));
        entry.children.push(status);
        assert!(should_include_entry(&entry));

        entry.children[0].attributes[0].1 = "aborted".to_string();
        assert!(!should_include_entry(&entry));

        let mut intent = XmlNode::new("substanceAdministration");
        intent.attributes.push(("moodCode".to_string(), "INT".to_string()));
        assert!(!should_include_entry(&intent));
    }

    #[test]
    fn effective_time_fallbacks() {
        let point = NaiveDate::from_ymd_opt(2023, 4, 15).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let et = EffectiveTime {
            value: Some(point),
            low: None,
            high: None,
        };
        assert_eq!(et.start(), Some(point));
        assert_eq!(et.end(), Some(point));

        let et = EffectiveTime {
            value: None,
            low: Some(point),
            high: None,
        };
        assert_eq!(et.end(), Some(point));
    }

    #[test]
    fn section_lookup_by_oid() {
        let doc = Document {
            sections: vec![Section {
                name: "Problems".to_string(),
                meta: SectionMeta {
                    template_oid: "2.16.840.1.113883.10.20.22.2.5.1".to_string(),
                    entries_required: true,
                },
                node: XmlNode::new("section"),
            }],
            ..Document::default()
        };
        assert!(
            doc.section_by_oid(
                "2.16.840.1.113883.10.20.22.2.5",
                "2.16.840.1.113883.10.20.22.2.5.1"
            )
            .is_some()
        );
        assert!(doc.section("Problems").is_some());
        assert!(doc.section("Medications").is_none());
    }
}
