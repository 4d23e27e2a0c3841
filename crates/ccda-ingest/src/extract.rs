//! Document assembly from the raw element tree.
//!
//! Demographics and encounters are extracted into typed structs here;
//! clinical sections are recognized by template OID and kept as raw trees
//! for the rule engine.

use ccda_model::{
    CodedValue, Document, EffectiveTime, Encounter, Patient, PersonName, Section, SectionMeta,
    XmlNode, parse_hl7_time, should_include_entry, templates,
};
use tracing::debug;

/// Build a [`Document`] from the root `ClinicalDocument` element.
pub fn extract_document(root: &XmlNode) -> Document {
    let mut doc = Document {
        patient: extract_patient(root),
        ..Document::default()
    };

    for section in find_sections(root) {
        let Some(oid) = section_template_oid(section) else {
            continue;
        };
        let Some((name, entries_required)) = templates::section_for_oid(oid) else {
            continue;
        };
        debug!(section = name, oid, entries_required, "recognized section");

        if name == "Encounters" {
            doc.encounters = extract_encounters(section);
        }
        doc.sections.push(Section {
            name: name.to_string(),
            meta: SectionMeta {
                template_oid: oid.to_string(),
                entries_required,
            },
            node: section.clone(),
        });
    }

    doc
}

fn extract_patient(root: &XmlNode) -> Patient {
    let mut patient = Patient::default();

    let Some(role) = root.select("recordTarget/patientRole").first().copied() else {
        return patient;
    };
    if let Some(id) = role.child("id") {
        patient.id = id_value(id);
    }

    let Some(person) = role.child("patient") else {
        return patient;
    };
    if let Some(name) = person.child("name") {
        patient.name = extract_name(name);
    }
    if let Some(value) = person.first_non_empty("birthTime/@value") {
        patient.birth_time = parse_hl7_time(&value);
    }
    if let Some(gender) = person.child("administrativeGenderCode") {
        patient.gender = coded_value(gender);
    }
    if let Some(race) = person.child("raceCode") {
        patient.race = coded_value(race);
    }
    if let Some(ethnicity) = person.child("ethnicGroupCode") {
        patient.ethnicity = coded_value(ethnicity);
    }

    patient
}

fn extract_name(node: &XmlNode) -> PersonName {
    let given: Vec<&str> = node
        .children_named("given")
        .map(|g| g.text.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    PersonName {
        given: given.join(" "),
        family: child_text(node, "family"),
        prefix: child_text(node, "prefix"),
        suffix: child_text(node, "suffix"),
    }
}

fn extract_encounters(section: &XmlNode) -> Vec<Encounter> {
    section
        .select("entry/encounter")
        .into_iter()
        .filter(|enc| should_include_entry(enc))
        .map(|enc| Encounter {
            id: enc.child("id").map(id_value).unwrap_or_default(),
            code: enc.child("code").map(coded_value).unwrap_or_default(),
            effective_time: enc
                .child("effectiveTime")
                .map(effective_time)
                .unwrap_or_default(),
        })
        .collect()
}

/// All `component/section` elements at any depth.
fn find_sections(node: &XmlNode) -> Vec<&XmlNode> {
    let mut out = Vec::new();
    collect_sections(node, &mut out);
    out
}

fn collect_sections<'a>(node: &'a XmlNode, out: &mut Vec<&'a XmlNode>) {
    if node.name == "component" {
        out.extend(node.children_named("section"));
    }
    for child in &node.children {
        collect_sections(child, out);
    }
}

/// The first `templateId/@root` on a section that names a known section type.
fn section_template_oid(section: &XmlNode) -> Option<&str> {
    section
        .children_named("templateId")
        .filter_map(|t| t.attr("root"))
        .find(|oid| templates::section_for_oid(oid).is_some())
}

/// `extension` attribute of an `id` element, falling back to `root`.
fn id_value(id: &XmlNode) -> String {
    match id.attr("extension") {
        Some(ext) if !ext.is_empty() => ext.to_string(),
        _ => id.attr("root").unwrap_or_default().to_string(),
    }
}

fn coded_value(node: &XmlNode) -> CodedValue {
    CodedValue {
        code: attr_string(node, "code"),
        code_system: attr_string(node, "codeSystem"),
        code_system_name: attr_string(node, "codeSystemName"),
        display_name: attr_string(node, "displayName"),
        original_text: child_text(node, "originalText"),
    }
}

fn effective_time(node: &XmlNode) -> EffectiveTime {
    EffectiveTime {
        value: node.attr("value").and_then(parse_hl7_time),
        low: node
            .child("low")
            .and_then(|l| l.attr("value"))
            .and_then(parse_hl7_time),
        high: node
            .child("high")
            .and_then(|h| h.attr("value"))
            .and_then(parse_hl7_time),
    }
}

fn attr_string(node: &XmlNode, name: &str) -> String {
    node.attr(name).unwrap_or_default().to_string()
}

fn child_text(node: &XmlNode, name: &str) -> String {
    node.child(name).map(|c| c.text.clone()).unwrap_or_default()
}
