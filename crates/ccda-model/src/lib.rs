#![deny(unsafe_code)]

pub mod document;
pub mod hl7_time;
pub mod node;
pub mod templates;

pub use document::{
    CodedValue, Document, EffectiveTime, Encounter, Patient, PersonName, Section,
    SectionMeta, should_include_entry,
};
pub use hl7_time::parse_hl7_time;
pub use node::XmlNode;
