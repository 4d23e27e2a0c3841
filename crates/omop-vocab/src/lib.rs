#![deny(unsafe_code)]

pub mod code_systems;
pub mod demographics;
pub mod error;
pub mod hash;
pub mod index;

pub use code_systems::{code_system_name, vocabulary_id_for};
pub use error::VocabError;
pub use index::{Concept, ConceptResolution, ResolutionKind, VocabIndex};
