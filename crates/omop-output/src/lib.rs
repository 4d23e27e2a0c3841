//! CSV serialization for the OMOP CDM tables.

#![deny(unsafe_code)]

pub mod error;
pub mod writer;

pub use error::OutputError;
pub use writer::CsvWriter;
