//! CLI library components for the C-CDA to OMOP converter.

#![deny(unsafe_code)]

pub mod logging;
