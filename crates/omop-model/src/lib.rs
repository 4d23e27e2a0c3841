#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod record;
pub mod tables;
pub mod target;

pub use error::ModelError;
pub use record::{FieldBag, FieldValue, OmopColumn};
pub use tables::{
    ConditionOccurrence, DeviceExposure, DrugExposure, Measurement, Observation, OmopData, Person,
    ProcedureOccurrence, VisitOccurrence,
};
pub use target::TableTarget;
