//! Closed identification of the OMOP target tables.
//!
//! Rules declare their destination table by name; deserializing into this
//! enum makes routing exhaustive and rejects typos at rule-load time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::record::OmopColumn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableTarget {
    #[serde(rename = "person")]
    Person,
    #[serde(rename = "visit_occurrence")]
    VisitOccurrence,
    #[serde(rename = "condition_occurrence")]
    ConditionOccurrence,
    #[serde(rename = "drug_exposure")]
    DrugExposure,
    #[serde(rename = "procedure_occurrence")]
    ProcedureOccurrence,
    #[serde(rename = "measurement")]
    Measurement,
    #[serde(rename = "observation")]
    Observation,
    #[serde(rename = "device_exposure")]
    DeviceExposure,
}

impl TableTarget {
    pub fn from_name(name: &str) -> Result<Self, ModelError> {
        let table = match name {
            "person" => Self::Person,
            "visit_occurrence" => Self::VisitOccurrence,
            "condition_occurrence" => Self::ConditionOccurrence,
            "drug_exposure" => Self::DrugExposure,
            "procedure_occurrence" => Self::ProcedureOccurrence,
            "measurement" => Self::Measurement,
            "observation" => Self::Observation,
            "device_exposure" => Self::DeviceExposure,
            other => return Err(ModelError::UnknownTable(other.to_string())),
        };
        Ok(table)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::VisitOccurrence => "visit_occurrence",
            Self::ConditionOccurrence => "condition_occurrence",
            Self::DrugExposure => "drug_exposure",
            Self::ProcedureOccurrence => "procedure_occurrence",
            Self::Measurement => "measurement",
            Self::Observation => "observation",
            Self::DeviceExposure => "device_exposure",
        }
    }

    /// The table's primary-key column.
    pub fn id_column(&self) -> OmopColumn {
        match self {
            Self::Person => OmopColumn::PersonId,
            Self::VisitOccurrence => OmopColumn::VisitOccurrenceId,
            Self::ConditionOccurrence => OmopColumn::ConditionOccurrenceId,
            Self::DrugExposure => OmopColumn::DrugExposureId,
            Self::ProcedureOccurrence => OmopColumn::ProcedureOccurrenceId,
            Self::Measurement => OmopColumn::MeasurementId,
            Self::Observation => OmopColumn::ObservationId,
            Self::DeviceExposure => OmopColumn::DeviceExposureId,
        }
    }

    /// The table's type-concept column. `None` for person, which carries no
    /// type concept.
    pub fn type_concept_column(&self) -> Option<OmopColumn> {
        match self {
            Self::Person => None,
            Self::VisitOccurrence => None,
            Self::ConditionOccurrence => Some(OmopColumn::ConditionTypeConceptId),
            Self::DrugExposure => Some(OmopColumn::DrugTypeConceptId),
            Self::ProcedureOccurrence => Some(OmopColumn::ProcedureTypeConceptId),
            Self::Measurement => Some(OmopColumn::MeasurementTypeConceptId),
            Self::Observation => Some(OmopColumn::ObservationTypeConceptId),
            Self::DeviceExposure => Some(OmopColumn::DeviceTypeConceptId),
        }
    }

}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trip() {
        for table in [
            TableTarget::Person,
            TableTarget::VisitOccurrence,
            TableTarget::ConditionOccurrence,
            TableTarget::DrugExposure,
            TableTarget::ProcedureOccurrence,
            TableTarget::Measurement,
            TableTarget::Observation,
            TableTarget::DeviceExposure,
        ] {
            assert_eq!(TableTarget::from_name(table.as_str()).unwrap(), table);
        }
    }

    #[test]
    fn typo_rejected() {
        assert!(matches!(
            TableTarget::from_name("condition_occurence"),
            Err(ModelError::UnknownTable(_))
        ));
    }

    #[test]
    fn id_and_type_columns() {
        assert_eq!(
            TableTarget::ConditionOccurrence.id_column(),
            OmopColumn::ConditionOccurrenceId
        );
        assert_eq!(
            TableTarget::DrugExposure.type_concept_column(),
            Some(OmopColumn::DrugTypeConceptId)
        );
        assert_eq!(TableTarget::Person.type_concept_column(), None);
    }
}
