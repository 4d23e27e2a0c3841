//! Untyped-but-closed intermediate records produced by the rule engine.
//!
//! The engine builds one [`FieldBag`] per (entry, concept) pair before the
//! orchestrator converts it into a typed table row. Column names are a closed
//! enum rather than free strings, so a rule file naming a column that no
//! table recognizes fails at load time instead of silently dropping data.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::error::ModelError;

/// A recognized output column across all rule-driven OMOP tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OmopColumn {
    // Shared
    PersonId,
    VisitOccurrenceId,
    MappingRule,
    ValueAsNumber,
    ValueAsConceptId,
    UnitConceptId,
    UnitSourceValue,
    // condition_occurrence
    ConditionOccurrenceId,
    ConditionConceptId,
    ConditionStartDate,
    ConditionStartDatetime,
    ConditionEndDate,
    ConditionEndDatetime,
    ConditionTypeConceptId,
    ConditionSourceValue,
    ConditionStatusSourceValue,
    // drug_exposure
    DrugExposureId,
    DrugConceptId,
    DrugExposureStartDate,
    DrugExposureStartDatetime,
    DrugExposureEndDate,
    DrugExposureEndDatetime,
    DrugTypeConceptId,
    Quantity,
    DaysSupply,
    Refills,
    Sig,
    RouteConceptId,
    LotNumber,
    DrugSourceValue,
    RouteSourceValue,
    DoseUnitSourceValue,
    // procedure_occurrence
    ProcedureOccurrenceId,
    ProcedureConceptId,
    ProcedureDate,
    ProcedureDatetime,
    ProcedureTypeConceptId,
    ProcedureSourceValue,
    ModifierSourceValue,
    // measurement
    MeasurementId,
    MeasurementConceptId,
    MeasurementDate,
    MeasurementDatetime,
    MeasurementTypeConceptId,
    RangeLow,
    RangeHigh,
    MeasurementSourceValue,
    ValueSourceValue,
    // observation
    ObservationId,
    ObservationConceptId,
    ObservationDate,
    ObservationDatetime,
    ObservationTypeConceptId,
    ValueAsString,
    QualifierSourceValue,
    ObservationSourceValue,
    // device_exposure
    DeviceExposureId,
    DeviceConceptId,
    DeviceExposureStartDate,
    DeviceExposureStartDatetime,
    DeviceExposureEndDate,
    DeviceExposureEndDatetime,
    DeviceTypeConceptId,
    UniqueDeviceId,
    DeviceSourceValue,
}

impl OmopColumn {
    /// Parse a snake_case column name as used in rule files.
    pub fn from_name(name: &str) -> Result<Self, ModelError> {
        let column = match name {
            "person_id" => Self::PersonId,
            "visit_occurrence_id" => Self::VisitOccurrenceId,
            "mapping_rule" => Self::MappingRule,
            "value_as_number" => Self::ValueAsNumber,
            "value_as_concept_id" => Self::ValueAsConceptId,
            "unit_concept_id" => Self::UnitConceptId,
            "unit_source_value" => Self::UnitSourceValue,
            "condition_occurrence_id" => Self::ConditionOccurrenceId,
            "condition_concept_id" => Self::ConditionConceptId,
            "condition_start_date" => Self::ConditionStartDate,
            "condition_start_datetime" => Self::ConditionStartDatetime,
            "condition_end_date" => Self::ConditionEndDate,
            "condition_end_datetime" => Self::ConditionEndDatetime,
            "condition_type_concept_id" => Self::ConditionTypeConceptId,
            "condition_source_value" => Self::ConditionSourceValue,
            "condition_status_source_value" => Self::ConditionStatusSourceValue,
            "drug_exposure_id" => Self::DrugExposureId,
            "drug_concept_id" => Self::DrugConceptId,
            "drug_exposure_start_date" => Self::DrugExposureStartDate,
            "drug_exposure_start_datetime" => Self::DrugExposureStartDatetime,
            "drug_exposure_end_date" => Self::DrugExposureEndDate,
            "drug_exposure_end_datetime" => Self::DrugExposureEndDatetime,
            "drug_type_concept_id" => Self::DrugTypeConceptId,
            "quantity" => Self::Quantity,
            "days_supply" => Self::DaysSupply,
            "refills" => Self::Refills,
            "sig" => Self::Sig,
            "route_concept_id" => Self::RouteConceptId,
            "lot_number" => Self::LotNumber,
            "drug_source_value" => Self::DrugSourceValue,
            "route_source_value" => Self::RouteSourceValue,
            "dose_unit_source_value" => Self::DoseUnitSourceValue,
            "procedure_occurrence_id" => Self::ProcedureOccurrenceId,
            "procedure_concept_id" => Self::ProcedureConceptId,
            "procedure_date" => Self::ProcedureDate,
            "procedure_datetime" => Self::ProcedureDatetime,
            "procedure_type_concept_id" => Self::ProcedureTypeConceptId,
            "procedure_source_value" => Self::ProcedureSourceValue,
            "modifier_source_value" => Self::ModifierSourceValue,
            "measurement_id" => Self::MeasurementId,
            "measurement_concept_id" => Self::MeasurementConceptId,
            "measurement_date" => Self::MeasurementDate,
            "measurement_datetime" => Self::MeasurementDatetime,
            "measurement_type_concept_id" => Self::MeasurementTypeConceptId,
            "range_low" => Self::RangeLow,
            "range_high" => Self::RangeHigh,
            "measurement_source_value" => Self::MeasurementSourceValue,
            "value_source_value" => Self::ValueSourceValue,
            "observation_id" => Self::ObservationId,
            "observation_concept_id" => Self::ObservationConceptId,
            "observation_date" => Self::ObservationDate,
            "observation_datetime" => Self::ObservationDatetime,
            "observation_type_concept_id" => Self::ObservationTypeConceptId,
            "value_as_string" => Self::ValueAsString,
            "qualifier_source_value" => Self::QualifierSourceValue,
            "observation_source_value" => Self::ObservationSourceValue,
            "device_exposure_id" => Self::DeviceExposureId,
            "device_concept_id" => Self::DeviceConceptId,
            "device_exposure_start_date" => Self::DeviceExposureStartDate,
            "device_exposure_start_datetime" => Self::DeviceExposureStartDatetime,
            "device_exposure_end_date" => Self::DeviceExposureEndDate,
            "device_exposure_end_datetime" => Self::DeviceExposureEndDatetime,
            "device_type_concept_id" => Self::DeviceTypeConceptId,
            "unique_device_id" => Self::UniqueDeviceId,
            "device_source_value" => Self::DeviceSourceValue,
            other => return Err(ModelError::UnknownColumn(other.to_string())),
        };
        Ok(column)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonId => "person_id",
            Self::VisitOccurrenceId => "visit_occurrence_id",
            Self::MappingRule => "mapping_rule",
            Self::ValueAsNumber => "value_as_number",
            Self::ValueAsConceptId => "value_as_concept_id",
            Self::UnitConceptId => "unit_concept_id",
            Self::UnitSourceValue => "unit_source_value",
            Self::ConditionOccurrenceId => "condition_occurrence_id",
            Self::ConditionConceptId => "condition_concept_id",
            Self::ConditionStartDate => "condition_start_date",
            Self::ConditionStartDatetime => "condition_start_datetime",
            Self::ConditionEndDate => "condition_end_date",
            Self::ConditionEndDatetime => "condition_end_datetime",
            Self::ConditionTypeConceptId => "condition_type_concept_id",
            Self::ConditionSourceValue => "condition_source_value",
            Self::ConditionStatusSourceValue => "condition_status_source_value",
            Self::DrugExposureId => "drug_exposure_id",
            Self::DrugConceptId => "drug_concept_id",
            Self::DrugExposureStartDate => "drug_exposure_start_date",
            Self::DrugExposureStartDatetime => "drug_exposure_start_datetime",
            Self::DrugExposureEndDate => "drug_exposure_end_date",
            Self::DrugExposureEndDatetime => "drug_exposure_end_datetime",
            Self::DrugTypeConceptId => "drug_type_concept_id",
            Self::Quantity => "quantity",
            Self::DaysSupply => "days_supply",
            Self::Refills => "refills",
            Self::Sig => "sig",
            Self::RouteConceptId => "route_concept_id",
            Self::LotNumber => "lot_number",
            Self::DrugSourceValue => "drug_source_value",
            Self::RouteSourceValue => "route_source_value",
            Self::DoseUnitSourceValue => "dose_unit_source_value",
            Self::ProcedureOccurrenceId => "procedure_occurrence_id",
            Self::ProcedureConceptId => "procedure_concept_id",
            Self::ProcedureDate => "procedure_date",
            Self::ProcedureDatetime => "procedure_datetime",
            Self::ProcedureTypeConceptId => "procedure_type_concept_id",
            Self::ProcedureSourceValue => "procedure_source_value",
            Self::ModifierSourceValue => "modifier_source_value",
            Self::MeasurementId => "measurement_id",
            Self::MeasurementConceptId => "measurement_concept_id",
            Self::MeasurementDate => "measurement_date",
            Self::MeasurementDatetime => "measurement_datetime",
            Self::MeasurementTypeConceptId => "measurement_type_concept_id",
            Self::RangeLow => "range_low",
            Self::RangeHigh => "range_high",
            Self::MeasurementSourceValue => "measurement_source_value",
            Self::ValueSourceValue => "value_source_value",
            Self::ObservationId => "observation_id",
            Self::ObservationConceptId => "observation_concept_id",
            Self::ObservationDate => "observation_date",
            Self::ObservationDatetime => "observation_datetime",
            Self::ObservationTypeConceptId => "observation_type_concept_id",
            Self::ValueAsString => "value_as_string",
            Self::QualifierSourceValue => "qualifier_source_value",
            Self::ObservationSourceValue => "observation_source_value",
            Self::DeviceExposureId => "device_exposure_id",
            Self::DeviceConceptId => "device_concept_id",
            Self::DeviceExposureStartDate => "device_exposure_start_date",
            Self::DeviceExposureStartDatetime => "device_exposure_start_datetime",
            Self::DeviceExposureEndDate => "device_exposure_end_date",
            Self::DeviceExposureEndDatetime => "device_exposure_end_datetime",
            Self::DeviceTypeConceptId => "device_type_concept_id",
            Self::UniqueDeviceId => "unique_device_id",
            Self::DeviceSourceValue => "device_source_value",
        }
    }
}

impl fmt::Display for OmopColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for OmopColumn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for OmopColumn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// A scalar value carried by a [`FieldBag`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Self::Str(v) => v.clone(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::DateTime(v) => v.to_string(),
        }
    }
}

/// One candidate output record, keyed by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBag {
    values: BTreeMap<OmopColumn, FieldValue>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: OmopColumn, value: FieldValue) {
        self.values.insert(column, value);
    }

    pub fn get(&self, column: OmopColumn) -> Option<&FieldValue> {
        self.values.get(&column)
    }

    pub fn contains(&self, column: OmopColumn) -> bool {
        self.values.contains_key(&column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Integer value, erroring when the column is absent.
    pub fn require_i64(&self, column: OmopColumn) -> Result<i64, ModelError> {
        self.get(column)
            .and_then(FieldValue::as_i64)
            .ok_or(ModelError::MissingColumn(column))
    }

    /// Integer value, 0 when absent or non-numeric.
    pub fn i64_or_zero(&self, column: OmopColumn) -> i64 {
        self.get(column).and_then(FieldValue::as_i64).unwrap_or(0)
    }

    pub fn opt_i64(&self, column: OmopColumn) -> Option<i64> {
        self.get(column).and_then(FieldValue::as_i64)
    }

    pub fn opt_f64(&self, column: OmopColumn) -> Option<f64> {
        self.get(column).and_then(FieldValue::as_f64)
    }

    pub fn opt_datetime(&self, column: OmopColumn) -> Option<NaiveDateTime> {
        self.get(column).and_then(FieldValue::as_datetime)
    }

    /// String rendering of the value, empty when absent.
    pub fn string_or_empty(&self, column: OmopColumn) -> String {
        self.get(column)
            .map(FieldValue::to_display_string)
            .unwrap_or_default()
    }
}
