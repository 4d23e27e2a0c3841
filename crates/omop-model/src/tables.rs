//! OMOP CDM 5.3 table rows and the per-document aggregate.
//!
//! The rule-driven tables each carry a `from_record` converter that performs
//! the typed extraction from a [`FieldBag`]; a missing primary key or person
//! id is a distinct error, everything else defaults. Every row carries a
//! `mapping_rule` provenance tag and the `source_file` it came from.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::ModelError;
use crate::record::{FieldBag, OmopColumn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Person {
    pub person_id: i64,
    pub gender_concept_id: i64,
    pub year_of_birth: i32,
    pub month_of_birth: Option<u32>,
    pub day_of_birth: Option<u32>,
    pub birth_datetime: Option<NaiveDateTime>,
    pub race_concept_id: i64,
    pub ethnicity_concept_id: i64,
    pub person_source_value: String,
    pub gender_source_value: String,
    pub race_source_value: String,
    pub ethnicity_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisitOccurrence {
    pub visit_occurrence_id: i64,
    pub person_id: i64,
    pub visit_concept_id: i64,
    pub visit_start_date: Option<NaiveDateTime>,
    pub visit_start_datetime: Option<NaiveDateTime>,
    pub visit_end_date: Option<NaiveDateTime>,
    pub visit_end_datetime: Option<NaiveDateTime>,
    pub visit_type_concept_id: i64,
    pub visit_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConditionOccurrence {
    pub condition_occurrence_id: i64,
    pub person_id: i64,
    pub condition_concept_id: i64,
    pub condition_start_date: Option<NaiveDateTime>,
    pub condition_start_datetime: Option<NaiveDateTime>,
    pub condition_end_date: Option<NaiveDateTime>,
    pub condition_end_datetime: Option<NaiveDateTime>,
    pub condition_type_concept_id: i64,
    pub visit_occurrence_id: Option<i64>,
    pub condition_source_value: String,
    pub condition_status_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

impl ConditionOccurrence {
    pub fn from_record(bag: &FieldBag) -> Result<Self, ModelError> {
        Ok(Self {
            condition_occurrence_id: bag.require_i64(OmopColumn::ConditionOccurrenceId)?,
            person_id: bag.require_i64(OmopColumn::PersonId)?,
            condition_concept_id: bag.i64_or_zero(OmopColumn::ConditionConceptId),
            condition_start_date: bag.opt_datetime(OmopColumn::ConditionStartDate),
            condition_start_datetime: bag.opt_datetime(OmopColumn::ConditionStartDatetime),
            condition_end_date: bag.opt_datetime(OmopColumn::ConditionEndDate),
            condition_end_datetime: bag.opt_datetime(OmopColumn::ConditionEndDatetime),
            condition_type_concept_id: bag.i64_or_zero(OmopColumn::ConditionTypeConceptId),
            visit_occurrence_id: bag.opt_i64(OmopColumn::VisitOccurrenceId),
            condition_source_value: bag.string_or_empty(OmopColumn::ConditionSourceValue),
            condition_status_source_value: bag
                .string_or_empty(OmopColumn::ConditionStatusSourceValue),
            mapping_rule: bag.string_or_empty(OmopColumn::MappingRule),
            source_file: String::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrugExposure {
    pub drug_exposure_id: i64,
    pub person_id: i64,
    pub drug_concept_id: i64,
    pub drug_exposure_start_date: Option<NaiveDateTime>,
    pub drug_exposure_start_datetime: Option<NaiveDateTime>,
    pub drug_exposure_end_date: Option<NaiveDateTime>,
    pub drug_exposure_end_datetime: Option<NaiveDateTime>,
    pub drug_type_concept_id: i64,
    pub refills: Option<i64>,
    pub quantity: Option<f64>,
    pub days_supply: Option<i64>,
    pub sig: String,
    pub route_concept_id: Option<i64>,
    pub lot_number: String,
    pub visit_occurrence_id: Option<i64>,
    pub drug_source_value: String,
    pub route_source_value: String,
    pub dose_unit_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

impl DrugExposure {
    pub fn from_record(bag: &FieldBag) -> Result<Self, ModelError> {
        Ok(Self {
            drug_exposure_id: bag.require_i64(OmopColumn::DrugExposureId)?,
            person_id: bag.require_i64(OmopColumn::PersonId)?,
            drug_concept_id: bag.i64_or_zero(OmopColumn::DrugConceptId),
            drug_exposure_start_date: bag.opt_datetime(OmopColumn::DrugExposureStartDate),
            drug_exposure_start_datetime: bag.opt_datetime(OmopColumn::DrugExposureStartDatetime),
            drug_exposure_end_date: bag.opt_datetime(OmopColumn::DrugExposureEndDate),
            drug_exposure_end_datetime: bag.opt_datetime(OmopColumn::DrugExposureEndDatetime),
            drug_type_concept_id: bag.i64_or_zero(OmopColumn::DrugTypeConceptId),
            refills: bag.opt_i64(OmopColumn::Refills),
            quantity: bag.opt_f64(OmopColumn::Quantity),
            days_supply: bag.opt_i64(OmopColumn::DaysSupply),
            sig: bag.string_or_empty(OmopColumn::Sig),
            route_concept_id: bag.opt_i64(OmopColumn::RouteConceptId),
            lot_number: bag.string_or_empty(OmopColumn::LotNumber),
            visit_occurrence_id: bag.opt_i64(OmopColumn::VisitOccurrenceId),
            drug_source_value: bag.string_or_empty(OmopColumn::DrugSourceValue),
            route_source_value: bag.string_or_empty(OmopColumn::RouteSourceValue),
            dose_unit_source_value: bag.string_or_empty(OmopColumn::DoseUnitSourceValue),
            mapping_rule: bag.string_or_empty(OmopColumn::MappingRule),
            source_file: String::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcedureOccurrence {
    pub procedure_occurrence_id: i64,
    pub person_id: i64,
    pub procedure_concept_id: i64,
    pub procedure_date: Option<NaiveDateTime>,
    pub procedure_datetime: Option<NaiveDateTime>,
    pub procedure_type_concept_id: i64,
    pub visit_occurrence_id: Option<i64>,
    pub procedure_source_value: String,
    pub modifier_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

impl ProcedureOccurrence {
    pub fn from_record(bag: &FieldBag) -> Result<Self, ModelError> {
        Ok(Self {
            procedure_occurrence_id: bag.require_i64(OmopColumn::ProcedureOccurrenceId)?,
            person_id: bag.require_i64(OmopColumn::PersonId)?,
            procedure_concept_id: bag.i64_or_zero(OmopColumn::ProcedureConceptId),
            procedure_date: bag.opt_datetime(OmopColumn::ProcedureDate),
            procedure_datetime: bag.opt_datetime(OmopColumn::ProcedureDatetime),
            procedure_type_concept_id: bag.i64_or_zero(OmopColumn::ProcedureTypeConceptId),
            visit_occurrence_id: bag.opt_i64(OmopColumn::VisitOccurrenceId),
            procedure_source_value: bag.string_or_empty(OmopColumn::ProcedureSourceValue),
            modifier_source_value: bag.string_or_empty(OmopColumn::ModifierSourceValue),
            mapping_rule: bag.string_or_empty(OmopColumn::MappingRule),
            source_file: String::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measurement {
    pub measurement_id: i64,
    pub person_id: i64,
    pub measurement_concept_id: i64,
    pub measurement_date: Option<NaiveDateTime>,
    pub measurement_datetime: Option<NaiveDateTime>,
    pub measurement_type_concept_id: i64,
    pub value_as_number: Option<f64>,
    pub value_as_concept_id: Option<i64>,
    pub unit_concept_id: Option<i64>,
    pub range_low: Option<f64>,
    pub range_high: Option<f64>,
    pub visit_occurrence_id: Option<i64>,
    pub measurement_source_value: String,
    pub unit_source_value: String,
    pub value_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

impl Measurement {
    pub fn from_record(bag: &FieldBag) -> Result<Self, ModelError> {
        Ok(Self {
            measurement_id: bag.require_i64(OmopColumn::MeasurementId)?,
            person_id: bag.require_i64(OmopColumn::PersonId)?,
            measurement_concept_id: bag.i64_or_zero(OmopColumn::MeasurementConceptId),
            measurement_date: bag.opt_datetime(OmopColumn::MeasurementDate),
            measurement_datetime: bag.opt_datetime(OmopColumn::MeasurementDatetime),
            measurement_type_concept_id: bag.i64_or_zero(OmopColumn::MeasurementTypeConceptId),
            value_as_number: bag.opt_f64(OmopColumn::ValueAsNumber),
            value_as_concept_id: bag.opt_i64(OmopColumn::ValueAsConceptId),
            unit_concept_id: bag.opt_i64(OmopColumn::UnitConceptId),
            range_low: bag.opt_f64(OmopColumn::RangeLow),
            range_high: bag.opt_f64(OmopColumn::RangeHigh),
            visit_occurrence_id: bag.opt_i64(OmopColumn::VisitOccurrenceId),
            measurement_source_value: bag.string_or_empty(OmopColumn::MeasurementSourceValue),
            unit_source_value: bag.string_or_empty(OmopColumn::UnitSourceValue),
            value_source_value: bag.string_or_empty(OmopColumn::ValueSourceValue),
            mapping_rule: bag.string_or_empty(OmopColumn::MappingRule),
            source_file: String::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Observation {
    pub observation_id: i64,
    pub person_id: i64,
    pub observation_concept_id: i64,
    pub observation_date: Option<NaiveDateTime>,
    pub observation_datetime: Option<NaiveDateTime>,
    pub observation_type_concept_id: i64,
    pub value_as_number: Option<f64>,
    pub value_as_string: String,
    pub value_as_concept_id: Option<i64>,
    pub visit_occurrence_id: Option<i64>,
    pub observation_source_value: String,
    pub unit_source_value: String,
    pub qualifier_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

impl Observation {
    pub fn from_record(bag: &FieldBag) -> Result<Self, ModelError> {
        Ok(Self {
            observation_id: bag.require_i64(OmopColumn::ObservationId)?,
            person_id: bag.require_i64(OmopColumn::PersonId)?,
            observation_concept_id: bag.i64_or_zero(OmopColumn::ObservationConceptId),
            observation_date: bag.opt_datetime(OmopColumn::ObservationDate),
            observation_datetime: bag.opt_datetime(OmopColumn::ObservationDatetime),
            observation_type_concept_id: bag.i64_or_zero(OmopColumn::ObservationTypeConceptId),
            value_as_number: bag.opt_f64(OmopColumn::ValueAsNumber),
            value_as_string: bag.string_or_empty(OmopColumn::ValueAsString),
            value_as_concept_id: bag.opt_i64(OmopColumn::ValueAsConceptId),
            visit_occurrence_id: bag.opt_i64(OmopColumn::VisitOccurrenceId),
            observation_source_value: bag.string_or_empty(OmopColumn::ObservationSourceValue),
            unit_source_value: bag.string_or_empty(OmopColumn::UnitSourceValue),
            qualifier_source_value: bag.string_or_empty(OmopColumn::QualifierSourceValue),
            mapping_rule: bag.string_or_empty(OmopColumn::MappingRule),
            source_file: String::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceExposure {
    pub device_exposure_id: i64,
    pub person_id: i64,
    pub device_concept_id: i64,
    pub device_exposure_start_date: Option<NaiveDateTime>,
    pub device_exposure_start_datetime: Option<NaiveDateTime>,
    pub device_exposure_end_date: Option<NaiveDateTime>,
    pub device_exposure_end_datetime: Option<NaiveDateTime>,
    pub device_type_concept_id: i64,
    pub unique_device_id: String,
    pub visit_occurrence_id: Option<i64>,
    pub device_source_value: String,
    pub mapping_rule: String,
    pub source_file: String,
}

impl DeviceExposure {
    pub fn from_record(bag: &FieldBag) -> Result<Self, ModelError> {
        Ok(Self {
            device_exposure_id: bag.require_i64(OmopColumn::DeviceExposureId)?,
            person_id: bag.require_i64(OmopColumn::PersonId)?,
            device_concept_id: bag.i64_or_zero(OmopColumn::DeviceConceptId),
            device_exposure_start_date: bag.opt_datetime(OmopColumn::DeviceExposureStartDate),
            device_exposure_start_datetime: bag
                .opt_datetime(OmopColumn::DeviceExposureStartDatetime),
            device_exposure_end_date: bag.opt_datetime(OmopColumn::DeviceExposureEndDate),
            device_exposure_end_datetime: bag.opt_datetime(OmopColumn::DeviceExposureEndDatetime),
            device_type_concept_id: bag.i64_or_zero(OmopColumn::DeviceTypeConceptId),
            unique_device_id: bag.string_or_empty(OmopColumn::UniqueDeviceId),
            visit_occurrence_id: bag.opt_i64(OmopColumn::VisitOccurrenceId),
            device_source_value: bag.string_or_empty(OmopColumn::DeviceSourceValue),
            mapping_rule: bag.string_or_empty(OmopColumn::MappingRule),
            source_file: String::new(),
        })
    }
}

/// All OMOP tables produced from one or more documents.
#[derive(Debug, Clone, Default)]
pub struct OmopData {
    pub persons: Vec<Person>,
    pub visit_occurrences: Vec<VisitOccurrence>,
    pub condition_occurrences: Vec<ConditionOccurrence>,
    pub drug_exposures: Vec<DrugExposure>,
    pub procedure_occurrences: Vec<ProcedureOccurrence>,
    pub measurements: Vec<Measurement>,
    pub observations: Vec<Observation>,
    pub device_exposures: Vec<DeviceExposure>,
}

impl OmopData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move all rows of `other` into this dataset.
    pub fn extend(&mut self, other: OmopData) {
        self.persons.extend(other.persons);
        self.visit_occurrences.extend(other.visit_occurrences);
        self.condition_occurrences.extend(other.condition_occurrences);
        self.drug_exposures.extend(other.drug_exposures);
        self.procedure_occurrences.extend(other.procedure_occurrences);
        self.measurements.extend(other.measurements);
        self.observations.extend(other.observations);
        self.device_exposures.extend(other.device_exposures);
    }

    /// Stamp the originating filename onto every row.
    pub fn set_source_file(&mut self, source_file: &str) {
        for row in &mut self.persons {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.visit_occurrences {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.condition_occurrences {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.drug_exposures {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.procedure_occurrences {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.measurements {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.observations {
            row.source_file = source_file.to_string();
        }
        for row in &mut self.device_exposures {
            row.source_file = source_file.to_string();
        }
    }

    pub fn total_records(&self) -> usize {
        self.persons.len()
            + self.visit_occurrences.len()
            + self.condition_occurrences.len()
            + self.drug_exposures.len()
            + self.procedure_occurrences.len()
            + self.measurements.len()
            + self.observations.len()
            + self.device_exposures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use chrono::NaiveDate;

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn condition_from_record() {
        let mut bag = FieldBag::new();
        bag.insert(OmopColumn::ConditionOccurrenceId, FieldValue::Int(900));
        bag.insert(OmopColumn::PersonId, FieldValue::Int(7));
        bag.insert(OmopColumn::ConditionConceptId, FieldValue::Int(44054006));
        bag.insert(OmopColumn::ConditionTypeConceptId, FieldValue::Int(32817));
        bag.insert(
            OmopColumn::ConditionStartDate,
            FieldValue::DateTime(midnight(2023, 4, 15)),
        );
        bag.insert(
            OmopColumn::MappingRule,
            FieldValue::Str("RuleMapper:problems_to_condition".to_string()),
        );

        let row = ConditionOccurrence::from_record(&bag).unwrap();
        assert_eq!(row.condition_occurrence_id, 900);
        assert_eq!(row.condition_concept_id, 44054006);
        assert_eq!(row.condition_type_concept_id, 32817);
        assert_eq!(row.condition_start_date, Some(midnight(2023, 4, 15)));
        assert_eq!(row.condition_end_date, None);
        assert!(row.mapping_rule.contains("problems_to_condition"));
    }

    #[test]
    fn missing_primary_key_is_distinct_error() {
        let mut bag = FieldBag::new();
        bag.insert(OmopColumn::PersonId, FieldValue::Int(7));
        assert_eq!(
            Measurement::from_record(&bag),
            Err(ModelError::MissingColumn(OmopColumn::MeasurementId))
        );
    }

    #[test]
    fn extend_and_stamp() {
        let mut data = OmopData::new();
        let mut other = OmopData::new();
        other.persons.push(Person::default());
        other.measurements.push(Measurement::default());
        other.set_source_file("doc1.xml");
        data.extend(other);
        assert_eq!(data.total_records(), 2);
        assert_eq!(data.persons[0].source_file, "doc1.xml");
    }
}
