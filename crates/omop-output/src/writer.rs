//! One CSV file per OMOP table.
//!
//! Every file carries the full CDM 5.3 column set in table order; columns the
//! converter never populates (providers, care sites, visit details) are
//! written empty so the output loads into a standard CDM schema unchanged.
//! Date columns holding a midnight timestamp are rendered as plain dates.

use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDateTime, Timelike};
use omop_model::{
    ConditionOccurrence, DeviceExposure, DrugExposure, Measurement, Observation, OmopData, Person,
    ProcedureOccurrence, VisitOccurrence,
};
use tracing::info;

use crate::error::OutputError;

/// Writes an [`OmopData`] set to a directory of CSV files.
pub struct CsvWriter {
    output_dir: PathBuf,
}

impl CsvWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write all eight tables, creating the output directory if needed.
    pub fn write_all(&self, data: &OmopData) -> Result<(), OutputError> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| OutputError::create_dir(&self.output_dir, e))?;

        self.write_table("person.csv", PERSON_COLUMNS, &data.persons, person_row)?;
        self.write_table(
            "visit_occurrence.csv",
            VISIT_OCCURRENCE_COLUMNS,
            &data.visit_occurrences,
            visit_occurrence_row,
        )?;
        self.write_table(
            "condition_occurrence.csv",
            CONDITION_OCCURRENCE_COLUMNS,
            &data.condition_occurrences,
            condition_occurrence_row,
        )?;
        self.write_table(
            "drug_exposure.csv",
            DRUG_EXPOSURE_COLUMNS,
            &data.drug_exposures,
            drug_exposure_row,
        )?;
        self.write_table(
            "procedure_occurrence.csv",
            PROCEDURE_OCCURRENCE_COLUMNS,
            &data.procedure_occurrences,
            procedure_occurrence_row,
        )?;
        self.write_table(
            "measurement.csv",
            MEASUREMENT_COLUMNS,
            &data.measurements,
            measurement_row,
        )?;
        self.write_table(
            "observation.csv",
            OBSERVATION_COLUMNS,
            &data.observations,
            observation_row,
        )?;
        self.write_table(
            "device_exposure.csv",
            DEVICE_EXPOSURE_COLUMNS,
            &data.device_exposures,
            device_exposure_row,
        )?;

        info!(
            records = data.total_records(),
            dir = %self.output_dir.display(),
            "wrote OMOP tables"
        );
        Ok(())
    }

    fn write_table<T>(
        &self,
        filename: &str,
        columns: &[&str],
        rows: &[T],
        to_row: fn(&T) -> Vec<String>,
    ) -> Result<(), OutputError> {
        let path = self.output_dir.join(filename);
        let mut writer = csv::Writer::from_path(&path).map_err(|e| OutputError::csv(&path, e))?;
        writer
            .write_record(columns)
            .map_err(|e| OutputError::csv(&path, e))?;
        for row in rows {
            writer
                .write_record(to_row(row))
                .map_err(|e| OutputError::csv(&path, e))?;
        }
        writer
            .flush()
            .map_err(|e| OutputError::csv(&path, csv::Error::from(e)))?;
        Ok(())
    }
}

fn fmt_datetime(value: Option<NaiveDateTime>) -> String {
    match value {
        None => String::new(),
        Some(dt) if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 => {
            dt.format("%Y-%m-%d").to_string()
        }
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn fmt_opt_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_opt_u32(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_opt_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

const PERSON_COLUMNS: &[&str] = &[
    "person_id",
    "gender_concept_id",
    "year_of_birth",
    "month_of_birth",
    "day_of_birth",
    "birth_datetime",
    "race_concept_id",
    "ethnicity_concept_id",
    "location_id",
    "provider_id",
    "care_site_id",
    "person_source_value",
    "gender_source_value",
    "gender_source_concept_id",
    "race_source_value",
    "race_source_concept_id",
    "ethnicity_source_value",
    "ethnicity_source_concept_id",
    "mapping_rule",
    "source_file",
];

fn person_row(p: &Person) -> Vec<String> {
    vec![
        p.person_id.to_string(),
        p.gender_concept_id.to_string(),
        p.year_of_birth.to_string(),
        fmt_opt_u32(p.month_of_birth),
        fmt_opt_u32(p.day_of_birth),
        fmt_datetime(p.birth_datetime),
        p.race_concept_id.to_string(),
        p.ethnicity_concept_id.to_string(),
        String::new(), // location_id
        String::new(), // provider_id
        String::new(), // care_site_id
        p.person_source_value.clone(),
        p.gender_source_value.clone(),
        String::new(), // gender_source_concept_id
        p.race_source_value.clone(),
        String::new(), // race_source_concept_id
        p.ethnicity_source_value.clone(),
        String::new(), // ethnicity_source_concept_id
        p.mapping_rule.clone(),
        p.source_file.clone(),
    ]
}

const VISIT_OCCURRENCE_COLUMNS: &[&str] = &[
    "visit_occurrence_id",
    "person_id",
    "visit_concept_id",
    "visit_start_date",
    "visit_start_datetime",
    "visit_end_date",
    "visit_end_datetime",
    "visit_type_concept_id",
    "provider_id",
    "care_site_id",
    "visit_source_value",
    "visit_source_concept_id",
    "admitted_from_concept_id",
    "admitted_from_source_value",
    "discharge_to_concept_id",
    "discharge_to_source_value",
    "preceding_visit_occurrence_id",
    "mapping_rule",
    "source_file",
];

fn visit_occurrence_row(v: &VisitOccurrence) -> Vec<String> {
    vec![
        v.visit_occurrence_id.to_string(),
        v.person_id.to_string(),
        v.visit_concept_id.to_string(),
        fmt_datetime(v.visit_start_date),
        fmt_datetime(v.visit_start_datetime),
        fmt_datetime(v.visit_end_date),
        fmt_datetime(v.visit_end_datetime),
        v.visit_type_concept_id.to_string(),
        String::new(), // provider_id
        String::new(), // care_site_id
        v.visit_source_value.clone(),
        String::new(), // visit_source_concept_id
        String::new(), // admitted_from_concept_id
        String::new(), // admitted_from_source_value
        String::new(), // discharge_to_concept_id
        String::new(), // discharge_to_source_value
        String::new(), // preceding_visit_occurrence_id
        v.mapping_rule.clone(),
        v.source_file.clone(),
    ]
}

const CONDITION_OCCURRENCE_COLUMNS: &[&str] = &[
    "condition_occurrence_id",
    "person_id",
    "condition_concept_id",
    "condition_start_date",
    "condition_start_datetime",
    "condition_end_date",
    "condition_end_datetime",
    "condition_type_concept_id",
    "condition_status_concept_id",
    "stop_reason",
    "provider_id",
    "visit_occurrence_id",
    "visit_detail_id",
    "condition_source_value",
    "condition_source_concept_id",
    "condition_status_source_value",
    "mapping_rule",
    "source_file",
];

fn condition_occurrence_row(c: &ConditionOccurrence) -> Vec<String> {
    vec![
        c.condition_occurrence_id.to_string(),
        c.person_id.to_string(),
        c.condition_concept_id.to_string(),
        fmt_datetime(c.condition_start_date),
        fmt_datetime(c.condition_start_datetime),
        fmt_datetime(c.condition_end_date),
        fmt_datetime(c.condition_end_datetime),
        c.condition_type_concept_id.to_string(),
        String::new(), // condition_status_concept_id
        String::new(), // stop_reason
        String::new(), // provider_id
        fmt_opt_i64(c.visit_occurrence_id),
        String::new(), // visit_detail_id
        c.condition_source_value.clone(),
        String::new(), // condition_source_concept_id
        c.condition_status_source_value.clone(),
        c.mapping_rule.clone(),
        c.source_file.clone(),
    ]
}

const DRUG_EXPOSURE_COLUMNS: &[&str] = &[
    "drug_exposure_id",
    "person_id",
    "drug_concept_id",
    "drug_exposure_start_date",
    "drug_exposure_start_datetime",
    "drug_exposure_end_date",
    "drug_exposure_end_datetime",
    "verbatim_end_date",
    "drug_type_concept_id",
    "stop_reason",
    "refills",
    "quantity",
    "days_supply",
    "sig",
    "route_concept_id",
    "lot_number",
    "provider_id",
    "visit_occurrence_id",
    "visit_detail_id",
    "drug_source_value",
    "drug_source_concept_id",
    "route_source_value",
    "dose_unit_source_value",
    "mapping_rule",
    "source_file",
];

fn drug_exposure_row(d: &DrugExposure) -> Vec<String> {
    vec![
        d.drug_exposure_id.to_string(),
        d.person_id.to_string(),
        d.drug_concept_id.to_string(),
        fmt_datetime(d.drug_exposure_start_date),
        fmt_datetime(d.drug_exposure_start_datetime),
        fmt_datetime(d.drug_exposure_end_date),
        fmt_datetime(d.drug_exposure_end_datetime),
        String::new(), // verbatim_end_date
        d.drug_type_concept_id.to_string(),
        String::new(), // stop_reason
        fmt_opt_i64(d.refills),
        fmt_opt_f64(d.quantity),
        fmt_opt_i64(d.days_supply),
        d.sig.clone(),
        fmt_opt_i64(d.route_concept_id),
        d.lot_number.clone(),
        String::new(), // provider_id
        fmt_opt_i64(d.visit_occurrence_id),
        String::new(), // visit_detail_id
        d.drug_source_value.clone(),
        String::new(), // drug_source_concept_id
        d.route_source_value.clone(),
        d.dose_unit_source_value.clone(),
        d.mapping_rule.clone(),
        d.source_file.clone(),
    ]
}

const PROCEDURE_OCCURRENCE_COLUMNS: &[&str] = &[
    "procedure_occurrence_id",
    "person_id",
    "procedure_concept_id",
    "procedure_date",
    "procedure_datetime",
    "procedure_type_concept_id",
    "modifier_concept_id",
    "quantity",
    "provider_id",
    "visit_occurrence_id",
    "visit_detail_id",
    "procedure_source_value",
    "procedure_source_concept_id",
    "modifier_source_value",
    "mapping_rule",
    "source_file",
];

fn procedure_occurrence_row(p: &ProcedureOccurrence) -> Vec<String> {
    vec![
        p.procedure_occurrence_id.to_string(),
        p.person_id.to_string(),
        p.procedure_concept_id.to_string(),
        fmt_datetime(p.procedure_date),
        fmt_datetime(p.procedure_datetime),
        p.procedure_type_concept_id.to_string(),
        String::new(), // modifier_concept_id
        String::new(), // quantity
        String::new(), // provider_id
        fmt_opt_i64(p.visit_occurrence_id),
        String::new(), // visit_detail_id
        p.procedure_source_value.clone(),
        String::new(), // procedure_source_concept_id
        p.modifier_source_value.clone(),
        p.mapping_rule.clone(),
        p.source_file.clone(),
    ]
}

const MEASUREMENT_COLUMNS: &[&str] = &[
    "measurement_id",
    "person_id",
    "measurement_concept_id",
    "measurement_date",
    "measurement_datetime",
    "measurement_time",
    "measurement_type_concept_id",
    "operator_concept_id",
    "value_as_number",
    "value_as_concept_id",
    "unit_concept_id",
    "range_low",
    "range_high",
    "provider_id",
    "visit_occurrence_id",
    "visit_detail_id",
    "measurement_source_value",
    "measurement_source_concept_id",
    "unit_source_value",
    "value_source_value",
    "mapping_rule",
    "source_file",
];

fn measurement_row(m: &Measurement) -> Vec<String> {
    vec![
        m.measurement_id.to_string(),
        m.person_id.to_string(),
        m.measurement_concept_id.to_string(),
        fmt_datetime(m.measurement_date),
        fmt_datetime(m.measurement_datetime),
        String::new(), // measurement_time
        m.measurement_type_concept_id.to_string(),
        String::new(), // operator_concept_id
        fmt_opt_f64(m.value_as_number),
        fmt_opt_i64(m.value_as_concept_id),
        fmt_opt_i64(m.unit_concept_id),
        fmt_opt_f64(m.range_low),
        fmt_opt_f64(m.range_high),
        String::new(), // provider_id
        fmt_opt_i64(m.visit_occurrence_id),
        String::new(), // visit_detail_id
        m.measurement_source_value.clone(),
        String::new(), // measurement_source_concept_id
        m.unit_source_value.clone(),
        m.value_source_value.clone(),
        m.mapping_rule.clone(),
        m.source_file.clone(),
    ]
}

const OBSERVATION_COLUMNS: &[&str] = &[
    "observation_id",
    "person_id",
    "observation_concept_id",
    "observation_date",
    "observation_datetime",
    "observation_type_concept_id",
    "value_as_number",
    "value_as_string",
    "value_as_concept_id",
    "qualifier_concept_id",
    "unit_concept_id",
    "provider_id",
    "visit_occurrence_id",
    "visit_detail_id",
    "observation_source_value",
    "observation_source_concept_id",
    "unit_source_value",
    "qualifier_source_value",
    "mapping_rule",
    "source_file",
];

fn observation_row(o: &Observation) -> Vec<String> {
    vec![
        o.observation_id.to_string(),
        o.person_id.to_string(),
        o.observation_concept_id.to_string(),
        fmt_datetime(o.observation_date),
        fmt_datetime(o.observation_datetime),
        o.observation_type_concept_id.to_string(),
        fmt_opt_f64(o.value_as_number),
        o.value_as_string.clone(),
        fmt_opt_i64(o.value_as_concept_id),
        String::new(), // qualifier_concept_id
        String::new(), // unit_concept_id
        String::new(), // provider_id
        fmt_opt_i64(o.visit_occurrence_id),
        String::new(), // visit_detail_id
        o.observation_source_value.clone(),
        String::new(), // observation_source_concept_id
        o.unit_source_value.clone(),
        o.qualifier_source_value.clone(),
        o.mapping_rule.clone(),
        o.source_file.clone(),
    ]
}

const DEVICE_EXPOSURE_COLUMNS: &[&str] = &[
    "device_exposure_id",
    "person_id",
    "device_concept_id",
    "device_exposure_start_date",
    "device_exposure_start_datetime",
    "device_exposure_end_date",
    "device_exposure_end_datetime",
    "device_type_concept_id",
    "unique_device_id",
    "quantity",
    "provider_id",
    "visit_occurrence_id",
    "visit_detail_id",
    "device_source_value",
    "device_source_concept_id",
    "mapping_rule",
    "source_file",
];

fn device_exposure_row(d: &DeviceExposure) -> Vec<String> {
    vec![
        d.device_exposure_id.to_string(),
        d.person_id.to_string(),
        d.device_concept_id.to_string(),
        fmt_datetime(d.device_exposure_start_date),
        fmt_datetime(d.device_exposure_start_datetime),
        fmt_datetime(d.device_exposure_end_date),
        fmt_datetime(d.device_exposure_end_datetime),
        d.device_type_concept_id.to_string(),
        d.unique_device_id.clone(),
        String::new(), // quantity
        String::new(), // provider_id
        fmt_opt_i64(d.visit_occurrence_id),
        String::new(), // visit_detail_id
        d.device_source_value.clone(),
        String::new(), // device_source_concept_id
        d.mapping_rule.clone(),
        d.source_file.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn datetime_formatting_drops_midnight_time() {
        assert_eq!(fmt_datetime(Some(dt(2023, 4, 15, 0, 0, 0))), "2023-04-15");
        assert_eq!(
            fmt_datetime(Some(dt(2023, 4, 15, 9, 30, 0))),
            "2023-04-15 09:30:00"
        );
        assert_eq!(fmt_datetime(None), "");
    }

    #[test]
    fn writes_all_tables_with_full_headers() {
        let dir = std::env::temp_dir().join("omop-output-all");
        let _ = std::fs::remove_dir_all(&dir);

        let mut data = OmopData::new();
        data.persons.push(Person {
            person_id: 1,
            gender_concept_id: 8532,
            year_of_birth: 1980,
            month_of_birth: Some(12),
            day_of_birth: Some(15),
            birth_datetime: Some(dt(1980, 12, 15, 0, 0, 0)),
            person_source_value: "PT-1".to_string(),
            mapping_rule: "RuleMapper:Person".to_string(),
            source_file: "doc1.xml".to_string(),
            ..Person::default()
        });
        data.condition_occurrences.push(ConditionOccurrence {
            condition_occurrence_id: 900,
            person_id: 1,
            condition_concept_id: 44054006,
            condition_start_date: Some(dt(2023, 4, 15, 0, 0, 0)),
            condition_type_concept_id: 32817,
            ..ConditionOccurrence::default()
        });

        CsvWriter::new(&dir).write_all(&data).unwrap();

        for file in [
            "person.csv",
            "visit_occurrence.csv",
            "condition_occurrence.csv",
            "drug_exposure.csv",
            "procedure_occurrence.csv",
            "measurement.csv",
            "observation.csv",
            "device_exposure.csv",
        ] {
            assert!(dir.join(file).exists(), "{file} missing");
        }

        let person = std::fs::read_to_string(dir.join("person.csv")).unwrap();
        let mut lines = person.lines();
        assert_eq!(lines.next().unwrap(), PERSON_COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,8532,1980,12,15,1980-12-15,"));
        assert!(row.ends_with("RuleMapper:Person,doc1.xml"));

        let cond = std::fs::read_to_string(dir.join("condition_occurrence.csv")).unwrap();
        assert!(cond.contains("900,1,44054006,2023-04-15,"));

        // Empty tables still get their header line.
        let obs = std::fs::read_to_string(dir.join("observation.csv")).unwrap();
        assert_eq!(obs.trim(), OBSERVATION_COLUMNS.join(","));
    }

    #[test]
    fn optional_numeric_columns_render_empty() {
        assert_eq!(fmt_opt_i64(None), "");
        assert_eq!(fmt_opt_i64(Some(42)), "42");
        assert_eq!(fmt_opt_f64(Some(2.5)), "2.5");
        assert_eq!(fmt_opt_f64(None), "");
    }
}
