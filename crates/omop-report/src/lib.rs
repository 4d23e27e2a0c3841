#![deny(unsafe_code)]

//! Conversion metrics and report rendering.
//!
//! The mapper records counters into a [`ConversionReport`] while documents
//! are processed; the CLI renders it as markdown text or JSON at the end of
//! the run.

use std::collections::BTreeMap;
use std::io::{self, Write};

use omop_model::{OmopData, TableTarget};
use serde::Serialize;

/// Display order for the output tables.
const TABLE_ORDER: &[TableTarget] = &[
    TableTarget::Person,
    TableTarget::VisitOccurrence,
    TableTarget::ConditionOccurrence,
    TableTarget::DrugExposure,
    TableTarget::ProcedureOccurrence,
    TableTarget::Measurement,
    TableTarget::Observation,
    TableTarget::DeviceExposure,
];

/// Per-section entry and record counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionMetrics {
    pub entries_found: u64,
    pub records_created: u64,
    pub skipped: u64,
    /// Records created per target table name.
    pub target_tables: BTreeMap<String, u64>,
}

/// Vocabulary mapping quality counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VocabStats {
    pub codes_seen: u64,
    pub mapped_standard: u64,
    pub source_only: u64,
}

/// Metrics collected over one conversion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub documents_processed: u64,
    pub documents_with_errors: u64,
    pub entries_by_section: BTreeMap<String, SectionMetrics>,
    pub records_by_table: BTreeMap<String, u64>,
    pub concept_mappings: BTreeMap<String, VocabStats>,
    pub skipped_entries: BTreeMap<String, u64>,
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, has_error: bool) {
        self.documents_processed += 1;
        if has_error {
            self.documents_with_errors += 1;
        }
    }

    /// Record an entry found in a clinical section.
    pub fn add_section_entry(&mut self, section: &str) {
        self.section_mut(section).entries_found += 1;
    }

    /// Record a created output record and its target table.
    pub fn add_section_record(&mut self, section: &str, table: TableTarget) {
        let metrics = self.section_mut(section);
        metrics.records_created += 1;
        *metrics
            .target_tables
            .entry(table.as_str().to_string())
            .or_default() += 1;
    }

    /// Record an entry that produced no output, with the reason.
    pub fn add_skipped(&mut self, section: &str, reason: &str) {
        self.section_mut(section).skipped += 1;
        *self.skipped_entries.entry(reason.to_string()).or_default() += 1;
    }

    /// Record one vocabulary resolution attempt.
    pub fn add_concept_mapping(&mut self, vocabulary_id: &str, mapped_to_standard: bool) {
        let stats = self
            .concept_mappings
            .entry(vocabulary_id.to_string())
            .or_default();
        stats.codes_seen += 1;
        if mapped_to_standard {
            stats.mapped_standard += 1;
        } else {
            stats.source_only += 1;
        }
    }

    /// Fill the per-table record counts from the final dataset.
    pub fn tally_tables(&mut self, data: &OmopData) {
        let counts: &[(TableTarget, usize)] = &[
            (TableTarget::Person, data.persons.len()),
            (TableTarget::VisitOccurrence, data.visit_occurrences.len()),
            (
                TableTarget::ConditionOccurrence,
                data.condition_occurrences.len(),
            ),
            (TableTarget::DrugExposure, data.drug_exposures.len()),
            (
                TableTarget::ProcedureOccurrence,
                data.procedure_occurrences.len(),
            ),
            (TableTarget::Measurement, data.measurements.len()),
            (TableTarget::Observation, data.observations.len()),
            (TableTarget::DeviceExposure, data.device_exposures.len()),
        ];
        for (table, count) in counts {
            self.records_by_table
                .insert(table.as_str().to_string(), *count as u64);
        }
    }

    /// Render the report as markdown text.
    pub fn write_text(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "# C-CDA to OMOP Conversion Report")?;
        writeln!(w)?;

        writeln!(w, "## Document Summary")?;
        writeln!(w)?;
        writeln!(w, "| Metric | Value |")?;
        writeln!(w, "|--------|-------|")?;
        writeln!(w, "| Documents Processed | {} |", self.documents_processed)?;
        writeln!(
            w,
            "| Documents with Errors | {} |",
            self.documents_with_errors
        )?;
        if self.documents_processed > 0 {
            let ok = self.documents_processed - self.documents_with_errors;
            let rate = ok as f64 / self.documents_processed as f64 * 100.0;
            writeln!(w, "| Success Rate | {rate:.1}% |")?;
        }
        writeln!(w)?;

        writeln!(w, "## Records Created by OMOP Table")?;
        writeln!(w)?;
        writeln!(w, "| Table | Records |")?;
        writeln!(w, "|-------|--------:|")?;
        let mut total = 0;
        for table in TABLE_ORDER {
            let count = self
                .records_by_table
                .get(table.as_str())
                .copied()
                .unwrap_or(0);
            total += count;
            writeln!(w, "| {} | {count} |", table.as_str())?;
        }
        writeln!(w, "| **Total** | **{total}** |")?;
        writeln!(w)?;

        if !self.entries_by_section.is_empty() {
            writeln!(w, "## Section to Table Mapping")?;
            writeln!(w)?;
            writeln!(w, "| Section | Entries | Records | Skipped | Target Tables |")?;
            writeln!(w, "|---------|--------:|--------:|--------:|---------------|")?;
            for (section, metrics) in &self.entries_by_section {
                writeln!(
                    w,
                    "| {section} | {} | {} | {} | {} |",
                    metrics.entries_found,
                    metrics.records_created,
                    metrics.skipped,
                    format_target_tables(&metrics.target_tables)
                )?;
            }
            writeln!(w)?;
        }

        if !self.concept_mappings.is_empty() {
            writeln!(w, "## Concept Mapping Quality")?;
            writeln!(w)?;
            writeln!(
                w,
                "| Vocabulary | Codes Seen | Mapped Standard | Source Only | Rate |"
            )?;
            writeln!(
                w,
                "|------------|-----------:|----------------:|------------:|-----:|"
            )?;
            for (vocab, stats) in &self.concept_mappings {
                let rate = if stats.codes_seen > 0 {
                    stats.mapped_standard as f64 / stats.codes_seen as f64 * 100.0
                } else {
                    0.0
                };
                writeln!(
                    w,
                    "| {vocab} | {} | {} | {} | {rate:.1}% |",
                    stats.codes_seen, stats.mapped_standard, stats.source_only
                )?;
            }
            writeln!(w)?;
        }

        if !self.skipped_entries.is_empty() {
            writeln!(w, "## Skipped Entries")?;
            writeln!(w)?;
            writeln!(w, "| Reason | Count |")?;
            writeln!(w, "|--------|------:|")?;
            for (reason, count) in &self.skipped_entries {
                writeln!(w, "| {reason} | {count} |")?;
            }
            writeln!(w)?;
        }

        Ok(())
    }

    /// Render the report as pretty-printed JSON.
    pub fn write_json(&self, w: &mut impl Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self)?;
        writeln!(w)
    }

    fn section_mut(&mut self, section: &str) -> &mut SectionMetrics {
        self.entries_by_section
            .entry(section.to_string())
            .or_default()
    }
}

fn format_target_tables(tables: &BTreeMap<String, u64>) -> String {
    if tables.is_empty() {
        return "-".to_string();
    }
    tables
        .iter()
        .map(|(table, count)| format!("{table}({count})"))
        .collect::<Vec<_>>()
        .join(", ")
}
