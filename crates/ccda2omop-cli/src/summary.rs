//! Terminal summary of a conversion run.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};

use crate::pipeline::ConvertResult;

pub fn print_summary(result: &ConvertResult) {
    println!(
        "Converted {} file(s). Output: {}",
        result.files_processed,
        result.output_dir.display()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![header_cell("Table"), header_cell("Records")]);
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    let data = &result.data;
    let rows: [(&str, usize); 8] = [
        ("person", data.persons.len()),
        ("visit_occurrence", data.visit_occurrences.len()),
        ("condition_occurrence", data.condition_occurrences.len()),
        ("drug_exposure", data.drug_exposures.len()),
        ("procedure_occurrence", data.procedure_occurrences.len()),
        ("measurement", data.measurements.len()),
        ("observation", data.observations.len()),
        ("device_exposure", data.device_exposures.len()),
    ];
    for (name, count) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(data.total_records()).add_attribute(Attribute::Bold),
    ]);

    println!("{table}");
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}
