//! Terminal and JSON rendering of command results.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use serde::Serialize;

use chbridge_model::{CatalogColumn, ColumnSpec, IngestionRequest, IngestionResult, PreviewResult};

pub fn tables_table(tables: &[String]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Table")]);
    apply_table_style(&mut table);
    for name in tables {
        table.add_row(vec![Cell::new(name)]);
    }
    table
}

pub fn catalog_table(columns: &[CatalogColumn]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Catalog type"),
        header_cell("Transfer type"),
    ]);
    apply_table_style(&mut table);
    for column in columns {
        table.add_row(vec![
            Cell::new(&column.name),
            Cell::new(&column.raw_type).fg(Color::DarkGrey),
            Cell::new(column.transfer_type.as_str()),
        ]);
    }
    table
}

pub fn file_columns_table(columns: &[ColumnSpec]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("#"), header_cell("Column"), header_cell("Transfer type")]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (index, column) in columns.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&column.name),
            Cell::new(column.transfer_type.as_str()),
        ]);
    }
    table
}

/// Sample rows exactly as they would be written; empty cells stay empty.
pub fn preview_table(preview: &PreviewResult) -> Table {
    let mut table = Table::new();
    table.set_header(preview.headers.iter().map(|h| header_cell(h)).collect::<Vec<_>>());
    apply_table_style(&mut table);
    for row in &preview.rows {
        table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
    }
    table
}

/// One-line summary of a finished transfer.
#[must_use]
pub fn transfer_summary(request: &IngestionRequest, result: &IngestionResult) -> String {
    let noun = if result.record_count == 1 { "record" } else { "records" };
    format!(
        "Transferred {} {noun} from {} {} to {} {}",
        result.record_count, request.source, request.table, request.target, request.output
    )
}

/// Pretty-printed JSON for `--json` output.
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
