//! xlsx output for [`Report`]s.

use anyhow::{Context, Result};
use ladok_canvas_core::report::{Cell, Report, ReportRow};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tracing::info;

/// Largest magnitude a double holds without losing integer digits.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// `value` as an Excel number, or `None` when a double cannot hold it exactly.
pub fn exact_number(value: i64) -> Option<f64> {
    (value.unsigned_abs() <= MAX_EXACT_INTEGER).then(|| value as f64)
}

/// Union of column names over all rows, in first-seen order.
pub fn header(rows: &[ReportRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for (column, _) in row.cells() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.clone());
            }
        }
    }
    columns
}

/// Write `report` to `<dir>/<report.name>.xlsx` and return the path.
pub fn write_report(report: &Report, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("{}.xlsx", report.name));
    let columns = header(&report.rows);

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&report.sheet)?;

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, column_index(col)?, name, &bold)?;
    }
    for (r, row) in report.rows.iter().enumerate() {
        let r = u32::try_from(r + 1).context("Too many rows for a worksheet")?;
        for (col, name) in columns.iter().enumerate() {
            let col = column_index(col)?;
            match row.get(name) {
                Some(Cell::Text(text)) => {
                    worksheet.write_string(r, col, text)?;
                }
                Some(Cell::Int(value)) => match exact_number(*value) {
                    Some(number) => {
                        worksheet.write_number(r, col, number)?;
                    }
                    None => {
                        worksheet.write_string(r, col, value.to_string())?;
                    }
                },
                None => {}
            }
        }
    }

    workbook
        .save(&path)
        .with_context(|| format!("Failed to write spreadsheet {}", path.display()))?;
    info!(path = %path.display(), rows = report.rows.len(), columns = columns.len(), "Wrote spreadsheet");
    Ok(path)
}

fn column_index(col: usize) -> Result<u16> {
    u16::try_from(col).context("Too many columns for a worksheet")
}
