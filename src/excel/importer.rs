//! Excel importer: .xlsx → [`Workbook`] with every cell as text

use crate::error::{XtractError, XtractResult};
use crate::types::{SheetTable, Workbook};
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::Timelike;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads every sheet of a spreadsheet, in workbook order.
pub struct ExcelImporter {
    path: PathBuf,
}

impl ExcelImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Import the spreadsheet. The workbook is named after the file stem.
    pub fn import(&self) -> XtractResult<Workbook> {
        let mut source = open_workbook_auto(&self.path).map_err(|e| {
            XtractError::Import(format!(
                "Failed to open spreadsheet {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let name = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut workbook = Workbook::new(name);

        for sheet_name in source.sheet_names() {
            let range = source.worksheet_range(&sheet_name).map_err(|e| {
                XtractError::Import(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?;
            let table = sheet_from_range(&sheet_name, &range);
            debug!(
                "Imported sheet '{}' ({} rows, {} columns)",
                sheet_name,
                table.row_count(),
                table.column_count()
            );
            workbook.add_sheet(table);
        }

        Ok(workbook)
    }
}

/// First row names the columns; every later row is data.
fn sheet_from_range(sheet_name: &str, range: &Range<Data>) -> SheetTable {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(idx, cell)| match cell_to_text(cell) {
                text if text.trim().is_empty() => format!("col_{}", idx),
                text => text,
            })
            .collect(),
        None => return SheetTable::new(sheet_name),
    };

    SheetTable::with_rows(
        sheet_name,
        columns,
        rows.map(|row| row.iter().map(cell_to_text).collect()),
    )
}

/// Render a cell the way it reads in the spreadsheet.
pub fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_to_text(*f),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) if dt.is_duration() => float_to_text(dt.as_f64()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 => {
                value.format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_to_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// Integral values print without a fractional part.
fn float_to_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
