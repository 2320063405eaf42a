//! Excel exporter: [`Workbook`] → .xlsx

use crate::error::{XtractError, XtractResult};
use crate::types::{SheetTable, Workbook};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};
use std::path::Path;

/// Writes one worksheet per sheet, in order. Every cell is written as a
/// string so values such as `007` survive unchanged.
pub struct ExcelExporter<'a> {
    workbook: &'a Workbook,
}

impl<'a> ExcelExporter<'a> {
    pub fn new(workbook: &'a Workbook) -> Self {
        Self { workbook }
    }

    /// Export the workbook to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> XtractResult<()> {
        let mut xlsx = XlsxWorkbook::new();

        for sheet in &self.workbook.sheets {
            let worksheet = xlsx.add_worksheet();
            worksheet.set_name(&sheet.name).map_err(|e| {
                XtractError::Export(format!("Invalid worksheet name '{}': {}", sheet.name, e))
            })?;
            write_sheet(worksheet, sheet)?;
        }

        xlsx.save(output_path)
            .map_err(|e| XtractError::Export(format!("Failed to save Excel file: {}", e)))?;
        Ok(())
    }
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &SheetTable) -> XtractResult<()> {
    write_row(worksheet, &sheet.name, 0, &sheet.columns)?;
    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_idx = u32::try_from(idx + 1).map_err(|_| {
            XtractError::Export(format!("Sheet '{}' has too many rows", sheet.name))
        })?;
        write_row(worksheet, &sheet.name, row_idx, row)?;
    }
    Ok(())
}

fn write_row(
    worksheet: &mut Worksheet,
    sheet_name: &str,
    row: u32,
    cells: &[String],
) -> XtractResult<()> {
    for (col, text) in cells.iter().enumerate() {
        if text.is_empty() {
            continue;
        }
        let col = u16::try_from(col).map_err(|_| {
            XtractError::Export(format!("Sheet '{}' has too many columns", sheet_name))
        })?;
        worksheet.write_string(row, col, text).map_err(|e| {
            XtractError::Export(format!(
                "Failed to write cell ({}, {}) of sheet '{}': {}",
                row + 1,
                col + 1,
                sheet_name,
                e
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use tempfile::TempDir;

    #[test]
    fn test_export_writes_numeric_text_as_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.xlsx");
        let mut workbook = Workbook::new("out");
        workbook.add_sheet(SheetTable::with_rows(
            "HOLDING",
            vec!["Account".to_string(), "Quantity".to_string()],
            vec![vec!["007".to_string(), "10".to_string()]],
        ));
        ExcelExporter::new(&workbook).export(&path).unwrap();

        let mut xlsx: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(xlsx.sheet_names(), vec!["HOLDING".to_string()]);
        let range = xlsx.worksheet_range("HOLDING").unwrap();
        assert_eq!(range.get((1, 0)), Some(&Data::String("007".to_string())));
        assert_eq!(range.get((1, 1)), Some(&Data::String("10".to_string())));
    }

    #[test]
    fn test_export_rejects_invalid_sheet_name() {
        let dir = TempDir::new().unwrap();
        let mut workbook = Workbook::new("out");
        workbook.add_sheet(SheetTable::new("bad[name]"));
        let err = ExcelExporter::new(&workbook)
            .export(&dir.path().join("out.xlsx"))
            .unwrap_err();
        assert!(matches!(err, XtractError::Export(_)));
    }
}
