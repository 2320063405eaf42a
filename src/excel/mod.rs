//! Spreadsheet import/export
//!
//! - Import: Excel (.xlsx) → [`Workbook`](crate::types::Workbook), all cells as text
//! - Export: [`Workbook`](crate::types::Workbook) → Excel (.xlsx), all cells as strings

mod exporter;
mod importer;

pub use exporter::ExcelExporter;
pub use importer::{cell_to_text, ExcelImporter};
