//! Encoder: workbook → flat files → archive

use super::flat_file::{self, FlatFile, RecordKind};
use super::{move_into_place, write_archive};
use crate::error::{XtractError, XtractResult};
use crate::naming::NamingGrammar;
use crate::paths::unique_path;
use crate::scratch::ScratchArea;
use crate::template::Template;
use crate::tokens::{FormatString, TokenContext, FILE_NAME, ROW_COUNT, SHEET_NAME};
use crate::types::{SheetTable, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One sheet written into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSheet {
    pub sheet_name: String,
    pub logical_name: String,
    pub file_name: String,
    pub row_count: usize,
    pub column_count: usize,
}

/// Result of an encode run.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub archive_path: PathBuf,
    pub timestamp: String,
    pub request_id: String,
    pub sheets: Vec<EncodedSheet>,
    pub skipped_sheets: Vec<String>,
}

/// Flat files built in memory, before anything is written.
#[derive(Debug, Clone, Default)]
pub struct EncodedBundle {
    pub files: Vec<FlatFile>,
    pub sheets: Vec<EncodedSheet>,
    pub skipped_sheets: Vec<String>,
}

/// Compiled pieces of a template shared by every sheet of a run.
struct RunPlan {
    delimiter: u8,
    files: NamingGrammar,
    header: FormatString,
    trailer: FormatString,
}

pub struct Encoder<'a> {
    name: &'a str,
    template: &'a Template,
}

impl<'a> Encoder<'a> {
    pub fn new(name: &'a str, template: &'a Template) -> Self {
        Self { name, template }
    }

    /// Encode `workbook` into a new archive in `out_dir`.
    pub fn encode(&self, workbook: &Workbook, out_dir: &Path) -> XtractResult<EncodeReport> {
        self.encode_with(workbook, out_dir, TokenContext::for_run())
    }

    /// Encode with caller-supplied run tokens (timestamp, request id).
    pub fn encode_with(
        &self,
        workbook: &Workbook,
        out_dir: &Path,
        run: TokenContext,
    ) -> XtractResult<EncodeReport> {
        let ctx = run.with(FILE_NAME, &workbook.name);
        let bundle = self.build(workbook, &ctx)?;

        let archives = self.template.archive_grammar()?;
        let archive_name = archives.render(&ctx)?;

        fs::create_dir_all(out_dir)
            .map_err(|e| XtractError::io_at("create output directory", out_dir, e))?;
        let scratch = ScratchArea::new_in(out_dir)?;

        let mut members = Vec::with_capacity(bundle.files.len());
        for file in &bundle.files {
            let staged = scratch.join(&file.file_name);
            fs::write(&staged, file.to_text())
                .map_err(|e| XtractError::io_at("write flat file", &staged, e))?;
            members.push((file.file_name.clone(), staged));
        }

        let staged_archive = scratch.join(&archive_name);
        write_archive(&staged_archive, &members)?;

        let archive_path = unique_path(&out_dir.join(&archive_name));
        move_into_place(&staged_archive, &archive_path)?;
        info!(
            "Encoded {} sheet(s) into {}",
            bundle.files.len(),
            archive_path.display()
        );

        Ok(EncodeReport {
            archive_path,
            timestamp: ctx.timestamp().unwrap_or_default().to_string(),
            request_id: ctx.request_id().unwrap_or_default().to_string(),
            sheets: bundle.sheets,
            skipped_sheets: bundle.skipped_sheets,
        })
    }

    /// Build every flat file in memory. Nothing touches disk, so a failure
    /// here leaves no trace.
    pub fn build(&self, workbook: &Workbook, ctx: &TokenContext) -> XtractResult<EncodedBundle> {
        self.template.validate(self.name)?;
        let plan = RunPlan {
            delimiter: self.template.delimiter_byte().ok_or_else(|| {
                XtractError::InvalidTemplate {
                    name: self.name.to_string(),
                    reason: "delimiter is not a single byte".to_string(),
                }
            })?,
            files: self.template.file_grammar()?,
            header: FormatString::parse(&self.template.header_format)?,
            trailer: FormatString::parse(&self.template.trailer_format)?,
        };

        let mut bundle = EncodedBundle::default();
        for sheet in &workbook.sheets {
            if sheet.is_cache_sheet() {
                debug!("Skipping cache sheet '{}'", sheet.name);
                bundle.skipped_sheets.push(sheet.name.clone());
                continue;
            }

            let (file, summary) = self.build_flat_file(sheet, ctx, &plan)?;
            match bundle
                .files
                .iter()
                .position(|f| f.file_name == file.file_name)
            {
                Some(pos) => {
                    warn!(
                        "Sheet '{}' resolves to '{}' again; the later sheet replaces the earlier one",
                        sheet.name, file.file_name
                    );
                    bundle.files[pos] = file;
                    bundle.sheets[pos] = summary;
                }
                None => {
                    bundle.files.push(file);
                    bundle.sheets.push(summary);
                }
            }
        }

        if bundle.files.is_empty() {
            return Err(XtractError::NoData(format!(
                "workbook '{}' has no sheets to encode",
                workbook.name
            )));
        }
        Ok(bundle)
    }

    fn build_flat_file(
        &self,
        sheet: &SheetTable,
        ctx: &TokenContext,
        plan: &RunPlan,
    ) -> XtractResult<(FlatFile, EncodedSheet)> {
        let mut table = sheet.clone();
        table.rename_columns(&self.template.column_mappings);
        table.trim_cells();

        let logical = self.template.logical_sheet_name(&sheet.name).to_string();
        let row_count = table.row_count();
        let sheet_ctx = ctx.with(SHEET_NAME, &logical).with(ROW_COUNT, row_count);

        let header = flat_file::record_lines(
            &plan.header.render(&sheet_ctx)?,
            self.template.header_record_count,
            RecordKind::Header,
            &logical,
        )?;
        let trailer = flat_file::record_lines(
            &plan.trailer.render(&sheet_ctx)?,
            self.template.trailer_record_count,
            RecordKind::Trailer,
            &logical,
        )?;
        if table.widest_row() > table.column_count() {
            return Err(XtractError::Framing {
                sheet: logical,
                row: 0,
                column: table.column_count() + 1,
                reason: format!(
                    "a row has {} cells but only {} column(s) are named",
                    table.widest_row(),
                    table.column_count()
                ),
            });
        }
        let body = flat_file::write_body(&table, plan.delimiter)?;

        let file_name = plan.files.render(&sheet_ctx)?;
        let parsed = plan.files.parse(&file_name)?;
        if parsed.sheet_name() != Some(logical.as_str()) {
            return Err(XtractError::NamingGrammar {
                name: file_name,
                reason: format!("sheet name '{}' cannot be recovered from the file name", logical),
            });
        }

        debug!(
            "Sheet '{}' → {} ({} rows, {} columns)",
            sheet.name,
            file_name,
            row_count,
            table.column_count()
        );

        let summary = EncodedSheet {
            sheet_name: sheet.name.clone(),
            logical_name: logical.clone(),
            file_name: file_name.clone(),
            row_count,
            column_count: table.column_count(),
        };
        let file = FlatFile {
            file_name,
            sheet_name: logical,
            header,
            body,
            trailer,
            row_count,
        };
        Ok((file, summary))
    }
}
