//! Decoder: archive → flat files → workbook

use super::flat_file::{read_body, split_sections};
use super::{extract_archive, move_into_place, ArchiveMember};
use crate::error::{FileFailure, XtractError, XtractResult};
use crate::excel::ExcelExporter;
use crate::naming::{workbook_name_for_archive, NamingGrammar, FLAT_FILE_EXTENSION};
use crate::paths::unique_path;
use crate::scratch::ScratchArea;
use crate::template::{DuplicateSheetPolicy, Template};
use crate::types::{check_sheet_name, sheet_names_collide, SheetTable, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One flat file turned back into a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSheet {
    pub sheet_name: String,
    pub file_name: String,
    pub row_count: usize,
    pub column_count: usize,
}

/// An archive read into memory, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct DecodedArchive {
    pub workbook: Workbook,
    pub sheets: Vec<DecodedSheet>,
    pub skipped_members: Vec<String>,
}

/// Result of a decode run.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub workbook_path: PathBuf,
    pub sheets: Vec<DecodedSheet>,
    pub skipped_members: Vec<String>,
}

/// Where the decoded workbook goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Named after the archive, inside this directory.
    Directory(PathBuf),
    /// This exact path, disambiguated if it already exists.
    File(PathBuf),
}

pub struct Decoder<'a> {
    name: &'a str,
    template: &'a Template,
}

impl<'a> Decoder<'a> {
    pub fn new(name: &'a str, template: &'a Template) -> Self {
        Self { name, template }
    }

    /// Decode `archive` and write the workbook to `target`.
    pub fn decode(&self, archive: &Path, target: &OutputTarget) -> XtractResult<DecodeReport> {
        let scratch = ScratchArea::new()?;
        let decoded = self.read_archive_in(archive, &scratch)?;

        let destination = match target {
            OutputTarget::Directory(dir) => {
                let archive_name = archive
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                dir.join(workbook_name_for_archive(
                    &archive_name,
                    &self.template.archive_grammar()?,
                ))
            }
            OutputTarget::File(path) => path.clone(),
        };
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| XtractError::io_at("create output directory", &parent, e))?;

        let staging = ScratchArea::new_in(&parent)?;
        let staged = staging.join(
            destination
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("workbook.xlsx")),
        );
        ExcelExporter::new(&decoded.workbook).export(&staged)?;

        let workbook_path = unique_path(&destination);
        move_into_place(&staged, &workbook_path)?;
        info!(
            "Decoded {} sheet(s) into {}",
            decoded.sheets.len(),
            workbook_path.display()
        );

        Ok(DecodeReport {
            workbook_path,
            sheets: decoded.sheets,
            skipped_members: decoded.skipped_members,
        })
    }

    /// Read `archive` into memory using a throwaway scratch area.
    pub fn read_archive(&self, archive: &Path) -> XtractResult<DecodedArchive> {
        let scratch = ScratchArea::new()?;
        self.read_archive_in(archive, &scratch)
    }

    /// Read `archive` into memory, extracting it into `scratch`.
    ///
    /// Every flat file is attempted; if any fail, all failures are returned
    /// together and no workbook is produced.
    pub fn read_archive_in(
        &self,
        archive: &Path,
        scratch: &ScratchArea,
    ) -> XtractResult<DecodedArchive> {
        self.template.validate(self.name)?;
        let delimiter = self
            .template
            .delimiter_byte()
            .ok_or_else(|| XtractError::InvalidTemplate {
                name: self.name.to_string(),
                reason: "delimiter is not a single byte".to_string(),
            })?;
        let grammar = self.template.file_grammar()?;

        let members = extract_archive(archive, scratch.path())?;
        let mut flat_members = Vec::new();
        let mut skipped_members = Vec::new();
        for member in members {
            if is_flat_member(&member) {
                flat_members.push(member.name);
            } else {
                debug!("Skipping archive member '{}'", member.name);
                skipped_members.push(member.name);
            }
        }

        if flat_members.is_empty() {
            return Err(XtractError::NoData(format!(
                "archive '{}' contains no .{} files",
                archive.display(),
                FLAT_FILE_EXTENSION
            )));
        }

        let workbook_name = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut workbook = Workbook::new(workbook_name);
        let mut sheets: Vec<DecodedSheet> = Vec::new();
        let mut failures = Vec::new();

        for file in flat_members {
            let table = match self.decode_member(scratch, &file, &grammar, delimiter) {
                Ok(table) => table,
                Err(error) => {
                    warn!("Failed to decode '{}': {}", file, error);
                    failures.push(FileFailure { file, error });
                    continue;
                }
            };

            let summary = DecodedSheet {
                sheet_name: table.name.clone(),
                file_name: file.clone(),
                row_count: table.row_count(),
                column_count: table.column_count(),
            };

            match sheets
                .iter()
                .position(|s| sheet_names_collide(&s.sheet_name, &summary.sheet_name))
            {
                None => {
                    debug!(
                        "'{}' → sheet '{}' ({} rows)",
                        file, summary.sheet_name, summary.row_count
                    );
                    workbook.add_sheet(table);
                    sheets.push(summary);
                }
                Some(pos) => match self.template.duplicate_sheets {
                    DuplicateSheetPolicy::Error => {
                        let error = XtractError::DuplicateSheet {
                            sheet: summary.sheet_name,
                            file: file.clone(),
                        };
                        warn!("{}", error);
                        failures.push(FileFailure { file, error });
                    }
                    DuplicateSheetPolicy::LastWins => {
                        warn!(
                            "'{}' replaces sheet '{}' decoded from '{}'",
                            file, summary.sheet_name, sheets[pos].file_name
                        );
                        workbook.sheets[pos] = table;
                        sheets[pos] = summary;
                    }
                },
            }
        }

        if !failures.is_empty() {
            return Err(XtractError::DecodeFailed(failures));
        }

        Ok(DecodedArchive {
            workbook,
            sheets,
            skipped_members,
        })
    }

    fn decode_member(
        &self,
        scratch: &ScratchArea,
        file: &str,
        grammar: &NamingGrammar,
        delimiter: u8,
    ) -> XtractResult<SheetTable> {
        let parsed = grammar.parse(file)?;
        let sheet_name = parsed
            .sheet_name()
            .ok_or_else(|| XtractError::NamingGrammar {
                name: file.to_string(),
                reason: "no sheet name field".to_string(),
            })?
            .to_string();
        check_sheet_name(&sheet_name).map_err(|reason| XtractError::FlatFile {
            file: file.to_string(),
            reason,
        })?;

        let path = scratch.join(file);
        let bytes = fs::read(&path).map_err(|e| XtractError::io_at("read", &path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| XtractError::FlatFile {
            file: file.to_string(),
            reason: format!("not valid UTF-8: {}", e),
        })?;

        let sections = split_sections(
            &text,
            self.template.header_record_count,
            self.template.trailer_record_count,
            file,
        )?;
        read_body(&sections.body, delimiter, &sheet_name, file)
    }
}

fn is_flat_member(member: &ArchiveMember) -> bool {
    !member.is_dir
        && !member.name.contains(['/', '\\'])
        && Path::new(&member.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(FLAT_FILE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_archive;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const HOLDING_FILE: &str = "TAXOPT.20250314093015123.482913.HOLDING.txt";
    const HOLDING_TEXT: &str = "HDR|LPB|482913|20250314093015123|HOLDING\nAccount|Quantity\nA1|10\nA2|20\nTLR|2";

    fn archive_with(dir: &Path, name: &str, members: &[(&str, &str)]) -> PathBuf {
        let staged = dir.join("staged");
        fs::create_dir_all(&staged).unwrap();
        let mut entries = Vec::new();
        for (idx, (member, text)) in members.iter().enumerate() {
            let path = staged.join(format!("{idx}.tmp"));
            fs::write(&path, text).unwrap();
            entries.push((member.to_string(), path));
        }
        let archive = dir.join(name);
        write_archive(&archive, &entries).unwrap();
        archive
    }

    #[test]
    fn test_read_archive_recovers_sheet() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(
            dir.path(),
            "TAXOPT.LPB.20250314093015123.482913.zip",
            &[(HOLDING_FILE, HOLDING_TEXT)],
        );
        let template = Template::default();
        let decoded = Decoder::new("t", &template).read_archive(&archive).unwrap();

        let sheet = decoded.workbook.sheet("HOLDING").unwrap();
        assert_eq!(sheet.columns, vec!["Account".to_string(), "Quantity".to_string()]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(decoded.sheets[0].file_name, HOLDING_FILE);
    }

    #[test]
    fn test_read_archive_without_flat_files_is_no_data() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(dir.path(), "empty.zip", &[("notes.md", "hi")]);
        let template = Template::default();
        let err = Decoder::new("t", &template)
            .read_archive(&archive)
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_read_archive_reports_short_names_per_file() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(
            dir.path(),
            "bundle.zip",
            &[(HOLDING_FILE, HOLDING_TEXT), ("TAXOPT.HOLDING.txt", HOLDING_TEXT)],
        );
        let template = Template::default();
        match Decoder::new("t", &template).read_archive(&archive).unwrap_err() {
            XtractError::DecodeFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].file, "TAXOPT.HOLDING.txt");
                assert!(matches!(failures[0].error, XtractError::NamingGrammar { .. }));
            }
            other => panic!("expected DecodeFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_sheets_error_by_default() {
        let dir = TempDir::new().unwrap();
        let second = "TAXOPT.20250314093015999.482913.HOLDING.txt";
        let archive = archive_with(
            dir.path(),
            "bundle.zip",
            &[(HOLDING_FILE, HOLDING_TEXT), (second, HOLDING_TEXT)],
        );
        let template = Template::default();
        match Decoder::new("t", &template).read_archive(&archive).unwrap_err() {
            XtractError::DecodeFailed(failures) => {
                assert!(matches!(
                    failures[0].error,
                    XtractError::DuplicateSheet { ref file, .. } if file == second
                ));
            }
            other => panic!("expected DecodeFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_sheets_ignore_case() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(
            dir.path(),
            "bundle.zip",
            &[
                (HOLDING_FILE, HOLDING_TEXT),
                ("TAXOPT.1.2.holding.txt", HOLDING_TEXT),
            ],
        );
        let template = Template::default();
        match Decoder::new("t", &template).read_archive(&archive).unwrap_err() {
            XtractError::DecodeFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0].error, XtractError::DuplicateSheet { .. }));
            }
            other => panic!("expected DecodeFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_unusable_sheet_names_fail_per_file() {
        let dir = TempDir::new().unwrap();
        let long = "TAXOPT.1.2.AccountHoldingsDetailedReportForQ1.txt";
        let bracket = "TAXOPT.1.2.Q[1].txt";
        let archive = archive_with(
            dir.path(),
            "bundle.zip",
            &[(HOLDING_FILE, HOLDING_TEXT), (long, HOLDING_TEXT), (bracket, HOLDING_TEXT)],
        );
        let out = dir.path().join("out");
        let template = Template::default();
        match Decoder::new("t", &template)
            .decode(&archive, &OutputTarget::Directory(out.clone()))
            .unwrap_err()
        {
            XtractError::DecodeFailed(failures) => {
                let files: Vec<_> = failures.iter().map(|f| f.file.as_str()).collect();
                assert_eq!(files, vec![long, bracket]);
                assert!(failures
                    .iter()
                    .all(|f| matches!(f.error, XtractError::FlatFile { .. })));
            }
            other => panic!("expected DecodeFailed, got {other:?}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_duplicate_sheets_last_wins_keeps_position() {
        let dir = TempDir::new().unwrap();
        let later = "HDR|LPB|1|2|HOLDING\nAccount|Quantity\nA9|90\nTLR|1";
        let other = "HDR|LPB|1|2|TRADES\nId\n7\nTLR|1";
        let archive = archive_with(
            dir.path(),
            "bundle.zip",
            &[
                (HOLDING_FILE, HOLDING_TEXT),
                ("TAXOPT.1.2.TRADES.txt", other),
                ("TAXOPT.3.4.HOLDING.txt", later),
            ],
        );
        let template = Template {
            duplicate_sheets: DuplicateSheetPolicy::LastWins,
            ..Template::default()
        };
        let decoded = Decoder::new("t", &template).read_archive(&archive).unwrap();
        assert_eq!(decoded.workbook.sheet_names(), vec!["HOLDING", "TRADES"]);
        assert_eq!(decoded.workbook.sheets[0].rows, vec![vec!["A9".to_string(), "90".to_string()]]);
    }

    #[test]
    fn test_nested_and_foreign_members_are_skipped() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(
            dir.path(),
            "bundle.zip",
            &[
                ("nested/TAXOPT.1.2.X.txt", HOLDING_TEXT),
                (HOLDING_FILE, HOLDING_TEXT),
                ("readme.csv", "a,b"),
            ],
        );
        let template = Template::default();
        let decoded = Decoder::new("t", &template).read_archive(&archive).unwrap();
        assert_eq!(decoded.workbook.sheet_names(), vec!["HOLDING"]);
        assert_eq!(
            decoded.skipped_members,
            vec!["nested/TAXOPT.1.2.X.txt".to_string(), "readme.csv".to_string()]
        );
    }

    #[test]
    fn test_decode_names_workbook_after_archive() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(
            dir.path(),
            "TAXOPT.LPB.20250314093015123.482913.zip",
            &[(HOLDING_FILE, HOLDING_TEXT)],
        );
        let out = dir.path().join("out");
        let template = Template::default();
        let report = Decoder::new("t", &template)
            .decode(&archive, &OutputTarget::Directory(out.clone()))
            .unwrap();
        assert_eq!(report.workbook_path, out.join("TAXOPT.2025_03_14.482913.xlsx"));
        assert!(report.workbook_path.exists());

        let again = Decoder::new("t", &template)
            .decode(&archive, &OutputTarget::Directory(out.clone()))
            .unwrap();
        assert_eq!(again.workbook_path, out.join("TAXOPT.2025_03_14.482913 (1).xlsx"));
    }

    #[test]
    fn test_failed_decode_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with(dir.path(), "bundle.zip", &[("x.txt", "HDR")]);
        let out = dir.path().join("out");
        let template = Template::default();
        assert!(Decoder::new("t", &template)
            .decode(&archive, &OutputTarget::Directory(out.clone()))
            .is_err());
        assert!(!out.exists());
    }
}
