//! Flat-file framing: header records, delimited body, trailer records
//!
//! ```text
//! HDR|482913|20250314093015123|HOLDING     <- header_record_count lines
//! Account|Quantity                         <- column names
//! A1|10                                    <- one line per row
//! A2|20
//! TLR|2                                    <- trailer_record_count lines
//! ```

use crate::error::{XtractError, XtractResult};
use crate::types::SheetTable;
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

/// Which kind of metadata block a set of record lines belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Header,
    Trailer,
}

impl RecordKind {
    fn label(self) -> &'static str {
        match self {
            RecordKind::Header => "header",
            RecordKind::Trailer => "trailer",
        }
    }
}

/// One sheet rendered as a flat file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFile {
    pub file_name: String,
    pub sheet_name: String,
    pub header: Vec<String>,
    pub body: String,
    pub trailer: Vec<String>,
    pub row_count: usize,
}

impl FlatFile {
    /// Header lines, body, trailer lines joined by `\n`, without a trailing
    /// newline.
    pub fn to_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.header.len() + self.trailer.len() + 1);
        parts.extend(self.header.iter().map(String::as_str));
        parts.push(&self.body);
        parts.extend(self.trailer.iter().map(String::as_str));
        parts.join("\n")
    }
}

/// Split a resolved record format into exactly `expected` lines.
///
/// A count of zero means the block is omitted and the format is ignored.
pub fn record_lines(
    resolved: &str,
    expected: usize,
    kind: RecordKind,
    sheet: &str,
) -> XtractResult<Vec<String>> {
    if expected == 0 {
        return Ok(Vec::new());
    }
    let lines: Vec<String> = resolved.split('\n').map(str::to_string).collect();
    if lines.len() != expected {
        return Err(XtractError::Framing {
            sheet: sheet.to_string(),
            row: 0,
            column: 0,
            reason: format!(
                "{} format resolves to {} line(s) but the template declares {} {} record(s)",
                kind.label(),
                lines.len(),
                expected,
                kind.label()
            ),
        });
    }
    Ok(lines)
}

/// Serialize column names and rows as delimited text, one line each, with
/// no trailing newline.
///
/// Fields holding the delimiter or quotes are quoted. Line breaks inside a
/// cell cannot be framed and are rejected.
pub fn write_body(sheet: &SheetTable, delimiter: u8) -> XtractResult<String> {
    if sheet.columns.is_empty() && sheet.rows.is_empty() {
        return Ok(String::new());
    }

    check_line_breaks(sheet, 0, &sheet.columns)?;
    for (idx, row) in sheet.rows.iter().enumerate() {
        check_line_breaks(sheet, idx + 1, row)?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(&sheet.columns)?;
    for row in &sheet.rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| XtractError::Io(e.into_error()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| XtractError::Framing {
        sheet: sheet.name.clone(),
        row: 0,
        column: 0,
        reason: format!("body is not valid UTF-8: {}", e),
    })?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

fn check_line_breaks(sheet: &SheetTable, row: usize, cells: &[String]) -> XtractResult<()> {
    match cells.iter().position(|c| c.contains(['\n', '\r'])) {
        Some(col) => Err(XtractError::Framing {
            sheet: sheet.name.clone(),
            row,
            column: col + 1,
            reason: "cell contains a line break".to_string(),
        }),
        None => Ok(()),
    }
}

/// A flat file's lines split into header, body and trailer blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections<'a> {
    pub header: Vec<&'a str>,
    pub body: Vec<&'a str>,
    pub trailer: Vec<&'a str>,
}

/// Strip exactly `header_count` leading and `trailer_count` trailing lines.
///
/// Lines are split on `\n`; a `\r` before it and one newline at the very end
/// of the file are tolerated.
pub fn split_sections<'a>(
    text: &'a str,
    header_count: usize,
    trailer_count: usize,
    file: &str,
) -> XtractResult<Sections<'a>> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let lines: Vec<&str> = if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect()
    };

    let framing = header_count + trailer_count;
    if lines.len() < framing {
        return Err(XtractError::FlatFile {
            file: file.to_string(),
            reason: format!(
                "{} line(s) is fewer than the {} header and {} trailer record(s) the template declares",
                lines.len(),
                header_count,
                trailer_count
            ),
        });
    }

    let body_end = lines.len() - trailer_count;
    Ok(Sections {
        header: lines[..header_count].to_vec(),
        body: lines[header_count..body_end].to_vec(),
        trailer: lines[body_end..].to_vec(),
    })
}

/// Parse body lines into a sheet: first line is the column header row.
///
/// Short rows are padded with empty cells; rows wider than the header are
/// rejected. Cell text is kept verbatim.
pub fn read_body(
    lines: &[&str],
    delimiter: u8,
    sheet_name: &str,
    file: &str,
) -> XtractResult<SheetTable> {
    let body = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = reader.records();
    let columns: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Ok(SheetTable::new(sheet_name)),
    };

    let mut table = SheetTable::with_rows(sheet_name, columns, Vec::new());
    for (idx, record) in records.enumerate() {
        let record = record?;
        if record.len() > table.column_count() {
            return Err(XtractError::FlatFile {
                file: file.to_string(),
                reason: format!(
                    "data row {} has {} fields but the header names {} column(s)",
                    idx + 1,
                    record.len(),
                    table.column_count()
                ),
            });
        }
        table.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn holding() -> SheetTable {
        SheetTable::with_rows(
            "HOLDING",
            vec!["Account".to_string(), "Quantity".to_string()],
            vec![
                vec!["A1".to_string(), "10".to_string()],
                vec!["A2".to_string(), "20".to_string()],
            ],
        )
    }

    #[test]
    fn test_write_body_has_no_trailing_newline() {
        let body = write_body(&holding(), b'|').unwrap();
        assert_eq!(body, "Account|Quantity\nA1|10\nA2|20");
    }

    #[test]
    fn test_write_body_quotes_embedded_delimiter() {
        let sheet = SheetTable::with_rows(
            "S",
            vec!["Name".to_string()],
            vec![vec!["a|b".to_string()]],
        );
        assert_eq!(write_body(&sheet, b'|').unwrap(), "Name\n\"a|b\"");
    }

    #[test]
    fn test_write_body_rejects_line_breaks() {
        let sheet = SheetTable::with_rows(
            "S",
            vec!["Name".to_string(), "Note".to_string()],
            vec![vec!["a".to_string(), "two\nlines".to_string()]],
        );
        match write_body(&sheet, b'|').unwrap_err() {
            XtractError::Framing { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, 2);
            }
            other => panic!("expected Framing, got {other:?}"),
        }
    }

    #[test]
    fn test_to_text_frames_body() {
        let file = FlatFile {
            file_name: "f.txt".to_string(),
            sheet_name: "HOLDING".to_string(),
            header: vec!["HDR|1|2|HOLDING".to_string()],
            body: "Account|Quantity\nA1|10\nA2|20".to_string(),
            trailer: vec!["TLR|2".to_string()],
            row_count: 2,
        };
        assert_eq!(
            file.to_text(),
            "HDR|1|2|HOLDING\nAccount|Quantity\nA1|10\nA2|20\nTLR|2"
        );
    }

    #[test]
    fn test_record_lines_counts() {
        assert!(record_lines("HDR", 0, RecordKind::Header, "S").unwrap().is_empty());
        assert_eq!(
            record_lines("A\nB", 2, RecordKind::Header, "S").unwrap(),
            vec!["A".to_string(), "B".to_string()]
        );
        assert!(matches!(
            record_lines("TLR|0", 2, RecordKind::Trailer, "S"),
            Err(XtractError::Framing { .. })
        ));
    }

    #[test]
    fn test_split_sections_strips_exact_counts() {
        let text = "HDR\nAccount|Quantity\nA1|10\nTLR|1\n";
        let sections = split_sections(text, 1, 1, "f.txt").unwrap();
        assert_eq!(sections.header, vec!["HDR"]);
        assert_eq!(sections.body, vec!["Account|Quantity", "A1|10"]);
        assert_eq!(sections.trailer, vec!["TLR|1"]);
    }

    #[test]
    fn test_split_sections_tolerates_crlf() {
        let sections = split_sections("HDR\r\nA\r\n1\r\nTLR\r\n", 1, 1, "f.txt").unwrap();
        assert_eq!(sections.body, vec!["A", "1"]);
    }

    #[test]
    fn test_split_sections_too_short() {
        assert!(matches!(
            split_sections("HDR", 1, 1, "f.txt"),
            Err(XtractError::FlatFile { .. })
        ));
    }

    #[test]
    fn test_read_body_parses_columns_and_rows() {
        let table = read_body(&["Account|Quantity", "A1|10", "A2|20"], b'|', "HOLDING", "f").unwrap();
        assert_eq!(table, holding());
    }

    #[test]
    fn test_read_body_keeps_numeric_text_and_pads() {
        let table = read_body(&["Id|Code", "007", "\"x|y\"|z"], b'|', "S", "f").unwrap();
        assert_eq!(table.rows[0], vec!["007".to_string(), String::new()]);
        assert_eq!(table.rows[1], vec!["x|y".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_read_body_rejects_wide_rows() {
        assert!(matches!(
            read_body(&["A|B", "1|2|3"], b'|', "S", "f"),
            Err(XtractError::FlatFile { .. })
        ));
    }

    #[test]
    fn test_read_body_empty() {
        let table = read_body(&[""], b'|', "S", "f").unwrap();
        assert!(table.is_empty());
    }
}
