//! Dot-delimited naming grammar for archives and flat files
//!
//! A naming pattern such as `TAXOPT.{timestamp}.{trading_request_id}.{sheet_name}.txt`
//! is compiled into a fixed sequence of fields, one per `.`-separated part.
//! Each field is a literal prefix, at most one token, and a literal suffix.
//! The same grammar renders names on encode and parses them on decode, so the
//! two directions always agree on field order.

use crate::error::{XtractError, XtractResult};
use crate::tokens::{FormatString, Segment, TokenContext, REQUEST_ID, SHEET_NAME, TIMESTAMP};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

pub const NAME_DELIMITER: char = '.';
pub const FLAT_FILE_EXTENSION: &str = "txt";
pub const ARCHIVE_EXTENSION: &str = "zip";
pub const WORKBOOK_EXTENSION: &str = "xlsx";

/// One `.`-separated field of a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameField {
    pub prefix: String,
    pub token: Option<String>,
    pub suffix: String,
}

impl NameField {
    fn push_literal(&mut self, text: &str) {
        if self.token.is_some() {
            self.suffix.push_str(text);
        } else {
            self.prefix.push_str(text);
        }
    }

    fn describe(&self) -> String {
        match &self.token {
            Some(token) => format!("{}{{{}}}{}", self.prefix, token, self.suffix),
            None => self.prefix.clone(),
        }
    }

    /// Match one part of a name, returning the captured token value.
    fn capture<'a>(&self, part: &'a str) -> Option<Option<&'a str>> {
        let rest = part.strip_prefix(self.prefix.as_str())?;
        let middle = rest.strip_suffix(self.suffix.as_str())?;
        match self.token {
            Some(_) => Some(Some(middle)),
            None if middle.is_empty() => Some(None),
            None => None,
        }
    }
}

/// A compiled naming pattern.
#[derive(Debug, Clone)]
pub struct NamingGrammar {
    pattern: FormatString,
    fields: Vec<NameField>,
}

impl NamingGrammar {
    /// Compile a flat-file naming pattern.
    pub fn compile(pattern: &str) -> XtractResult<Self> {
        let format = FormatString::parse(pattern)?;
        let mut fields = Vec::new();
        let mut current = NameField::default();

        for segment in format.segments() {
            match segment {
                Segment::Literal(text) => {
                    let mut pieces = text.split(NAME_DELIMITER);
                    if let Some(first) = pieces.next() {
                        current.push_literal(first);
                    }
                    for piece in pieces {
                        fields.push(std::mem::take(&mut current));
                        current.push_literal(piece);
                    }
                }
                Segment::Token(name) => {
                    if let Some(existing) = &current.token {
                        return Err(XtractError::NamingGrammar {
                            name: pattern.to_string(),
                            reason: format!(
                                "tokens '{{{existing}}}' and '{{{name}}}' share one field; \
                                 separate them with '{NAME_DELIMITER}'"
                            ),
                        });
                    }
                    current.token = Some(name.clone());
                }
            }
        }
        fields.push(current);

        Ok(Self {
            pattern: format,
            fields,
        })
    }

    /// Compile an archive naming pattern; the `.zip` extension is appended
    /// unless the pattern already ends with it.
    pub fn archive(pattern: &str) -> XtractResult<Self> {
        let suffix = format!("{NAME_DELIMITER}{ARCHIVE_EXTENSION}");
        if pattern.ends_with(&suffix) {
            Self::compile(pattern)
        } else {
            Self::compile(&format!("{pattern}{suffix}"))
        }
    }

    pub fn pattern(&self) -> &FormatString {
        &self.pattern
    }

    pub fn fields(&self) -> &[NameField] {
        &self.fields
    }

    /// Number of `.`-separated fields a name must have.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.token.as_deref() == Some(token))
    }

    /// Render a name. Names never contain path separators.
    pub fn render(&self, ctx: &TokenContext) -> XtractResult<String> {
        let name = self.pattern.render(ctx)?;
        if name.contains(['/', '\\']) {
            return Err(XtractError::NamingGrammar {
                name,
                reason: "names must not contain path separators".to_string(),
            });
        }
        Ok(name)
    }

    /// Split `name` on `.` and recover its token fields.
    ///
    /// Fails when the field count differs from the grammar's arity or when a
    /// field's literal text does not match.
    pub fn parse(&self, name: &str) -> XtractResult<ParsedName> {
        let parts: Vec<&str> = name.split(NAME_DELIMITER).collect();
        if parts.len() != self.fields.len() {
            return Err(XtractError::NamingGrammar {
                name: name.to_string(),
                reason: format!(
                    "expected {} '{}'-delimited fields ({}), found {}",
                    self.fields.len(),
                    NAME_DELIMITER,
                    self.pattern,
                    parts.len()
                ),
            });
        }

        let mut tokens = BTreeMap::new();
        for (idx, (field, part)) in self.fields.iter().zip(&parts).enumerate() {
            match field.capture(part) {
                Some(Some(value)) => {
                    if let Some(token) = &field.token {
                        tokens
                            .entry(token.clone())
                            .or_insert_with(|| value.to_string());
                    }
                }
                Some(None) => {}
                None => {
                    return Err(XtractError::NamingGrammar {
                        name: name.to_string(),
                        reason: format!(
                            "field {} ('{}') does not match '{}'",
                            idx + 1,
                            part,
                            field.describe()
                        ),
                    });
                }
            }
        }

        Ok(ParsedName {
            name: name.to_string(),
            parts: parts.into_iter().map(str::to_string).collect(),
            tokens,
        })
    }
}

/// A name split by a [`NamingGrammar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub name: String,
    parts: Vec<String>,
    tokens: BTreeMap<String, String>,
}

impl ParsedName {
    pub fn get(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    /// Raw text of the field at `idx`.
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.parts.get(idx).map(String::as_str)
    }

    pub fn sheet_name(&self) -> Option<&str> {
        self.get(SHEET_NAME)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.get(TIMESTAMP)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(REQUEST_ID)
    }
}

/// Name of the workbook a decoded archive becomes:
/// `<first field>.<YYYY_MM_DD>.<request id>.xlsx`.
///
/// Falls back to `<archive stem>.xlsx` when the archive name does not fit the
/// grammar or lacks a timestamp/request id.
pub fn workbook_name_for_archive(archive_name: &str, grammar: &NamingGrammar) -> String {
    let fallback = || {
        let stem = Path::new(archive_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(archive_name);
        format!("{stem}{NAME_DELIMITER}{WORKBOOK_EXTENSION}")
    };

    let parsed = match grammar.parse(archive_name) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("{e}; naming the workbook after the archive");
            return fallback();
        }
    };

    let date = parsed
        .timestamp()
        .and_then(|ts| ts.get(..8))
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()));

    match (parsed.field(0), date, parsed.request_id()) {
        (Some(head), Some(date), Some(id)) => format!(
            "{head}.{}_{}_{}.{id}.{WORKBOOK_EXTENSION}",
            &date[0..4],
            &date[4..6],
            &date[6..8]
        ),
        _ => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_PATTERN: &str = "TAXOPT.{timestamp}.{trading_request_id}.{sheet_name}.txt";

    #[test]
    fn test_compile_splits_fields_on_dots() {
        let grammar = NamingGrammar::compile(FILE_PATTERN).unwrap();
        assert_eq!(grammar.arity(), 5);
        assert_eq!(grammar.fields()[0].prefix, "TAXOPT");
        assert_eq!(grammar.fields()[3].token.as_deref(), Some("sheet_name"));
        assert!(grammar.has_token(SHEET_NAME));
    }

    #[test]
    fn test_render_then_parse_recovers_tokens() {
        let grammar = NamingGrammar::compile(FILE_PATTERN).unwrap();
        let ctx = TokenContext::fixed("20250314093015123", 482913).with(SHEET_NAME, "HOLDING");
        let name = grammar.render(&ctx).unwrap();
        assert_eq!(name, "TAXOPT.20250314093015123.482913.HOLDING.txt");

        let parsed = grammar.parse(&name).unwrap();
        assert_eq!(parsed.sheet_name(), Some("HOLDING"));
        assert_eq!(parsed.timestamp(), Some("20250314093015123"));
        assert_eq!(parsed.request_id(), Some("482913"));
    }

    #[test]
    fn test_parse_fails_on_too_few_fields() {
        let grammar = NamingGrammar::compile(FILE_PATTERN).unwrap();
        let err = grammar.parse("TAXOPT.HOLDING.txt").unwrap_err();
        match err {
            XtractError::NamingGrammar { reason, .. } => {
                assert!(reason.contains("expected 5"));
                assert!(reason.contains("found 3"));
            }
            other => panic!("expected NamingGrammar, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_fails_on_literal_mismatch() {
        let grammar = NamingGrammar::compile(FILE_PATTERN).unwrap();
        assert!(grammar.parse("OTHER.1.2.HOLDING.txt").is_err());
        assert!(grammar.parse("TAXOPT.1.2.HOLDING.csv").is_err());
    }

    #[test]
    fn test_sheet_name_with_dot_breaks_arity() {
        let grammar = NamingGrammar::compile(FILE_PATTERN).unwrap();
        let ctx = TokenContext::fixed("1", 2).with(SHEET_NAME, "P.L");
        let name = grammar.render(&ctx).unwrap();
        assert!(grammar.parse(&name).is_err());
    }

    #[test]
    fn test_prefix_and_suffix_around_token() {
        let grammar = NamingGrammar::compile("ACME_{sheet_name}_v1.txt").unwrap();
        let parsed = grammar.parse("ACME_HOLDING_v1.txt").unwrap();
        assert_eq!(parsed.sheet_name(), Some("HOLDING"));
        assert!(grammar.parse("HOLDING_v1.txt").is_err());
    }

    #[test]
    fn test_two_tokens_in_one_field_is_rejected() {
        let err = NamingGrammar::compile("{timestamp}_{sheet_name}.txt").unwrap_err();
        assert!(matches!(err, XtractError::NamingGrammar { .. }));
    }

    #[test]
    fn test_render_rejects_path_separators() {
        let grammar = NamingGrammar::compile(FILE_PATTERN).unwrap();
        let ctx = TokenContext::fixed("1", 2).with(SHEET_NAME, "../etc");
        assert!(grammar.render(&ctx).is_err());
    }

    #[test]
    fn test_archive_grammar_appends_extension_once() {
        let grammar = NamingGrammar::archive("TAXOPT.LPB.{timestamp}.{trading_request_id}").unwrap();
        assert_eq!(grammar.arity(), 5);
        let already = NamingGrammar::archive("X.{timestamp}.zip").unwrap();
        assert_eq!(already.arity(), 3);
    }

    #[test]
    fn test_workbook_name_for_archive() {
        let grammar = NamingGrammar::archive("TAXOPT.LPB.{timestamp}.{trading_request_id}").unwrap();
        assert_eq!(
            workbook_name_for_archive("TAXOPT.LPB.20250314093015123.482913.zip", &grammar),
            "TAXOPT.2025_03_14.482913.xlsx"
        );
    }

    #[test]
    fn test_workbook_name_falls_back_to_archive_stem() {
        let grammar = NamingGrammar::archive("TAXOPT.LPB.{timestamp}.{trading_request_id}").unwrap();
        assert_eq!(
            workbook_name_for_archive("bundle.zip", &grammar),
            "bundle.xlsx"
        );
    }
}
