//! Conversion templates
//!
//! A [`Template`] is the named profile that drives both directions of the
//! codec: field delimiter, header/trailer framing, record formats, naming
//! patterns and the optional column / sheet-name remapping.

mod store;

pub use store::{TemplateEdit, TemplateLookup, TemplateStore, DEFAULT_STORE_FILE};

use crate::error::{XtractError, XtractResult};
use crate::naming::{NamingGrammar, FLAT_FILE_EXTENSION};
use crate::tokens::{FormatString, SHEET_NAME};
use crate::types::{check_sheet_name, sheet_names_collide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the built-in template returned when a lookup falls back.
pub const DEFAULT_TEMPLATE_NAME: &str = "TaxOverlayS3Data";

/// What the decoder does when two flat files yield the same logical sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSheetPolicy {
    /// Abort the decode with [`XtractError::DuplicateSheet`].
    #[default]
    Error,
    /// Keep the later file's content at the earlier sheet's position.
    LastWins,
}

/// One conversion profile.
///
/// Field aliases accept the key names used by older `config.json` files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub delimiter: char,

    #[serde(alias = "header_records")]
    pub header_record_count: usize,

    #[serde(alias = "trailer_records")]
    pub trailer_record_count: usize,

    #[serde(alias = "zip_naming_convention")]
    pub archive_naming_pattern: String,

    pub header_format: String,

    pub trailer_format: String,

    #[serde(alias = "txt_filename_pattern")]
    pub file_naming_pattern: String,

    /// Source column name → destination column name (applied on encode)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_mappings: BTreeMap<String, String>,

    /// Raw sheet name → logical name used in records and file names
    #[serde(
        default,
        alias = "header_mappings",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub sheet_name_mappings: BTreeMap<String, String>,

    #[serde(default)]
    pub duplicate_sheets: DuplicateSheetPolicy,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            delimiter: '|',
            header_record_count: 1,
            trailer_record_count: 1,
            archive_naming_pattern: "TAXOPT.LPB.{timestamp}.{trading_request_id}".to_string(),
            header_format: "HDR|LPB|{trading_request_id}|{timestamp}|{sheet_name}".to_string(),
            trailer_format: "TLR|{row_count}".to_string(),
            file_naming_pattern: "TAXOPT.{timestamp}.{trading_request_id}.{sheet_name}.txt"
                .to_string(),
            column_mappings: BTreeMap::new(),
            sheet_name_mappings: BTreeMap::new(),
            duplicate_sheets: DuplicateSheetPolicy::Error,
        }
    }
}

impl Template {
    /// The standard formats, with `name` as the leading naming field.
    pub fn named(
        name: &str,
        delimiter: char,
        header_record_count: usize,
        trailer_record_count: usize,
    ) -> Self {
        Self {
            delimiter,
            header_record_count,
            trailer_record_count,
            archive_naming_pattern: format!("{name}.{{timestamp}}.{{trading_request_id}}"),
            header_format: record_format(
                "HDR|{trading_request_id}|{timestamp}|{sheet_name}",
                "HDR",
                "{sheet_name}",
                header_record_count,
            ),
            trailer_format: record_format(
                "TLR|{row_count}",
                "TLR",
                "{row_count}",
                trailer_record_count,
            ),
            file_naming_pattern: format!(
                "{name}.{{timestamp}}.{{trading_request_id}}.{{sheet_name}}.{FLAT_FILE_EXTENSION}"
            ),
            ..Self::default()
        }
    }

    /// Logical name of a raw sheet name, falling back to the raw name.
    pub fn logical_sheet_name<'a>(&'a self, raw: &'a str) -> &'a str {
        self.sheet_name_mappings
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw)
    }

    /// The delimiter as the single byte the delimited-text codec needs.
    pub fn delimiter_byte(&self) -> Option<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii() && !matches!(b, b'\n' | b'\r' | b'"'))
    }

    pub fn file_grammar(&self) -> XtractResult<NamingGrammar> {
        NamingGrammar::compile(&self.file_naming_pattern)
    }

    pub fn archive_grammar(&self) -> XtractResult<NamingGrammar> {
        NamingGrammar::archive(&self.archive_naming_pattern)
    }

    /// Check everything an encode or decode relies on, before any work starts.
    pub fn validate(&self, name: &str) -> XtractResult<()> {
        let invalid = |reason: String| XtractError::InvalidTemplate {
            name: name.to_string(),
            reason,
        };

        if self.delimiter_byte().is_none() {
            return Err(invalid(format!(
                "delimiter {:?} must be a single ASCII character other than a quote or line break",
                self.delimiter
            )));
        }

        FormatString::parse(&self.header_format)?;
        FormatString::parse(&self.trailer_format)?;
        for (kind, format, count) in [
            ("header", &self.header_format, self.header_record_count),
            ("trailer", &self.trailer_format, self.trailer_record_count),
        ] {
            let lines = format.split('\n').count();
            if count > 0 && lines != count {
                return Err(invalid(format!(
                    "{kind} format has {lines} line(s) but {count} {kind} record(s) are declared"
                )));
            }
        }

        let files = self.file_grammar()?;
        if !files.has_token(SHEET_NAME) {
            return Err(invalid(format!(
                "file naming pattern \"{}\" must contain {{{}}} as its own field",
                self.file_naming_pattern, SHEET_NAME
            )));
        }
        let extension = files.fields().last().filter(|field| {
            field.token.is_none()
                && field.suffix.is_empty()
                && field.prefix.eq_ignore_ascii_case(FLAT_FILE_EXTENSION)
        });
        if extension.is_none() {
            return Err(invalid(format!(
                "file naming pattern \"{}\" must end with .{}",
                self.file_naming_pattern, FLAT_FILE_EXTENSION
            )));
        }
        self.archive_grammar()?;

        let mut logical: Vec<(&str, &str)> = Vec::new();
        for (raw, target) in &self.sheet_name_mappings {
            check_sheet_name(target)
                .map_err(|reason| invalid(format!("sheet mapping '{raw}': {reason}")))?;
            if let Some((other, _)) = logical
                .iter()
                .find(|(_, t)| sheet_names_collide(t, target))
            {
                return Err(invalid(format!(
                    "sheets '{other}' and '{raw}' both map to '{target}'"
                )));
            }
            logical.push((raw.as_str(), target.as_str()));
        }
        Ok(())
    }
}

/// A record format of `count` lines: `first`, then `<tag><n>|<extra>` for
/// every further line.
fn record_format(first: &str, tag: &str, extra: &str, count: usize) -> String {
    let mut lines = vec![first.to_string()];
    lines.extend((2..=count).map(|n| format!("{tag}{n}|{extra}")));
    lines.join("\n")
}
