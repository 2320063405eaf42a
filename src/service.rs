//! Conversion service
//!
//! [`Converter`] is the surface a front end drives: encode a spreadsheet,
//! decode an archive, and manage templates. It owns the template store and
//! resolves template names with the configured [`TemplateLookup`].

use crate::codec::{DecodeReport, Decoder, EncodeReport, Encoder, OutputTarget};
use crate::error::XtractResult;
use crate::excel::ExcelImporter;
use crate::template::{Template, TemplateEdit, TemplateLookup, TemplateStore};
use crate::types::Workbook;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Converter {
    store: TemplateStore,
    lookup: TemplateLookup,
    output_dir: PathBuf,
}

impl Converter {
    /// Outputs go to the working directory; unknown template names fall
    /// back to the default template.
    pub fn new(store: TemplateStore) -> Self {
        Self {
            store,
            lookup: TemplateLookup::default(),
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_lookup(mut self, lookup: TemplateLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve `name` under the configured lookup policy.
    pub fn template(&self, name: &str) -> XtractResult<Template> {
        self.store.lookup(name, self.lookup)
    }

    /// Encode the spreadsheet at `spreadsheet` into an archive in the
    /// output directory.
    pub fn encode(&self, spreadsheet: &Path, template_name: &str) -> XtractResult<EncodeReport> {
        let template = self.template(template_name)?;
        let workbook = ExcelImporter::new(spreadsheet).import()?;
        info!(
            "Encoding {} with template '{}'",
            spreadsheet.display(),
            template_name
        );
        Encoder::new(template_name, &template).encode(&workbook, &self.output_dir)
    }

    /// Encode an in-memory workbook.
    pub fn encode_workbook(
        &self,
        workbook: &Workbook,
        template_name: &str,
    ) -> XtractResult<EncodeReport> {
        let template = self.template(template_name)?;
        Encoder::new(template_name, &template).encode(workbook, &self.output_dir)
    }

    /// Decode `archive` into a workbook named after it in the output
    /// directory.
    pub fn decode(&self, archive: &Path, template_name: &str) -> XtractResult<DecodeReport> {
        self.decode_to(
            archive,
            template_name,
            &OutputTarget::Directory(self.output_dir.clone()),
        )
    }

    pub fn decode_to(
        &self,
        archive: &Path,
        template_name: &str,
        target: &OutputTarget,
    ) -> XtractResult<DecodeReport> {
        let template = self.template(template_name)?;
        info!(
            "Decoding {} with template '{}'",
            archive.display(),
            template_name
        );
        Decoder::new(template_name, &template).decode(archive, target)
    }

    pub fn list_templates(&self) -> Vec<String> {
        self.store.list()
    }

    pub fn create_template(
        &mut self,
        name: &str,
        delimiter: char,
        header_record_count: usize,
        trailer_record_count: usize,
    ) -> XtractResult<Template> {
        self.store
            .create(name, delimiter, header_record_count, trailer_record_count)
            .cloned()
    }

    pub fn update_template(&mut self, name: &str, edit: TemplateEdit) -> XtractResult<Template> {
        self.store.update(name, edit).cloned()
    }

    /// Returns false when no template was stored under `name`.
    pub fn delete_template(&mut self, name: &str) -> XtractResult<bool> {
        self.store.delete(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XtractError;
    use crate::template::DEFAULT_TEMPLATE_NAME;
    use crate::types::SheetTable;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_template_falls_back_by_default() {
        let converter = Converter::new(TemplateStore::in_memory());
        assert_eq!(converter.template("nope").unwrap(), Template::default());
    }

    #[test]
    fn test_strict_lookup_rejects_unknown_template() {
        let converter =
            Converter::new(TemplateStore::in_memory()).with_lookup(TemplateLookup::Strict);
        assert!(matches!(
            converter.template("nope"),
            Err(XtractError::MissingTemplate(_))
        ));
        assert!(converter.template(DEFAULT_TEMPLATE_NAME).is_ok());
    }

    #[test]
    fn test_encode_workbook_then_decode() {
        let dir = TempDir::new().unwrap();
        let converter = Converter::new(TemplateStore::in_memory()).with_output_dir(dir.path());

        let mut workbook = Workbook::new("positions");
        workbook.add_sheet(SheetTable::with_rows(
            "HOLDING",
            vec!["Account".to_string(), "Quantity".to_string()],
            vec![vec!["A1".to_string(), "10".to_string()]],
        ));

        let encoded = converter
            .encode_workbook(&workbook, DEFAULT_TEMPLATE_NAME)
            .unwrap();
        assert!(encoded.archive_path.exists());

        let decoded = converter
            .decode(&encoded.archive_path, DEFAULT_TEMPLATE_NAME)
            .unwrap();
        let name = decoded
            .workbook_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(name.starts_with("TAXOPT."));
        assert!(name.ends_with(&format!(".{}.xlsx", encoded.request_id)));
        assert_eq!(decoded.sheets[0].sheet_name, "HOLDING");
    }

    #[test]
    fn test_template_management_round_trip() {
        let mut converter = Converter::new(TemplateStore::in_memory());
        converter.create_template("Custom", ',', 2, 1).unwrap();
        assert!(converter.list_templates().contains(&"Custom".to_string()));

        let edited = converter
            .update_template(
                "Custom",
                TemplateEdit {
                    trailer_format: Some("END|{row_count}".to_string()),
                    ..TemplateEdit::default()
                },
            )
            .unwrap();
        assert_eq!(edited.trailer_format, "END|{row_count}");

        assert!(converter.delete_template("Custom").unwrap());
        assert!(!converter.delete_template("Custom").unwrap());
    }
}
