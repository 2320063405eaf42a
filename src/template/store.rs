//! Persisted template store
//!
//! Templates live in one file keyed by name: YAML by default, JSON when the
//! path ends in `.json`. Every mutating call rewrites the file.

use super::{DuplicateSheetPolicy, Template, DEFAULT_TEMPLATE_NAME};
use crate::error::{XtractError, XtractResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Store file used when no path is configured.
pub const DEFAULT_STORE_FILE: &str = "xtract-templates.yaml";

/// How a lookup treats a name that is not in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateLookup {
    /// Return the built-in default template.
    #[default]
    OrDefault,
    /// Fail with [`XtractError::MissingTemplate`].
    Strict,
}

/// Changes applied to an existing template by [`TemplateStore::update`].
#[derive(Debug, Clone, Default)]
pub struct TemplateEdit {
    pub header_format: Option<String>,
    pub trailer_format: Option<String>,
    pub sheet_name_mappings: Vec<(String, String)>,
    pub column_mappings: Vec<(String, String)>,
    pub duplicate_sheets: Option<DuplicateSheetPolicy>,
}

impl TemplateEdit {
    pub fn is_empty(&self) -> bool {
        self.header_format.is_none()
            && self.trailer_format.is_none()
            && self.sheet_name_mappings.is_empty()
            && self.column_mappings.is_empty()
            && self.duplicate_sheets.is_none()
    }

    fn apply(self, template: &mut Template) {
        if let Some(header) = self.header_format {
            template.header_format = header;
        }
        if let Some(trailer) = self.trailer_format {
            template.trailer_format = trailer;
        }
        template.sheet_name_mappings.extend(self.sheet_name_mappings);
        template.column_mappings.extend(self.column_mappings);
        if let Some(policy) = self.duplicate_sheets {
            template.duplicate_sheets = policy;
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    templates: BTreeMap<String, Template>,
}

/// Named templates plus the file they persist to.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    path: Option<PathBuf>,
    templates: BTreeMap<String, Template>,
}

impl TemplateStore {
    /// A store holding only the default template, never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            templates: default_entries(),
        }
    }

    /// Load the store at `path`. A missing file yields the default template
    /// only; a file that exists but cannot be parsed is an error.
    pub fn open(path: impl AsRef<Path>) -> XtractResult<Self> {
        let path = path.as_ref().to_path_buf();

        let templates = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| XtractError::io_at("read template store", &path, e))?;
            let file: StoreFile = if is_json(&path) {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };
            debug!(
                "Loaded {} template(s) from {}",
                file.templates.len(),
                path.display()
            );
            file.templates
        } else {
            debug!("No template store at {}, using defaults", path.display());
            default_entries()
        };

        Ok(Self {
            path: Some(path),
            templates,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// The stored template, or the built-in default when `name` is absent.
    pub fn get(&self, name: &str) -> Template {
        match self.templates.get(name) {
            Some(template) => template.clone(),
            None => {
                debug!("Template '{}' not found, using default", name);
                Template::default()
            }
        }
    }

    /// The stored template, failing when `name` is absent.
    pub fn get_strict(&self, name: &str) -> XtractResult<Template> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| XtractError::MissingTemplate(name.to_string()))
    }

    pub fn lookup(&self, name: &str, mode: TemplateLookup) -> XtractResult<Template> {
        match mode {
            TemplateLookup::OrDefault => Ok(self.get(name)),
            TemplateLookup::Strict => self.get_strict(name),
        }
    }

    /// Template names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// Create (or silently overwrite) `name` with the standard formats.
    pub fn create(
        &mut self,
        name: &str,
        delimiter: char,
        header_record_count: usize,
        trailer_record_count: usize,
    ) -> XtractResult<&Template> {
        validate_template_name(name)?;
        let template = Template::named(name, delimiter, header_record_count, trailer_record_count);
        self.insert(name, template)?;
        self.get_stored(name)
    }

    /// Store `template` under `name` after validating it.
    pub fn insert(&mut self, name: &str, template: Template) -> XtractResult<()> {
        validate_template_name(name)?;
        template.validate(name)?;
        let mut templates = self.templates.clone();
        let replaced = templates.insert(name.to_string(), template).is_some();
        self.commit(templates)?;
        if replaced {
            info!("Overwrote template '{}'", name);
        } else {
            info!("Created template '{}'", name);
        }
        Ok(())
    }

    /// Apply `edit` to an existing template. Invalid results are rejected
    /// and nothing is persisted.
    pub fn update(&mut self, name: &str, edit: TemplateEdit) -> XtractResult<&Template> {
        let mut template = self.get_strict(name)?;
        edit.apply(&mut template);
        template.validate(name)?;
        let mut templates = self.templates.clone();
        templates.insert(name.to_string(), template);
        self.commit(templates)?;
        info!("Updated template '{}'", name);
        self.get_stored(name)
    }

    /// Remove `name`. Returns false when it was not present.
    pub fn delete(&mut self, name: &str) -> XtractResult<bool> {
        let mut templates = self.templates.clone();
        if templates.remove(name).is_none() {
            return Ok(false);
        }
        self.commit(templates)?;
        info!("Deleted template '{}'", name);
        Ok(true)
    }

    fn get_stored(&self, name: &str) -> XtractResult<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| XtractError::MissingTemplate(name.to_string()))
    }

    /// Persist `templates`, then adopt them. A failed write leaves the
    /// store unchanged.
    fn commit(&mut self, templates: BTreeMap<String, Template>) -> XtractResult<()> {
        self.save(&templates)?;
        self.templates = templates;
        Ok(())
    }

    fn save(&self, templates: &BTreeMap<String, Template>) -> XtractResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = StoreFile {
            templates: templates.clone(),
        };
        let content = if is_json(path) {
            serde_json::to_string_pretty(&file)?
        } else {
            serde_yaml::to_string(&file)?
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| XtractError::io_at("create directory", &dir, e))?;

        // Write beside the target and rename, so a failed write never
        // truncates the existing store.
        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| XtractError::io_at("create temporary file in", &dir, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| XtractError::io_at("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(path)
            .map_err(|e| XtractError::io_at("write template store", path, e.error))?;

        debug!(
            "Saved {} template(s) to {}",
            templates.len(),
            path.display()
        );
        Ok(())
    }
}

fn default_entries() -> BTreeMap<String, Template> {
    let mut templates = BTreeMap::new();
    templates.insert(DEFAULT_TEMPLATE_NAME.to_string(), Template::default());
    templates
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Template names appear inside generated file names.
fn validate_template_name(name: &str) -> XtractResult<()> {
    let pattern = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").map_err(|e| {
        XtractError::InvalidTemplate {
            name: name.to_string(),
            reason: format!("Regex error: {}", e),
        }
    })?;
    if !pattern.is_match(name) {
        return Err(XtractError::InvalidTemplate {
            name: name.to_string(),
            reason: "names may contain only letters, digits, '_' and '-'".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_store_has_default() {
        let store = TemplateStore::in_memory();
        assert_eq!(store.list(), vec![DEFAULT_TEMPLATE_NAME.to_string()]);
        assert!(store.exists(DEFAULT_TEMPLATE_NAME));
        assert!(store.path().is_none());
    }

    #[test]
    fn test_get_falls_back_but_strict_fails() {
        let store = TemplateStore::in_memory();
        assert_eq!(store.get("nope"), Template::default());
        assert!(matches!(
            store.get_strict("nope"),
            Err(XtractError::MissingTemplate(name)) if name == "nope"
        ));
        assert!(store.lookup("nope", TemplateLookup::OrDefault).is_ok());
        assert!(store.lookup("nope", TemplateLookup::Strict).is_err());
    }

    #[test]
    fn test_validate_template_name() {
        assert!(validate_template_name("Acme_Daily-2").is_ok());
        assert!(validate_template_name("").is_err());
        assert!(validate_template_name("a.b").is_err());
        assert!(validate_template_name("../x").is_err());
    }

    #[test]
    fn test_update_rejects_invalid_edit_without_saving() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("templates.yaml");
        let mut store = TemplateStore::open(&path).unwrap();
        store.create("Acme", '|', 1, 1).unwrap();

        let edit = TemplateEdit {
            header_format: Some("HDR|{timestamp".to_string()),
            ..TemplateEdit::default()
        };
        assert!(store.update("Acme", edit).is_err());

        let reloaded = TemplateStore::open(&path).unwrap();
        assert_eq!(
            reloaded.get_strict("Acme").unwrap().header_format,
            "HDR|{trading_request_id}|{timestamp}|{sheet_name}"
        );
    }

    #[test]
    fn test_edit_is_empty() {
        assert!(TemplateEdit::default().is_empty());
        let edit = TemplateEdit {
            duplicate_sheets: Some(DuplicateSheetPolicy::LastWins),
            ..TemplateEdit::default()
        };
        assert!(!edit.is_empty());
    }
}
