use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type XtractResult<T> = Result<T, XtractError>;

#[derive(Error, Debug)]
pub enum XtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to {action} {}: {source}", .path.display())]
    IoAt {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unresolved token '{{{token}}}' in format \"{format}\"")]
    UnresolvedToken { token: String, format: String },

    #[error("Malformed format \"{format}\": {reason}")]
    MalformedFormat { format: String, reason: String },

    #[error("Name '{name}' does not match the naming grammar: {reason}")]
    NamingGrammar { name: String, reason: String },

    #[error("Template '{0}' not found")]
    MissingTemplate(String),

    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("No data: {0}")]
    NoData(String),

    #[error("Framing error in sheet '{sheet}' (row {row}, column {column}): {reason}")]
    Framing {
        sheet: String,
        row: usize,
        column: usize,
        reason: String,
    },

    #[error("Flat file '{file}': {reason}")]
    FlatFile { file: String, reason: String },

    #[error("Sheet '{sheet}' from '{file}' collides with an earlier flat file")]
    DuplicateSheet { sheet: String, file: String },

    #[error("Import error: {0}")]
    Import(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("{} file(s) failed to decode:\n{}", .0.len(), FailureList(.0))]
    DecodeFailed(Vec<FileFailure>),
}

impl XtractError {
    /// Attach the failing path and action to an IO error.
    pub fn io_at(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        XtractError::IoAt {
            action,
            path: path.into(),
            source,
        }
    }

    /// True for outcomes that mean "nothing to do" rather than a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, XtractError::NoData(_))
    }
}

/// One flat file that could not be decoded.
#[derive(Debug)]
pub struct FileFailure {
    pub file: String,
    pub error: XtractError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.error)
    }
}

struct FailureList<'a>(&'a [FileFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {failure}")?;
        }
        Ok(())
    }
}
