//! xtract - template-driven spreadsheet ↔ flat-file archive converter
//!
//! Encoding turns every sheet of a workbook into a delimited text file framed
//! by header and trailer records, and bundles the files into one zip archive.
//! Decoding reads such an archive back into a single workbook. A named
//! [`Template`](template::Template) governs the delimiter, the record framing
//! and the naming of files and archives.
//!
//! # Example
//!
//! ```no_run
//! use xtract::service::Converter;
//! use xtract::template::{TemplateStore, DEFAULT_TEMPLATE_NAME};
//! use std::path::Path;
//!
//! let store = TemplateStore::open("xtract-templates.yaml")?;
//! let converter = Converter::new(store).with_output_dir("out");
//!
//! let encoded = converter.encode(Path::new("positions.xlsx"), DEFAULT_TEMPLATE_NAME)?;
//! println!("Archive: {}", encoded.archive_path.display());
//!
//! let decoded = converter.decode(&encoded.archive_path, DEFAULT_TEMPLATE_NAME)?;
//! println!("Workbook: {}", decoded.workbook_path.display());
//! # Ok::<(), xtract::error::XtractError>(())
//! ```

pub mod cli;
pub mod codec;
pub mod error;
pub mod excel;
pub mod logging;
pub mod naming;
pub mod paths;
pub mod scratch;
pub mod service;
pub mod template;
pub mod tokens;
pub mod types;

// Re-export commonly used types
pub use error::{XtractError, XtractResult};
pub use service::Converter;
pub use template::{Template, TemplateStore};
pub use types::{SheetTable, Workbook};
