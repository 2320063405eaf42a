//! Scoped staging directories
//!
//! Every encode or decode run owns one [`ScratchArea`]. It starts empty and is
//! removed when dropped, on success and failure alike, so concurrent runs
//! never share staging state.

use crate::error::{XtractError, XtractResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const SCRATCH_PREFIX: &str = ".xtract-";

/// A directory that exists for the lifetime of this value.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// A fresh directory under the system temp location.
    pub fn new() -> XtractResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|e| {
                XtractError::io_at("create scratch directory in", std::env::temp_dir(), e)
            })?;
        debug!("Scratch area {}", dir.path().display());
        Ok(Self { dir })
    }

    /// A fresh directory inside `parent`, so files staged there can be
    /// renamed into `parent` without crossing filesystems.
    pub fn new_in(parent: &Path) -> XtractResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| XtractError::io_at("create scratch directory in", parent, e))?;
        debug!("Scratch area {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path().join(name)
    }
}
