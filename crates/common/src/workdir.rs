//! Per-run scratch directory.
//!
//! Every intermediate artifact of a run lives under one `WorkDir`. The
//! directory is removed when the value is dropped, which covers success,
//! errors, and cancellation alike.

use std::path::{Path, PathBuf};

use crate::error::AutocutResult;

/// Owned scratch directory for one run.
#[derive(Debug)]
pub struct WorkDir {
    dir: tempfile::TempDir,
}

impl WorkDir {
    /// Create a fresh directory under the system temp location.
    pub fn new() -> AutocutResult<Self> {
        let dir = tempfile::Builder::new().prefix("autocut_").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "Created working directory");
        Ok(Self { dir })
    }

    /// Create a fresh directory under `parent`.
    pub fn new_in(parent: &Path) -> AutocutResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("autocut_")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a named artifact inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now, surfacing any I/O error.
    pub fn close(self) -> AutocutResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(path = %path.display(), "Removed working directory");
        Ok(())
    }
}
