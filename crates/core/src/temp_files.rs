//! Temporary output paths for calls that do not name their output.
//!
//! The registry owns deletion of every path it hands out. Paths are removed
//! by [`TempFileRegistry::cleanup`] or when the registry is dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

/// File name prefix of every issued path.
pub const TEMP_PREFIX: &str = "ncoPy";

#[derive(Debug)]
pub struct TempFileRegistry {
    dir: PathBuf,
    persist: AtomicBool,
    paths: Mutex<Vec<PathBuf>>,
}

impl TempFileRegistry {
    /// Registry issuing paths under the system temp directory.
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            persist: AtomicBool::new(false),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// In persist mode issued paths are not tracked and survive cleanup.
    pub fn set_persist(&self, persist: bool) {
        self.persist.store(persist, Ordering::Relaxed);
    }

    pub fn is_persistent(&self) -> bool {
        self.persist.load(Ordering::Relaxed)
    }

    /// Issue a fresh, unique path that does not exist yet.
    ///
    /// The name is reserved by creating the file and removing it again, so
    /// the operator creates the output itself.
    pub fn issue_path(&self) -> io::Result<PathBuf> {
        if self.is_persistent() {
            return Ok(self
                .dir
                .join(format!("{TEMP_PREFIX}{}", Uuid::new_v4().simple())));
        }

        let reserved = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        let path = reserved.path().to_path_buf();
        reserved.close()?;

        self.lock().push(path.clone());
        tracing::trace!(path = %path.display(), "Issued temporary output path");
        Ok(path)
    }

    /// Paths currently awaiting cleanup.
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    /// Delete every tracked path that still exists as a file.
    ///
    /// Missing files are skipped; other deletion failures are logged and
    /// otherwise ignored.
    pub fn cleanup(&self) {
        let paths = std::mem::take(&mut *self.lock());
        for path in paths.iter().filter(|path| path.is_file()) {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TempFileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempFileRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
