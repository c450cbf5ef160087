//! Scratch workspace management.
//!
//! Every build owns uniquely named staging directories under the output
//! directory. The manager destroys each created directory exactly once on
//! every exit path of the build; `Drop` is the backstop for panics and early
//! returns that bypass the explicit cleanup call. Destruction is best-effort:
//! a directory that cannot be removed is logged, never raised.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SkilletError};
use crate::log::Log;

/// Manager for a build's temporary staging directories
#[derive(Debug)]
pub struct Scratch {
    output_dir: PathBuf,
    created: Vec<PathBuf>,
    log: Log,
}

impl Scratch {
    pub fn new(output_dir: impl Into<PathBuf>, log: Log) -> Self {
        Self {
            output_dir: output_dir.into(),
            created: Vec::new(),
            log,
        }
    }

    /// Create a uniquely named scratch directory under the output location.
    /// Names never collide with a concurrently running build.
    pub fn create(&mut self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| SkilletError::WorkspaceCreateFailed {
            message: format!(
                "cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            ),
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!(".skillet-{name}-"))
            .tempdir_in(&self.output_dir)
            .map_err(|e| SkilletError::WorkspaceCreateFailed {
                message: format!("cannot create scratch directory in {}: {}", self.output_dir.display(), e),
            })?;

        // Ownership moves to this manager; cleanup() removes it
        let path = dir.keep();
        self.created.push(path.clone());
        Ok(path)
    }

    /// Remove every directory created by this manager. Idempotent; failures
    /// are logged and skipped so teardown can never mask the build's result.
    pub fn cleanup(&mut self) {
        for path in self.created.drain(..) {
            remove_logged(&path, &self.log);
        }
    }
}

fn remove_logged(path: &Path, log: &Log) {
    if let Err(e) = fs::remove_dir_all(path) {
        if path.exists() {
            log.warn(format!("could not remove {}: {}", path.display(), e));
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.cleanup();
    }
}
