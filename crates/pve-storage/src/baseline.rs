use std::path::{Path, PathBuf};

use pve_core::{Baseline, paths};

use crate::documents;
use crate::error::StorageError;

/// Persists the expected-state snapshot at `<state_dir>/baseline.json`.
///
/// Capturing live state is the drift detector's job; this type only reads
/// and atomically replaces the document.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(paths::BASELINE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// `Ok(None)` when no baseline has been created yet.
    pub fn load(&self) -> Result<Option<Baseline>, StorageError> {
        let baseline = documents::read_json::<Baseline>(&self.path)?;
        if baseline.is_some() {
            tracing::debug!(path = %self.path.display(), "baseline loaded");
        }
        Ok(baseline)
    }

    /// The persisted baseline, or an empty per-category structure if none exists.
    pub fn load_or_empty(&self) -> Result<Baseline, StorageError> {
        Ok(self.load()?.unwrap_or_else(Baseline::empty))
    }

    /// Replace the baseline. Never leaves a partially written document.
    pub fn save(&self, baseline: &Baseline) -> Result<(), StorageError> {
        documents::write_json_atomic(&self.path, baseline)?;
        tracing::info!(
            path = %self.path.display(),
            resources = baseline.resource_count(),
            "baseline saved"
        );
        Ok(())
    }
}
