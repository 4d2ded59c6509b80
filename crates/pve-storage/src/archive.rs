//! Timestamped audit documents: drift reports and pre-deployment state backups.

use std::path::{Path, PathBuf};

use pve_core::{Baseline, DriftReport, paths};

use crate::documents;
use crate::error::StorageError;

/// Write a drift report to `<state_dir>/drift_reports/` and return its path.
pub fn write_drift_report(state_dir: &Path, report: &DriftReport) -> Result<PathBuf, StorageError> {
    let dir = state_dir.join(paths::DRIFT_REPORTS_DIR);
    std::fs::create_dir_all(&dir)?;
    let slug = paths::timestamp_slug(report.generated_at);
    let path = documents::unique_document_path(&dir, &slug, paths::drift_report);
    documents::write_json_atomic(&path, report)?;

    tracing::info!(
        path = %path.display(),
        total = report.total_drifts,
        critical = report.by_severity.critical,
        "drift report written"
    );
    Ok(path)
}

/// Write a full-state snapshot to `<state_dir>/backups/` and return its path.
pub fn write_state_backup(state_dir: &Path, snapshot: &Baseline) -> Result<PathBuf, StorageError> {
    let dir = state_dir.join(paths::BACKUPS_DIR);
    std::fs::create_dir_all(&dir)?;
    let taken_at = snapshot.created_at.unwrap_or_else(jiff::Timestamp::now);
    let slug = paths::timestamp_slug(taken_at);
    let path = documents::unique_document_path(&dir, &slug, paths::state_backup);
    documents::write_json_atomic(&path, snapshot)?;

    tracing::info!(
        path = %path.display(),
        resources = snapshot.resource_count(),
        "state backup written"
    );
    Ok(path)
}
