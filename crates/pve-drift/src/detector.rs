use std::path::{Path, PathBuf};
use std::sync::Arc;

use pve_audit::{AuditEvent, Outcome};
use pve_core::{Baseline, DriftRecord, DriftReport, ResourceCategory, Severity};
use pve_storage::{BaselineStore, archive};

use crate::capture::capture_live_state;
use crate::client::{Attributes, InfraClient};
use crate::compare;
use crate::error::{DriftError, InfraError};
use crate::lease::ResourceLeases;
use crate::tracked::{TrackedAttribute, VmAttribute};

/// Compares live Proxmox state against the persisted baseline.
///
/// Detection is fail-soft: a category whose fetch fails contributes no
/// records and the remaining categories are still reported.
pub struct DriftDetector {
    client: Arc<dyn InfraClient>,
    baseline: BaselineStore,
    state_dir: PathBuf,
    leases: Arc<ResourceLeases>,
}

impl DriftDetector {
    pub fn new(client: Arc<dyn InfraClient>, state_dir: &Path, leases: Arc<ResourceLeases>) -> Self {
        Self {
            client,
            baseline: BaselineStore::new(state_dir),
            state_dir: state_dir.to_path_buf(),
            leases,
        }
    }

    pub fn client(&self) -> &Arc<dyn InfraClient> {
        &self.client
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn leases(&self) -> &Arc<ResourceLeases> {
        &self.leases
    }

    /// Snapshot every category from live state and replace the baseline.
    ///
    /// If any category cannot be fetched the previous baseline is kept.
    pub async fn create_baseline(&self) -> Result<Baseline, DriftError> {
        let snapshot = capture_live_state(self.client.as_ref()).await?;
        self.baseline.save(&snapshot)?;
        tracing::info!(resources = snapshot.resource_count(), "baseline created");
        Ok(snapshot)
    }

    /// Persisted baseline, or an empty structure when none exists.
    pub fn load_baseline(&self) -> Result<Baseline, DriftError> {
        Ok(self.baseline.load_or_empty()?)
    }

    /// Capture live state without touching the baseline (pre-deployment backups).
    pub async fn capture_state(&self) -> Result<Baseline, DriftError> {
        Ok(capture_live_state(self.client.as_ref()).await?)
    }

    /// Fold the current live state of `resources` into the stored baseline.
    ///
    /// Called after a deployment so intentional changes stop reading as drift.
    /// Resources that no longer exist are dropped from the baseline.
    pub async fn accept_changes(
        &self,
        resources: &[(ResourceCategory, String)],
    ) -> Result<Baseline, DriftError> {
        if resources.is_empty() {
            return self.load_baseline();
        }
        let live = capture_live_state(self.client.as_ref()).await?;
        let mut baseline = match self.baseline.load()? {
            Some(baseline) => baseline,
            None => live.clone(),
        };
        for (category, id) in resources {
            baseline.adopt(&live, *category, id);
        }
        baseline.created_at = live.created_at;
        self.baseline.save(&baseline)?;
        tracing::info!(adopted = resources.len(), "baseline updated with deployed changes");
        Ok(baseline)
    }

    /// Compare live state to the baseline. Never fails.
    ///
    /// Without a baseline, one is created from live state and no drift is
    /// reported for this pass.
    pub async fn detect_all_drift(&self) -> Vec<DriftRecord> {
        let baseline = match self.baseline.load() {
            Ok(Some(baseline)) => baseline,
            Ok(None) => {
                tracing::info!("no baseline found, creating one from live state");
                if let Err(e) = self.create_baseline().await {
                    tracing::error!(error = %e, "failed to create initial baseline");
                }
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load baseline, skipping drift detection");
                return Vec::new();
            }
        };

        let (vms, networks, storage, permissions, users) = tokio::join!(
            self.detect_category(ResourceCategory::Vm, &baseline),
            self.detect_category(ResourceCategory::Network, &baseline),
            self.detect_category(ResourceCategory::Storage, &baseline),
            self.detect_category(ResourceCategory::Permission, &baseline),
            self.detect_category(ResourceCategory::User, &baseline),
        );

        let mut records = vms;
        records.extend(networks);
        records.extend(storage);
        records.extend(permissions);
        records.extend(users);

        tracing::info!(total = records.len(), "drift detection complete");
        records
    }

    async fn detect_category(&self, category: ResourceCategory, baseline: &Baseline) -> Vec<DriftRecord> {
        let result = match category {
            ResourceCategory::Vm => self
                .client
                .list_vms()
                .await
                .map(|live| compare::diff_category(&baseline.vms, &live)),
            ResourceCategory::Network => self
                .client
                .list_networks()
                .await
                .map(|live| compare::diff_category(&baseline.networks, &live)),
            ResourceCategory::Storage => self
                .client
                .list_storage()
                .await
                .map(|live| compare::diff_category(&baseline.storage, &live)),
            ResourceCategory::Permission => self
                .client
                .list_permissions()
                .await
                .map(|live| compare::diff_permissions(&baseline.permissions, &live)),
            ResourceCategory::User => self
                .client
                .list_users()
                .await
                .map(|live| compare::diff_users(&baseline.users, &live)),
        };

        match result {
            Ok(records) => {
                if !records.is_empty() {
                    tracing::debug!(category = %category, count = records.len(), "drift found");
                }
                records
            }
            Err(e) => {
                tracing::error!(
                    category = %category,
                    unreachable = e.is_unreachable(),
                    error = %e,
                    "drift check failed for category"
                );
                Vec::new()
            }
        }
    }

    /// Push the baseline value back for one record. Never fails.
    ///
    /// Only VM drift is remediated automatically. Everything else, and VM
    /// attributes that cannot be safely reverted, stays flagged for review.
    pub async fn remediate_drift(&self, record: &mut DriftRecord) -> bool {
        let result = match record.resource_type {
            ResourceCategory::Vm => self.remediate_vm(record).await,
            ResourceCategory::Network
            | ResourceCategory::Storage
            | ResourceCategory::Permission
            | ResourceCategory::User => Err(DriftError::ManualReview {
                resource_type: record.resource_type,
                resource_id: record.resource_id.clone(),
                reason: format!("{} remediation is not automated", record.resource_type),
            }),
        };

        let audit = AuditEvent::new(
            "remediate_drift",
            record.resource_type.as_str(),
            &record.resource_id,
            "drift-detector",
        );
        match result {
            Ok(()) => {
                record.remediation_required = false;
                tracing::info!(
                    resource_type = %record.resource_type,
                    resource_id = %record.resource_id,
                    attribute = %record.attribute,
                    "drift remediated"
                );
                audit
                    .with_outcome(Outcome::Succeeded)
                    .with_details(serde_json::json!({"attribute": record.attribute}))
                    .emit();
                true
            }
            Err(e) => {
                record.remediation_required = true;
                tracing::warn!(
                    resource_type = %record.resource_type,
                    resource_id = %record.resource_id,
                    attribute = %record.attribute,
                    severity = %record.severity,
                    error = %e,
                    "remediation failed"
                );
                audit
                    .with_outcome(Outcome::Failed)
                    .with_details(serde_json::json!({
                        "attribute": record.attribute,
                        "error": e.to_string(),
                    }))
                    .emit();
                false
            }
        }
    }

    async fn remediate_vm(&self, record: &DriftRecord) -> Result<(), DriftError> {
        let manual = |reason: &str| DriftError::ManualReview {
            resource_type: record.resource_type,
            resource_id: record.resource_id.clone(),
            reason: reason.to_string(),
        };

        let attribute =
            VmAttribute::from_name(&record.attribute).ok_or_else(|| manual("untracked attribute"))?;
        if !attribute.auto_remediable() {
            return Err(manual("change is not reversible"));
        }
        if record.expected_value.is_null() {
            return Err(manual("attribute absent from baseline"));
        }

        let mut attributes = Attributes::new();
        attributes.insert(attribute.name().to_string(), record.expected_value.clone());

        let _lease = self
            .leases
            .acquire(ResourceLeases::resource_key(record.resource_type, &record.resource_id))
            .await;
        match self
            .client
            .update_resource(record.resource_type, &record.resource_id, &attributes)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(DriftError::Rejected {
                resource_type: record.resource_type,
                resource_id: record.resource_id.clone(),
            }),
            Err(e @ InfraError::NotFound { .. }) => Err(manual(&e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize `records` with a severity histogram to a timestamped report.
    pub fn generate_drift_report(&self, records: &[DriftRecord]) -> Result<PathBuf, DriftError> {
        let report = DriftReport::new(records.to_vec());
        if report.by_severity.count(Severity::Critical) > 0 {
            tracing::warn!(critical = report.by_severity.critical, "report contains critical drift");
        }
        Ok(archive::write_drift_report(&self.state_dir, &report)?)
    }
}
