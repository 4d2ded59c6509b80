//! The four pipeline stages. Each returns the artifact reference recorded
//! on the execution once it completes.

pub mod deploy;
pub mod validate;
pub mod verify;

use pve_core::ReconcileConfig;
use pve_drift::{CredentialProvider, DriftDetector, InfraClient, ResourceLeases};

/// Everything a stage may touch for one execution.
pub struct StageContext<'a> {
    pub execution_id: &'a str,
    pub branch: &'a str,
    pub config: &'a ReconcileConfig,
    pub detector: &'a DriftDetector,
    pub credentials: &'a dyn CredentialProvider,
    pub leases: &'a ResourceLeases,
}

impl StageContext<'_> {
    pub fn client(&self) -> &dyn InfraClient {
        self.detector.client().as_ref()
    }
}
