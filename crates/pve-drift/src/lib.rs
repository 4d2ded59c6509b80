//! pve-drift
//!
//! Drift detection and remediation for Proxmox VE.
//!
//! Public API:
//! - `DriftDetector::create_baseline()` — snapshot live state as the new baseline
//! - `DriftDetector::detect_all_drift()` — compare live state to the baseline, never fails
//! - `DriftDetector::remediate_drift()` — push a baseline value back (VMs only)
//! - `DriftDetector::generate_drift_report()` — write a timestamped audit document
//! - `DriftMonitor` — cooperative polling loop with alerting and LOW auto-remediation

pub mod alert;
pub mod capture;
pub mod client;
pub mod compare;
pub mod detector;
pub mod error;
pub mod lease;
pub mod mock;
pub mod monitor;
pub mod tracked;

pub use crate::alert::{AlertSink, DriftAlert, LogAlertSink, RecordingAlertSink};
pub use crate::capture::{capture_live_state, fetch_resource};
pub use crate::client::{
    Attributes, BoxFuture, ClusterStatus, CredentialProvider, InfraClient, NodeStatus,
    NodeSummary,
};
pub use crate::detector::DriftDetector;
pub use crate::error::{DriftError, InfraError, format_err_chain};
pub use crate::lease::{Lease, ResourceLeases};
pub use crate::mock::{MockInfra, StaticCredentials, WriteCall};
pub use crate::monitor::{DriftMonitor, MonitorHandle, TickOutcome};
pub use crate::tracked::{AccessChange, classify};
