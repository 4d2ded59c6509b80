//! pve-core
//!
//! Pure domain types for Proxmox VE reconciliation: typed resource schemas,
//! baselines, drift records, workflow executions, file-layout conventions,
//! and the versioned configuration document.
//! No infrastructure client dependency; this is the shared vocabulary of the
//! drift detector and the workflow orchestrator.

pub mod config;
pub mod error;
pub mod models;
pub mod paths;

pub use crate::config::{EnvironmentPolicies, MonitorSettings, ReconcileConfig};
pub use crate::error::CoreError;
pub use crate::models::baseline::Baseline;
pub use crate::models::drift::{DriftRecord, DriftReport, Severity, SeveritySummary};
pub use crate::models::resource::{
    NetworkConfig, PermissionConfig, ResourceCategory, StorageConfig, UserConfig, VmConfig,
};
pub use crate::models::workflow::{
    Artifact, Environment, EnvironmentPolicy, ExecutionStatus, Stage, WorkflowExecution,
};
