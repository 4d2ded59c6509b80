//! pve-workflow
//!
//! Environment-gated deployment pipeline for Proxmox VE.
//!
//! Public API:
//! - `WorkflowOrchestrator::execute_deployment_workflow()` — validate, test, deploy, verify
//! - `WorkflowOrchestrator::approve_execution()` / `cancel_execution()` — resolve a pending execution
//! - `WorkflowOrchestrator::get_execution_status()` / `list_executions()` — execution registry reads
//! - `WorkflowOrchestrator::start_drift_monitoring()` — background drift monitor

pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod stages;

pub use crate::error::{StageError, WorkflowError};
pub use crate::manifest::{ChangeAction, DeploymentManifest, ResourceChange};
pub use crate::orchestrator::WorkflowOrchestrator;
