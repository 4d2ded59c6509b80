use std::path::PathBuf;

use pve_core::{CoreError, Environment, ExecutionStatus, ResourceCategory, Stage};
use pve_drift::{DriftError, InfraError};
use pve_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("a deployment to {0} is already running")]
    EnvironmentBusy(Environment),

    #[error("execution not found: {0}")]
    NotFound(String),

    #[error("execution {id} is {status}, expected pending")]
    NotPending { id: String, status: ExecutionStatus },

    #[error("{stage} stage failed")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Why a pipeline stage stopped the execution.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("cannot read {}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}", path.display())]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid deployment manifest {}", path.display())]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cluster has no quorum")]
    NoQuorum,

    #[error("missing VM templates: {}", .0.join(", "))]
    MissingTemplates(Vec<String>),

    #[error("insecure configuration: {0}")]
    Insecure(String),

    #[error("credential not available: {0}")]
    MissingCredential(String),

    #[error("smoke VMID {vmid} is in use by {name:?}")]
    SmokeVmidInUse { vmid: String, name: String },

    #[error("smoke test failed")]
    SmokeTest(#[source] InfraError),

    #[error("{count} critical drift record(s) on {}", resources.join(", "))]
    CriticalDrift { count: usize, resources: Vec<String> },

    #[error("update of {category}/{id} was rejected")]
    Rejected { category: ResourceCategory, id: String },

    #[error("{category}/{id} did not reach expected state ({attribute})")]
    NotConverged {
        category: ResourceCategory,
        id: String,
        attribute: String,
    },

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error(transparent)]
    Drift(#[from] DriftError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
