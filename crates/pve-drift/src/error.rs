use pve_core::ResourceCategory;
use thiserror::Error;

/// Failures reported by an infrastructure client.
///
/// `Unreachable` and `NotFound` are kept apart so callers can tell a network
/// problem from a missing resource.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("infrastructure unreachable: {0}")]
    Unreachable(String),

    #[error("resource not found: {category}/{id}")]
    NotFound {
        category: ResourceCategory,
        id: String,
    },

    #[error("infrastructure API error: {0}")]
    Api(String),
}

impl InfraError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

#[derive(Debug, Error)]
pub enum DriftError {
    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error(transparent)]
    Storage(#[from] pve_storage::StorageError),

    #[error("manual review required for {resource_type}/{resource_id}: {reason}")]
    ManualReview {
        resource_type: ResourceCategory,
        resource_id: String,
        reason: String,
    },

    #[error("update rejected for {resource_type}/{resource_id}")]
    Rejected {
        resource_type: ResourceCategory,
        resource_id: String,
    },

    #[error("alert delivery failed: {0}")]
    Alert(String),
}

/// Walk the full error chain and join all causes into one string.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
