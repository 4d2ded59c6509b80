use std::collections::BTreeMap;

use pve_core::{
    NetworkConfig, PermissionConfig, ResourceCategory, StorageConfig, UserConfig, VmConfig,
};
use serde::{Deserialize, Serialize};

pub use pve_storage::BoxFuture;

use crate::error::InfraError;

/// Attribute map sent with create/update calls, keyed by Proxmox parameter name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Proxmox VE API surface consumed by the reconciliation engine.
///
/// Transport, authentication, timeouts and retries live behind this trait.
/// Every call is a suspension point. Methods return boxed futures for dyn
/// compatibility.
pub trait InfraClient: Send + Sync {
    fn list_vms(&self) -> BoxFuture<'_, Result<BTreeMap<String, VmConfig>, InfraError>>;

    fn list_networks(&self) -> BoxFuture<'_, Result<BTreeMap<String, NetworkConfig>, InfraError>>;

    fn list_storage(&self) -> BoxFuture<'_, Result<BTreeMap<String, StorageConfig>, InfraError>>;

    /// ACL entries keyed by [`PermissionConfig::key`].
    fn list_permissions(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, PermissionConfig>, InfraError>>;

    fn list_users(&self) -> BoxFuture<'_, Result<BTreeMap<String, UserConfig>, InfraError>>;

    /// Apply `attributes` to an existing resource. `Ok(false)` = the API refused the change.
    fn update_resource<'a>(
        &'a self,
        category: ResourceCategory,
        id: &'a str,
        attributes: &'a Attributes,
    ) -> BoxFuture<'a, Result<bool, InfraError>>;

    fn create_resource<'a>(
        &'a self,
        category: ResourceCategory,
        id: &'a str,
        attributes: &'a Attributes,
    ) -> BoxFuture<'a, Result<(), InfraError>>;

    fn delete_resource<'a>(
        &'a self,
        category: ResourceCategory,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), InfraError>>;

    fn get_cluster_status(&self) -> BoxFuture<'_, Result<ClusterStatus, InfraError>>;

    fn get_node_status<'a>(&'a self, node: &'a str) -> BoxFuture<'a, Result<NodeStatus, InfraError>>;
}

/// Encrypted secret storage. Values are never logged or cached by this crate.
pub trait CredentialProvider: Send + Sync {
    fn get_credential<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, InfraError>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub quorate: bool,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node: String,
    /// CPU load, 0.0–1.0
    pub cpu: f64,
    pub memory_used: u64,
    pub memory_total: u64,
    pub uptime: u64,
}

impl NodeStatus {
    pub fn memory_ratio(&self) -> f64 {
        if self.memory_total == 0 {
            return 0.0;
        }
        self.memory_used as f64 / self.memory_total as f64
    }
}
