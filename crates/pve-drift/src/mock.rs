//! In-memory Proxmox double for tests and dry runs.
//!
//! Serves a scriptable live state, applies create/update/delete calls to it,
//! records every write, and can fail individual categories on demand.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pve_core::{Baseline, ResourceCategory};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use crate::client::{
    Attributes, BoxFuture, ClusterStatus, CredentialProvider, InfraClient, NodeStatus, NodeSummary,
};
use crate::error::InfraError;

/// One recorded write against the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub category: ResourceCategory,
    pub id: String,
    pub attributes: Attributes,
}

#[derive(Debug)]
struct MockState {
    live: Baseline,
    failing: HashSet<ResourceCategory>,
    cluster_unreachable: bool,
    quorate: bool,
    reject_updates: bool,
    cluster_gate: Option<Arc<Notify>>,
    vm_list_gate: Option<Arc<Notify>>,
    nodes: Vec<NodeStatus>,
    updates: Vec<WriteCall>,
    creates: Vec<WriteCall>,
    deletes: Vec<(ResourceCategory, String)>,
}

pub struct MockInfra {
    state: Mutex<MockState>,
}

impl MockInfra {
    pub fn new(live: Baseline) -> Self {
        Self {
            state: Mutex::new(MockState {
                live,
                failing: HashSet::new(),
                cluster_unreachable: false,
                quorate: true,
                reject_updates: false,
                cluster_gate: None,
                vm_list_gate: None,
                nodes: vec![NodeStatus {
                    node: "pve1".into(),
                    cpu: 0.12,
                    memory_used: 8 << 30,
                    memory_total: 64 << 30,
                    uptime: 86_400,
                }],
                updates: Vec::new(),
                creates: Vec::new(),
                deletes: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current live state (with `created_at` cleared).
    pub fn live(&self) -> Baseline {
        let mut live = self.state().live.clone();
        live.created_at = None;
        live
    }

    /// Edit live state in place, e.g. to simulate an out-of-band change.
    pub fn mutate(&self, f: impl FnOnce(&mut Baseline)) {
        f(&mut self.state().live);
    }

    /// Listing `category` fails with `Unreachable` until healed.
    pub fn fail_category(&self, category: ResourceCategory) {
        self.state().failing.insert(category);
    }

    pub fn heal_category(&self, category: ResourceCategory) {
        self.state().failing.remove(&category);
    }

    pub fn set_cluster_unreachable(&self, unreachable: bool) {
        self.state().cluster_unreachable = unreachable;
    }

    pub fn set_quorate(&self, quorate: bool) {
        self.state().quorate = quorate;
    }

    /// Updates return `Ok(false)` without applying anything.
    pub fn reject_updates(&self, reject: bool) {
        self.state().reject_updates = reject;
    }

    /// `get_cluster_status` waits for a notification on `gate` before answering.
    pub fn set_cluster_gate(&self, gate: Option<Arc<Notify>>) {
        self.state().cluster_gate = gate;
    }

    /// `list_vms` waits for a notification on `gate` before answering.
    pub fn set_vm_list_gate(&self, gate: Option<Arc<Notify>>) {
        self.state().vm_list_gate = gate;
    }

    pub fn set_nodes(&self, nodes: Vec<NodeStatus>) {
        self.state().nodes = nodes;
    }

    pub fn update_calls(&self) -> Vec<WriteCall> {
        self.state().updates.clone()
    }

    pub fn create_calls(&self) -> Vec<WriteCall> {
        self.state().creates.clone()
    }

    pub fn delete_calls(&self) -> Vec<(ResourceCategory, String)> {
        self.state().deletes.clone()
    }

    fn check(&self, category: ResourceCategory) -> Result<(), InfraError> {
        if self.state().failing.contains(&category) {
            return Err(InfraError::Unreachable(format!("{category} endpoint unreachable")));
        }
        Ok(())
    }

    fn list<T: Clone>(
        &self,
        category: ResourceCategory,
        pick: impl FnOnce(&Baseline) -> &BTreeMap<String, T>,
    ) -> Result<BTreeMap<String, T>, InfraError> {
        self.check(category)?;
        Ok(pick(&self.state().live).clone())
    }
}

/// Merge `attributes` into the serialized resource. `null` removes a field.
fn merge<T: Serialize + DeserializeOwned>(current: &T, attributes: &Attributes) -> Result<T, InfraError> {
    let mut value = serde_json::to_value(current).map_err(|e| InfraError::Api(e.to_string()))?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| InfraError::Api("resource is not an object".into()))?;
    for (key, attr) in attributes {
        if attr.is_null() {
            obj.remove(key);
        } else {
            obj.insert(key.clone(), attr.clone());
        }
    }
    serde_json::from_value(value).map_err(|e| InfraError::Api(format!("invalid attributes: {e}")))
}

fn apply<T: Serialize + DeserializeOwned + Default>(
    map: &mut BTreeMap<String, T>,
    category: ResourceCategory,
    id: &str,
    attributes: &Attributes,
    create: bool,
) -> Result<(), InfraError> {
    let next = match (map.get(id), create) {
        (Some(_), true) => {
            return Err(InfraError::Api(format!("{category}/{id} already exists")));
        }
        (None, false) => {
            return Err(InfraError::NotFound {
                category,
                id: id.to_string(),
            });
        }
        (Some(current), false) => merge(current, attributes)?,
        (None, true) => merge(&T::default(), attributes)?,
    };
    map.insert(id.to_string(), next);
    Ok(())
}

fn write(
    live: &mut Baseline,
    category: ResourceCategory,
    id: &str,
    attributes: &Attributes,
    create: bool,
) -> Result<(), InfraError> {
    match category {
        ResourceCategory::Vm => apply(&mut live.vms, category, id, attributes, create),
        ResourceCategory::Network => apply(&mut live.networks, category, id, attributes, create),
        ResourceCategory::Storage => apply(&mut live.storage, category, id, attributes, create),
        ResourceCategory::Permission => {
            apply(&mut live.permissions, category, id, attributes, create)
        }
        ResourceCategory::User => apply(&mut live.users, category, id, attributes, create),
    }
}

fn remove(live: &mut Baseline, category: ResourceCategory, id: &str) -> bool {
    match category {
        ResourceCategory::Vm => live.vms.remove(id).is_some(),
        ResourceCategory::Network => live.networks.remove(id).is_some(),
        ResourceCategory::Storage => live.storage.remove(id).is_some(),
        ResourceCategory::Permission => live.permissions.remove(id).is_some(),
        ResourceCategory::User => live.users.remove(id).is_some(),
    }
}

impl InfraClient for MockInfra {
    fn list_vms(&self) -> BoxFuture<'_, Result<BTreeMap<String, pve_core::VmConfig>, InfraError>> {
        Box::pin(async move {
            let gate = self.state().vm_list_gate.clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.list(ResourceCategory::Vm, |l| &l.vms)
        })
    }

    fn list_networks(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, pve_core::NetworkConfig>, InfraError>> {
        Box::pin(async move { self.list(ResourceCategory::Network, |l| &l.networks) })
    }

    fn list_storage(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, pve_core::StorageConfig>, InfraError>> {
        Box::pin(async move { self.list(ResourceCategory::Storage, |l| &l.storage) })
    }

    fn list_permissions(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, pve_core::PermissionConfig>, InfraError>> {
        Box::pin(async move { self.list(ResourceCategory::Permission, |l| &l.permissions) })
    }

    fn list_users(&self) -> BoxFuture<'_, Result<BTreeMap<String, pve_core::UserConfig>, InfraError>> {
        Box::pin(async move { self.list(ResourceCategory::User, |l| &l.users) })
    }

    fn update_resource<'a>(
        &'a self,
        category: ResourceCategory,
        id: &'a str,
        attributes: &'a Attributes,
    ) -> BoxFuture<'a, Result<bool, InfraError>> {
        Box::pin(async move {
            self.check(category)?;
            let mut state = self.state();
            state.updates.push(WriteCall {
                category,
                id: id.to_string(),
                attributes: attributes.clone(),
            });
            if state.reject_updates {
                return Ok(false);
            }
            write(&mut state.live, category, id, attributes, false)?;
            Ok(true)
        })
    }

    fn create_resource<'a>(
        &'a self,
        category: ResourceCategory,
        id: &'a str,
        attributes: &'a Attributes,
    ) -> BoxFuture<'a, Result<(), InfraError>> {
        Box::pin(async move {
            self.check(category)?;
            let mut state = self.state();
            state.creates.push(WriteCall {
                category,
                id: id.to_string(),
                attributes: attributes.clone(),
            });
            write(&mut state.live, category, id, attributes, true)
        })
    }

    fn delete_resource<'a>(
        &'a self,
        category: ResourceCategory,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), InfraError>> {
        Box::pin(async move {
            self.check(category)?;
            let mut state = self.state();
            state.deletes.push((category, id.to_string()));
            if remove(&mut state.live, category, id) {
                Ok(())
            } else {
                Err(InfraError::NotFound {
                    category,
                    id: id.to_string(),
                })
            }
        })
    }

    fn get_cluster_status(&self) -> BoxFuture<'_, Result<ClusterStatus, InfraError>> {
        Box::pin(async move {
            let gate = self.state().cluster_gate.clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let state = self.state();
            if state.cluster_unreachable {
                return Err(InfraError::Unreachable("cluster API unreachable".into()));
            }
            Ok(ClusterStatus {
                quorate: state.quorate,
                nodes: state
                    .nodes
                    .iter()
                    .map(|n| NodeSummary {
                        name: n.node.clone(),
                        online: true,
                    })
                    .collect(),
            })
        })
    }

    fn get_node_status<'a>(&'a self, node: &'a str) -> BoxFuture<'a, Result<NodeStatus, InfraError>> {
        Box::pin(async move {
            let state = self.state();
            if state.cluster_unreachable {
                return Err(InfraError::Unreachable("cluster API unreachable".into()));
            }
            state
                .nodes
                .iter()
                .find(|n| n.node == node)
                .cloned()
                .ok_or_else(|| InfraError::Api(format!("unknown node {node}")))
        })
    }
}

/// Fixed name → secret map.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn get_credential<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, InfraError>> {
        Box::pin(async move { Ok(self.values.get(name).cloned()) })
    }
}
