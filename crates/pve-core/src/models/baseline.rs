use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resource::{
    NetworkConfig, PermissionConfig, ResourceCategory, StorageConfig, UserConfig, VmConfig,
};

/// Expected-state snapshot used as the drift comparison reference.
///
/// The same shape is used for pre-deployment state backups. Maps are keyed
/// by resource id (VMID, interface name, storage id, ACL key, user id).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Baseline {
    /// `None` for the empty structure returned when no baseline exists.
    pub created_at: Option<jiff::Timestamp>,
    pub vms: BTreeMap<String, VmConfig>,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub storage: BTreeMap<String, StorageConfig>,
    pub permissions: BTreeMap<String, PermissionConfig>,
    pub users: BTreeMap<String, UserConfig>,
}

impl Baseline {
    /// Empty per-category structure.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
            && self.networks.is_empty()
            && self.storage.is_empty()
            && self.permissions.is_empty()
            && self.users.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.vms.len()
            + self.networks.len()
            + self.storage.len()
            + self.permissions.len()
            + self.users.len()
    }

    /// Take `source`'s entry for one resource, or drop ours if `source` has none.
    ///
    /// Used to fold intentionally deployed changes into the baseline.
    pub fn adopt(&mut self, source: &Baseline, category: ResourceCategory, id: &str) {
        match category {
            ResourceCategory::Vm => adopt_entry(&mut self.vms, &source.vms, id),
            ResourceCategory::Network => adopt_entry(&mut self.networks, &source.networks, id),
            ResourceCategory::Storage => adopt_entry(&mut self.storage, &source.storage, id),
            ResourceCategory::Permission => {
                adopt_entry(&mut self.permissions, &source.permissions, id)
            }
            ResourceCategory::User => adopt_entry(&mut self.users, &source.users, id),
        }
    }
}

fn adopt_entry<T: Clone>(ours: &mut BTreeMap<String, T>, theirs: &BTreeMap<String, T>, id: &str) {
    match theirs.get(id) {
        Some(entry) => {
            ours.insert(id.to_string(), entry.clone());
        }
        None => {
            ours.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_categories_deserialize_empty() {
        let baseline: Baseline =
            serde_json::from_str(r#"{"vms": {"100": {"memory": 2048}}}"#).unwrap();
        assert_eq!(baseline.vms["100"].memory, Some(2048));
        assert!(baseline.users.is_empty());
        assert_eq!(baseline.created_at, None);
        assert_eq!(baseline.resource_count(), 1);
    }

    #[test]
    fn adopt_copies_or_drops_one_entry() {
        let mut baseline: Baseline =
            serde_json::from_str(r#"{"vms": {"100": {"memory": 2048}, "101": {"cores": 1}}}"#)
                .unwrap();
        let live: Baseline =
            serde_json::from_str(r#"{"vms": {"100": {"memory": 4096}, "101": {"cores": 4}}}"#)
                .unwrap();

        baseline.adopt(&live, ResourceCategory::Vm, "100");
        baseline.adopt(&live, ResourceCategory::Vm, "102");
        assert_eq!(baseline.vms["100"].memory, Some(4096));
        assert_eq!(baseline.vms["101"].cores, Some(1));
        assert!(!baseline.vms.contains_key("102"));

        baseline.adopt(&Baseline::empty(), ResourceCategory::Vm, "101");
        assert!(!baseline.vms.contains_key("101"));
    }
}
