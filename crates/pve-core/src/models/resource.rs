use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The resource categories tracked by a baseline.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Vm,
    Network,
    Storage,
    Permission,
    User,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 5] = [
        ResourceCategory::Vm,
        ResourceCategory::Network,
        ResourceCategory::Storage,
        ResourceCategory::Permission,
        ResourceCategory::User,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Permission => "permission",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

/// QEMU guest configuration as reported by `/nodes/{node}/qemu/{vmid}/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sockets: Option<u32>,
    /// Boot order, e.g. "order=scsi0;net0"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<String>,
    /// Primary disk, e.g. "local-lvm:vm-100-disk-0,size=32G"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsi0: Option<String>,
    /// Primary network device, e.g. "virtio=BC:24:11:00:00:01,bridge=vmbr0"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection: Option<bool>,
    /// Start at node boot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub template: bool,
}

/// Node network interface (`/nodes/{node}/network/{iface}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// Storage definition (`/storage/{storage}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Comma-separated content types, e.g. "images,rootdir"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "maxfiles", skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
}

/// All roles granted to one user or group on one ACL path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub path: String,
    pub ugid: String,
    pub roles: BTreeSet<String>,
    pub propagate: bool,
}

impl PermissionConfig {
    pub fn new(path: impl Into<String>, ugid: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ugid: ugid.into(),
            roles: BTreeSet::new(),
            propagate: true,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Key under which this entry is stored in a baseline, e.g. `/vms/100|ops@pve`.
    pub fn key(&self) -> String {
        format!("{}|{}", self.path, self.ugid)
    }
}

/// Access-control user (`/access/users/{userid}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    /// Expiry as a unix timestamp; 0 means never.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire: Option<i64>,
    pub groups: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_its_name() {
        for category in ResourceCategory::ALL {
            assert_eq!(category.as_str().parse::<ResourceCategory>().unwrap(), category);
        }
        assert!("lxc".parse::<ResourceCategory>().is_err());
    }

    #[test]
    fn storage_uses_proxmox_field_names() {
        let storage: StorageConfig = serde_json::from_value(serde_json::json!({
            "type": "dir",
            "path": "/var/lib/vz",
            "maxfiles": 3,
        }))
        .unwrap();
        assert_eq!(storage.kind.as_deref(), Some("dir"));
        assert_eq!(storage.max_files, Some(3));
        assert_eq!(storage.content, None);
    }

    #[test]
    fn permission_key_joins_path_and_ugid() {
        let acl = PermissionConfig::new("/vms/100", "ops@pve").with_role("PVEVMUser");
        assert_eq!(acl.key(), "/vms/100|ops@pve");
        assert!(acl.roles.contains("PVEVMUser"));
    }
}
