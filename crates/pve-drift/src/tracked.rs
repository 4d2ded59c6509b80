//! Tracked-attribute tables.
//!
//! Each resource schema names the attributes compared against the baseline
//! and the severity a mismatch carries. Severity depends only on the
//! category, the attribute and, for ACLs, the direction of the access change.

use pve_core::{
    DriftRecord, NetworkConfig, PermissionConfig, ResourceCategory, Severity, StorageConfig,
    UserConfig, VmConfig,
};
use serde_json::{Value, json};

/// Attribute name used for account-existence drift.
pub const EXISTENCE: &str = "existence";

/// Direction of an ACL role change relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    /// Live state grants a role the baseline does not.
    Granted,
    /// Live state lacks a role the baseline grants.
    Revoked,
}

pub trait TrackedAttribute: Copy + Eq + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn severity(self) -> Severity;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// A resource schema with a fixed allowlist of compared attributes.
pub trait Tracked {
    type Attribute: TrackedAttribute;
    const CATEGORY: ResourceCategory;

    fn value_of(&self, attribute: Self::Attribute) -> Value;
}

/// One record per tracked attribute whose value differs.
pub fn diff_tracked<T: Tracked>(id: &str, expected: &T, actual: &T) -> Vec<DriftRecord> {
    T::Attribute::ALL
        .iter()
        .filter_map(|&attribute| {
            let want = expected.value_of(attribute);
            let have = actual.value_of(attribute);
            (want != have).then(|| {
                DriftRecord::new(T::CATEGORY, id, attribute.name(), want, have, attribute.severity())
            })
        })
        .collect()
}

/// Severity for a (category, attribute, access direction) triple.
///
/// Attributes outside a category's table classify LOW.
pub fn classify(
    category: ResourceCategory,
    attribute: &str,
    access: Option<AccessChange>,
) -> Severity {
    match category {
        ResourceCategory::Vm => table_severity::<VmAttribute>(attribute),
        ResourceCategory::Network => table_severity::<NetworkAttribute>(attribute),
        ResourceCategory::Storage => table_severity::<StorageAttribute>(attribute),
        ResourceCategory::Permission => match access {
            Some(AccessChange::Granted) => Severity::Critical,
            Some(AccessChange::Revoked) => Severity::High,
            None => table_severity::<PermissionAttribute>(attribute),
        },
        ResourceCategory::User if attribute == EXISTENCE => Severity::Critical,
        ResourceCategory::User => table_severity::<UserAttribute>(attribute),
    }
}

fn table_severity<A: TrackedAttribute>(name: &str) -> Severity {
    A::from_name(name).map_or(Severity::Low, A::severity)
}

// ── VMs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmAttribute {
    Memory,
    Cores,
    Boot,
    PrimaryDisk,
    Sockets,
    PrimaryNetwork,
    Firewall,
    Protection,
    OnBoot,
    Name,
    Tags,
}

impl VmAttribute {
    /// Disk changes (resize, move) cannot be rolled back by writing the old value.
    pub fn auto_remediable(self) -> bool {
        !matches!(self, Self::PrimaryDisk)
    }
}

impl TrackedAttribute for VmAttribute {
    const ALL: &'static [Self] = &[
        Self::Memory,
        Self::Cores,
        Self::Boot,
        Self::PrimaryDisk,
        Self::Sockets,
        Self::PrimaryNetwork,
        Self::Firewall,
        Self::Protection,
        Self::OnBoot,
        Self::Name,
        Self::Tags,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cores => "cores",
            Self::Boot => "boot",
            Self::PrimaryDisk => "scsi0",
            Self::Sockets => "sockets",
            Self::PrimaryNetwork => "net0",
            Self::Firewall => "firewall",
            Self::Protection => "protection",
            Self::OnBoot => "onboot",
            Self::Name => "name",
            Self::Tags => "tags",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Memory | Self::Cores | Self::Boot | Self::PrimaryDisk => Severity::High,
            Self::Sockets | Self::PrimaryNetwork => Severity::Medium,
            // security-sensitive
            Self::Firewall | Self::Protection | Self::OnBoot => Severity::High,
            Self::Name | Self::Tags => Severity::Low,
        }
    }
}

impl Tracked for VmConfig {
    type Attribute = VmAttribute;
    const CATEGORY: ResourceCategory = ResourceCategory::Vm;

    fn value_of(&self, attribute: VmAttribute) -> Value {
        match attribute {
            VmAttribute::Memory => json!(self.memory),
            VmAttribute::Cores => json!(self.cores),
            VmAttribute::Boot => json!(self.boot),
            VmAttribute::PrimaryDisk => json!(self.scsi0),
            VmAttribute::Sockets => json!(self.sockets),
            VmAttribute::PrimaryNetwork => json!(self.net0),
            VmAttribute::Firewall => json!(self.firewall),
            VmAttribute::Protection => json!(self.protection),
            VmAttribute::OnBoot => json!(self.onboot),
            VmAttribute::Name => json!(self.name),
            VmAttribute::Tags => json!(self.tags),
        }
    }
}

// ── Networks ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkAttribute {
    Kind,
    BridgePorts,
    Cidr,
    Gateway,
    Autostart,
    Comments,
}

impl TrackedAttribute for NetworkAttribute {
    const ALL: &'static [Self] = &[
        Self::Kind,
        Self::BridgePorts,
        Self::Cidr,
        Self::Gateway,
        Self::Autostart,
        Self::Comments,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Kind => "type",
            Self::BridgePorts => "bridge_ports",
            Self::Cidr => "cidr",
            Self::Gateway => "gateway",
            Self::Autostart => "autostart",
            Self::Comments => "comments",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Kind | Self::BridgePorts | Self::Cidr | Self::Gateway => Severity::High,
            Self::Autostart | Self::Comments => Severity::Low,
        }
    }
}

impl Tracked for NetworkConfig {
    type Attribute = NetworkAttribute;
    const CATEGORY: ResourceCategory = ResourceCategory::Network;

    fn value_of(&self, attribute: NetworkAttribute) -> Value {
        match attribute {
            NetworkAttribute::Kind => json!(self.kind),
            NetworkAttribute::BridgePorts => json!(self.bridge_ports),
            NetworkAttribute::Cidr => json!(self.cidr),
            NetworkAttribute::Gateway => json!(self.gateway),
            NetworkAttribute::Autostart => json!(self.autostart),
            NetworkAttribute::Comments => json!(self.comments),
        }
    }
}

// ── Storage ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAttribute {
    Kind,
    Path,
    Content,
    MaxFiles,
    Shared,
    Disable,
}

impl TrackedAttribute for StorageAttribute {
    const ALL: &'static [Self] = &[
        Self::Kind,
        Self::Path,
        Self::Content,
        Self::MaxFiles,
        Self::Shared,
        Self::Disable,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Kind => "type",
            Self::Path => "path",
            Self::Content => "content",
            Self::MaxFiles => "maxfiles",
            Self::Shared => "shared",
            Self::Disable => "disable",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Kind | Self::Path | Self::Content | Self::MaxFiles => Severity::High,
            Self::Shared | Self::Disable => Severity::Low,
        }
    }
}

impl Tracked for StorageConfig {
    type Attribute = StorageAttribute;
    const CATEGORY: ResourceCategory = ResourceCategory::Storage;

    fn value_of(&self, attribute: StorageAttribute) -> Value {
        match attribute {
            StorageAttribute::Kind => json!(self.kind),
            StorageAttribute::Path => json!(self.path),
            StorageAttribute::Content => json!(self.content),
            StorageAttribute::MaxFiles => json!(self.max_files),
            StorageAttribute::Shared => json!(self.shared),
            StorageAttribute::Disable => json!(self.disable),
        }
    }
}

// ── Permissions ──────────────────────────────────────────────────────

/// Scalar ACL attributes. Role membership is compared per role, see
/// [`crate::compare::diff_permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAttribute {
    Propagate,
}

impl TrackedAttribute for PermissionAttribute {
    const ALL: &'static [Self] = &[Self::Propagate];

    fn name(self) -> &'static str {
        match self {
            Self::Propagate => "propagate",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Propagate => Severity::Low,
        }
    }
}

impl Tracked for PermissionConfig {
    type Attribute = PermissionAttribute;
    const CATEGORY: ResourceCategory = ResourceCategory::Permission;

    fn value_of(&self, attribute: PermissionAttribute) -> Value {
        match attribute {
            PermissionAttribute::Propagate => json!(self.propagate),
        }
    }
}

/// Attribute name for one role on an ACL entry, e.g. `role:PVEAdmin`.
pub fn role_attribute(role: &str) -> String {
    format!("role:{role}")
}

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAttribute {
    Enable,
    Expire,
    Groups,
}

impl TrackedAttribute for UserAttribute {
    const ALL: &'static [Self] = &[Self::Enable, Self::Expire, Self::Groups];

    fn name(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Expire => "expire",
            Self::Groups => "groups",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Enable | Self::Expire | Self::Groups => Severity::Low,
        }
    }
}

impl Tracked for UserConfig {
    type Attribute = UserAttribute;
    const CATEGORY: ResourceCategory = ResourceCategory::User;

    fn value_of(&self, attribute: UserAttribute) -> Value {
        match attribute {
            UserAttribute::Enable => json!(self.enable),
            UserAttribute::Expire => json!(self.expire),
            UserAttribute::Groups => json!(self.groups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_table_matches_policy() {
        let high = ["memory", "cores", "boot", "scsi0", "firewall", "protection", "onboot"];
        for name in high {
            assert_eq!(classify(ResourceCategory::Vm, name, None), Severity::High, "{name}");
        }
        assert_eq!(classify(ResourceCategory::Vm, "sockets", None), Severity::Medium);
        assert_eq!(classify(ResourceCategory::Vm, "net0", None), Severity::Medium);
        assert_eq!(classify(ResourceCategory::Vm, "tags", None), Severity::Low);
        assert_eq!(classify(ResourceCategory::Vm, "cpuunits", None), Severity::Low);
    }

    #[test]
    fn network_and_storage_core_fields_are_high() {
        for name in ["type", "bridge_ports", "cidr", "gateway"] {
            assert_eq!(classify(ResourceCategory::Network, name, None), Severity::High);
        }
        for name in ["type", "path", "content", "maxfiles"] {
            assert_eq!(classify(ResourceCategory::Storage, name, None), Severity::High);
        }
        assert_eq!(classify(ResourceCategory::Network, "comments", None), Severity::Low);
        assert_eq!(classify(ResourceCategory::Storage, "shared", None), Severity::Low);
    }

    #[test]
    fn access_direction_decides_permission_severity() {
        let attr = role_attribute("PVEAdmin");
        assert_eq!(
            classify(ResourceCategory::Permission, &attr, Some(AccessChange::Granted)),
            Severity::Critical
        );
        assert_eq!(
            classify(ResourceCategory::Permission, &attr, Some(AccessChange::Revoked)),
            Severity::High
        );
        assert_eq!(classify(ResourceCategory::Permission, "propagate", None), Severity::Low);
    }

    #[test]
    fn new_user_is_critical() {
        assert_eq!(classify(ResourceCategory::User, EXISTENCE, None), Severity::Critical);
        assert_eq!(classify(ResourceCategory::User, "enable", None), Severity::Low);
    }

    #[test]
    fn classification_is_deterministic() {
        for category in ResourceCategory::ALL {
            for attr in ["memory", "type", "role:X", EXISTENCE, "unknown"] {
                for access in [None, Some(AccessChange::Granted), Some(AccessChange::Revoked)] {
                    assert_eq!(
                        classify(category, attr, access),
                        classify(category, attr, access)
                    );
                }
            }
        }
    }

    #[test]
    fn table_severity_agrees_with_classify() {
        for &attr in VmAttribute::ALL {
            assert_eq!(attr.severity(), classify(ResourceCategory::Vm, attr.name(), None));
        }
        for &attr in StorageAttribute::ALL {
            assert_eq!(attr.severity(), classify(ResourceCategory::Storage, attr.name(), None));
        }
    }

    #[test]
    fn only_primary_disk_is_not_auto_remediable() {
        let blocked: Vec<_> = VmAttribute::ALL
            .iter()
            .filter(|a| !a.auto_remediable())
            .collect();
        assert_eq!(blocked, vec![&VmAttribute::PrimaryDisk]);
    }

    #[test]
    fn diff_emits_one_record_per_changed_attribute() {
        let expected = VmConfig {
            memory: Some(2048),
            cores: Some(2),
            ..Default::default()
        };
        let actual = VmConfig {
            memory: Some(4096),
            cores: Some(2),
            ..Default::default()
        };
        let records = diff_tracked("100", &expected, &actual);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attribute, "memory");
        assert_eq!(records[0].expected_value, json!(2048));
        assert_eq!(records[0].actual_value, json!(4096));
        assert_eq!(records[0].severity, Severity::High);
    }
}
