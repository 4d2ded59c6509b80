#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use pve_core::{Baseline, NetworkConfig, PermissionConfig, UserConfig, VmConfig};
use pve_drift::{DriftDetector, MockInfra, ResourceLeases};

pub fn vm(memory: u64, cores: u32) -> VmConfig {
    VmConfig {
        name: Some("web-01".into()),
        memory: Some(memory),
        cores: Some(cores),
        sockets: Some(1),
        boot: Some("order=scsi0;net0".into()),
        scsi0: Some("local-lvm:vm-100-disk-0,size=32G".into()),
        firewall: Some(true),
        onboot: Some(true),
        ..Default::default()
    }
}

/// Small cluster: one VM, one bridge, one ACL, one user.
pub fn inventory() -> Baseline {
    let mut b = Baseline::empty();
    b.vms.insert("100".into(), vm(2048, 2));
    b.networks.insert(
        "vmbr0".into(),
        NetworkConfig {
            kind: Some("bridge".into()),
            bridge_ports: Some("eno1".into()),
            cidr: Some("10.0.0.2/24".into()),
            autostart: Some(true),
            ..Default::default()
        },
    );
    let acl = PermissionConfig::new("/vms/100", "ops@pve").with_role("PVEVMUser");
    b.permissions.insert(acl.key(), acl);
    b.users.insert(
        "ops@pve".into(),
        UserConfig {
            enable: Some(true),
            expire: Some(0),
            ..Default::default()
        },
    );
    b
}

pub fn detector(mock: &Arc<MockInfra>, state_dir: &Path) -> DriftDetector {
    DriftDetector::new(mock.clone(), state_dir, Arc::new(ResourceLeases::new()))
}
