mod common;

use std::sync::Arc;

use pve_core::{ResourceCategory, Severity, UserConfig, VmConfig};
use pve_drift::MockInfra;
use pve_storage::BaselineStore;
use serde_json::json;

use common::{detector, inventory};

#[tokio::test]
async fn identical_state_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());

    detector.create_baseline().await.unwrap();
    assert!(detector.detect_all_drift().await.is_empty());
}

#[tokio::test]
async fn missing_baseline_is_created_and_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());

    assert!(detector.detect_all_drift().await.is_empty());

    let stored = BaselineStore::new(dir.path()).load().unwrap().unwrap();
    assert!(stored.created_at.is_some());
    assert_eq!(stored.vms, mock.live().vms);
}

#[tokio::test]
async fn memory_change_is_high_drift() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();

    mock.mutate(|live| live.vms.get_mut("100").unwrap().memory = Some(4096));

    let records = detector.detect_all_drift().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.resource_type, ResourceCategory::Vm);
    assert_eq!(record.resource_id, "100");
    assert_eq!(record.attribute, "memory");
    assert_eq!(record.expected_value, json!(2048));
    assert_eq!(record.actual_value, json!(4096));
    assert_eq!(record.severity, Severity::High);
    assert!(record.remediation_required);
}

#[tokio::test]
async fn unknown_user_is_critical_existence_drift() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();

    mock.mutate(|live| {
        live.users.insert("mallory@pve".into(), UserConfig::default());
    });

    let records = detector.detect_all_drift().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_type, ResourceCategory::User);
    assert_eq!(records[0].resource_id, "mallory@pve");
    assert_eq!(records[0].severity, Severity::Critical);
}

#[tokio::test]
async fn role_grant_is_critical_and_revoke_is_high() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();

    mock.mutate(|live| {
        let acl = live.permissions.get_mut("/vms/100|ops@pve").unwrap();
        acl.roles.clear();
        acl.roles.insert("Administrator".into());
    });

    let mut records = detector.detect_all_drift().await;
    records.sort_by(|a, b| a.attribute.cmp(&b.attribute));
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].attribute, "role:Administrator");
    assert_eq!(records[0].severity, Severity::Critical);
    assert_eq!(records[0].actual_value, json!("granted"));

    assert_eq!(records[1].attribute, "role:PVEVMUser");
    assert_eq!(records[1].severity, Severity::High);
    assert_eq!(records[1].actual_value, json!("revoked"));
}

#[tokio::test]
async fn new_vm_is_not_drift() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();

    mock.mutate(|live| {
        live.vms.insert("101".into(), VmConfig::default());
    });

    assert!(detector.detect_all_drift().await.is_empty());
}

#[tokio::test]
async fn failing_category_does_not_hide_others() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();

    mock.mutate(|live| {
        live.vms.get_mut("100").unwrap().tags = Some("edited".into());
        live.networks.get_mut("vmbr0").unwrap().gateway = Some("10.0.0.1".into());
    });
    mock.fail_category(ResourceCategory::Vm);

    let records = detector.detect_all_drift().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_type, ResourceCategory::Network);
    assert_eq!(records[0].attribute, "gateway");
    assert_eq!(records[0].severity, Severity::High);

    mock.heal_category(ResourceCategory::Vm);
    assert_eq!(detector.detect_all_drift().await.len(), 2);
}

#[tokio::test]
async fn repeated_detection_reports_the_same_divergence() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();
    mock.mutate(|live| live.vms.get_mut("100").unwrap().cores = Some(8));

    let first = detector.detect_all_drift().await;
    let second = detector.detect_all_drift().await;
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a.same_divergence(b)));
}

#[tokio::test]
async fn failed_capture_keeps_previous_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();

    mock.mutate(|live| live.vms.get_mut("100").unwrap().memory = Some(1));
    mock.fail_category(ResourceCategory::Storage);
    assert!(detector.create_baseline().await.is_err());

    let stored = detector.load_baseline().unwrap();
    assert_eq!(stored.vms["100"].memory, Some(2048));
}

#[tokio::test]
async fn report_counts_by_severity() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockInfra::new(inventory()));
    let detector = detector(&mock, dir.path());
    detector.create_baseline().await.unwrap();
    mock.mutate(|live| {
        live.vms.get_mut("100").unwrap().memory = Some(8192);
        live.vms.get_mut("100").unwrap().name = Some("renamed".into());
        live.users.insert("mallory@pve".into(), UserConfig::default());
    });

    let records = detector.detect_all_drift().await;
    let path = detector.generate_drift_report(&records).unwrap();
    assert!(path.starts_with(dir.path().join("drift_reports")));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["total_drifts"], json!(3));
    assert_eq!(report["by_severity"]["CRITICAL"], json!(1));
    assert_eq!(report["by_severity"]["HIGH"], json!(1));
    assert_eq!(report["by_severity"]["LOW"], json!(1));
    assert_eq!(report["by_severity"]["MEDIUM"], json!(0));
    assert_eq!(report["records"].as_array().unwrap().len(), 3);
}
