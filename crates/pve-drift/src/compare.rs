//! Pure baseline-vs-live comparison, one function per category.

use std::collections::BTreeMap;

use pve_core::{Baseline, DriftRecord, PermissionConfig, ResourceCategory, UserConfig};
use serde_json::json;

use crate::tracked::{AccessChange, EXISTENCE, Tracked, classify, diff_tracked, role_attribute};

/// Compare resources present in both maps.
///
/// Resources only in live state are legitimate growth and are not drift;
/// resources only in the baseline are logged for review.
pub fn diff_category<T: Tracked>(
    baseline: &BTreeMap<String, T>,
    live: &BTreeMap<String, T>,
) -> Vec<DriftRecord> {
    let mut records = Vec::new();
    for (id, expected) in baseline {
        match live.get(id) {
            Some(actual) => records.extend(diff_tracked(id, expected, actual)),
            None => tracing::warn!(
                category = %T::CATEGORY,
                resource_id = %id,
                "baseline resource missing from live state"
            ),
        }
    }
    for id in live.keys().filter(|id| !baseline.contains_key(*id)) {
        tracing::info!(
            category = %T::CATEGORY,
            resource_id = %id,
            "new resource not in baseline (not drift)"
        );
    }
    records
}

/// ACL comparison. Every role is its own attribute: a role missing live is a
/// revoke, a role present only live is a grant. Entries missing on either
/// side count as all of their roles revoked or granted.
pub fn diff_permissions(
    baseline: &BTreeMap<String, PermissionConfig>,
    live: &BTreeMap<String, PermissionConfig>,
) -> Vec<DriftRecord> {
    let mut records = Vec::new();
    for (key, expected) in baseline {
        records.extend(diff_permission(key, Some(expected), live.get(key)));
    }
    for (key, actual) in live.iter().filter(|(key, _)| !baseline.contains_key(*key)) {
        records.extend(diff_permission(key, None, Some(actual)));
    }
    records
}

pub fn diff_permission(
    key: &str,
    expected: Option<&PermissionConfig>,
    actual: Option<&PermissionConfig>,
) -> Vec<DriftRecord> {
    let empty = PermissionConfig::default();
    let want = expected.unwrap_or(&empty);
    let have = actual.unwrap_or(&empty);
    let mut records = Vec::new();

    for role in want.roles.difference(&have.roles) {
        records.push(role_record(key, role, AccessChange::Revoked));
    }
    for role in have.roles.difference(&want.roles) {
        records.push(role_record(key, role, AccessChange::Granted));
    }
    if let (Some(want), Some(have)) = (expected, actual) {
        records.extend(diff_tracked(key, want, have));
    }
    records
}

fn role_record(key: &str, role: &str, change: AccessChange) -> DriftRecord {
    let attribute = role_attribute(role);
    let severity = classify(ResourceCategory::Permission, &attribute, Some(change));
    let (expected, actual) = match change {
        AccessChange::Granted => ("revoked", "granted"),
        AccessChange::Revoked => ("granted", "revoked"),
    };
    DriftRecord::new(
        ResourceCategory::Permission,
        key,
        attribute,
        json!(expected),
        json!(actual),
        severity,
    )
}

/// Users present live but absent from the baseline are existence drift;
/// users in both are compared attribute by attribute.
pub fn diff_users(
    baseline: &BTreeMap<String, UserConfig>,
    live: &BTreeMap<String, UserConfig>,
) -> Vec<DriftRecord> {
    let mut records = Vec::new();
    for (id, expected) in baseline {
        match live.get(id) {
            Some(actual) => records.extend(diff_tracked(id, expected, actual)),
            None => tracing::warn!(user = %id, "baseline user missing from live state"),
        }
    }
    for id in live.keys().filter(|id| !baseline.contains_key(*id)) {
        records.push(DriftRecord::new(
            ResourceCategory::User,
            id.clone(),
            EXISTENCE,
            json!("not_present"),
            json!("present"),
            classify(ResourceCategory::User, EXISTENCE, None),
        ));
    }
    records
}

/// Compare two full snapshots, categories in fixed order.
pub fn diff_all(baseline: &Baseline, live: &Baseline) -> Vec<DriftRecord> {
    let mut records = diff_category(&baseline.vms, &live.vms);
    records.extend(diff_category(&baseline.networks, &live.networks));
    records.extend(diff_category(&baseline.storage, &live.storage));
    records.extend(diff_permissions(&baseline.permissions, &live.permissions));
    records.extend(diff_users(&baseline.users, &live.users));
    records
}
