use pve_core::{Baseline, ResourceCategory};
use serde::Serialize;
use serde_json::Value;

use crate::client::{Attributes, InfraClient};
use crate::error::InfraError;

/// Snapshot every category of live state into a timestamped document.
///
/// Unlike detection, capture is all-or-nothing: a partial snapshot must
/// never become a baseline or a backup.
pub async fn capture_live_state(client: &dyn InfraClient) -> Result<Baseline, InfraError> {
    let (vms, networks, storage, permissions, users) = tokio::try_join!(
        client.list_vms(),
        client.list_networks(),
        client.list_storage(),
        client.list_permissions(),
        client.list_users(),
    )?;

    let snapshot = Baseline {
        created_at: Some(jiff::Timestamp::now()),
        vms,
        networks,
        storage,
        permissions,
        users,
    };
    tracing::debug!(resources = snapshot.resource_count(), "live state captured");
    Ok(snapshot)
}

/// Current attributes of one resource, or `None` if it does not exist.
pub async fn fetch_resource(
    client: &dyn InfraClient,
    category: ResourceCategory,
    id: &str,
) -> Result<Option<Attributes>, InfraError> {
    match category {
        ResourceCategory::Vm => attributes_of(client.list_vms().await?.remove(id)),
        ResourceCategory::Network => attributes_of(client.list_networks().await?.remove(id)),
        ResourceCategory::Storage => attributes_of(client.list_storage().await?.remove(id)),
        ResourceCategory::Permission => {
            attributes_of(client.list_permissions().await?.remove(id))
        }
        ResourceCategory::User => attributes_of(client.list_users().await?.remove(id)),
    }
}

fn attributes_of<T: Serialize>(config: Option<T>) -> Result<Option<Attributes>, InfraError> {
    let Some(config) = config else {
        return Ok(None);
    };
    match serde_json::to_value(config) {
        Ok(Value::Object(attributes)) => Ok(Some(attributes)),
        Ok(other) => Err(InfraError::Api(format!("unexpected resource shape: {other}"))),
        Err(e) => Err(InfraError::Api(e.to_string())),
    }
}
