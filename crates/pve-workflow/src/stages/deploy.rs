use pve_audit::{AuditEvent, Outcome};
use pve_drift::{ResourceLeases, fetch_resource};
use pve_storage::archive;
use serde_json::{Value, json};

use super::StageContext;
use crate::error::StageError;
use crate::manifest::{ChangeAction, DeploymentManifest, ResourceChange};

/// Back up live state, apply the validated branch manifest, confirm every
/// change landed.
///
/// The backup is written before the first change; if it cannot be written
/// nothing is applied.
pub async fn run(
    ctx: &StageContext<'_>,
    manifest: &DeploymentManifest,
) -> Result<String, StageError> {
    let snapshot = ctx.detector.capture_state().await?;
    let backup = archive::write_state_backup(&ctx.config.state_dir, &snapshot)?;
    AuditEvent::new(
        "state_backup",
        "cluster",
        backup.display().to_string(),
        ctx.execution_id,
    )
    .with_outcome(Outcome::Succeeded)
    .with_details(json!({"resources": snapshot.resource_count()}))
    .emit();

    tracing::info!(
        branch = %ctx.branch,
        changes = manifest.changes.len(),
        backup = %backup.display(),
        "applying deployment"
    );

    let mut applied = Vec::with_capacity(manifest.changes.len());
    for change in &manifest.changes {
        apply(ctx, change).await?;
        applied.push((change.category, change.id.clone()));
    }
    ctx.detector.accept_changes(&applied).await?;

    Ok(backup.display().to_string())
}

async fn apply(ctx: &StageContext<'_>, change: &ResourceChange) -> Result<(), StageError> {
    let _lease = ctx
        .leases
        .acquire(ResourceLeases::resource_key(change.category, &change.id))
        .await;
    let client = ctx.client();
    let audit = AuditEvent::new(
        "deploy_change",
        change.category.as_str(),
        &change.id,
        ctx.execution_id,
    )
    .with_details(json!({"action": change.action, "attributes": change.attributes}));

    tracing::info!(category = %change.category, id = %change.id, action = ?change.action, "applying change");
    let result = match change.action {
        ChangeAction::Create => client
            .create_resource(change.category, &change.id, &change.attributes)
            .await
            .map_err(StageError::from),
        ChangeAction::Update => {
            match client
                .update_resource(change.category, &change.id, &change.attributes)
                .await
            {
                Ok(true) => Ok(()),
                Ok(false) => Err(StageError::Rejected {
                    category: change.category,
                    id: change.id.clone(),
                }),
                Err(e) => Err(e.into()),
            }
        }
    };
    let result = match result {
        Ok(()) => confirm(ctx, change).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(()) => audit.with_outcome(Outcome::Succeeded).emit(),
        Err(_) => audit.with_outcome(Outcome::Failed).emit(),
    }
    result
}

/// Re-read the resource and check each declared attribute. `null` means absent.
async fn confirm(ctx: &StageContext<'_>, change: &ResourceChange) -> Result<(), StageError> {
    let not_converged = |attribute: &str| StageError::NotConverged {
        category: change.category,
        id: change.id.clone(),
        attribute: attribute.to_string(),
    };
    let live = fetch_resource(ctx.client(), change.category, &change.id)
        .await?
        .ok_or_else(|| not_converged("existence"))?;
    for (name, want) in &change.attributes {
        let have = live.get(name).unwrap_or(&Value::Null);
        if have != want {
            return Err(not_converged(name));
        }
    }
    Ok(())
}
