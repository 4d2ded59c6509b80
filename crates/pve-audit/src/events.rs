use serde::Serialize;
use tracing::{info, warn};

/// Result of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Attempted,
    Succeeded,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attempted => "attempted",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// A structured audit event for a reconciliation action.
///
/// These events are logged via `tracing` so they land wherever the embedding
/// binary ships its logs. Proxmox keeps its own task log for the underlying
/// API calls; these events record why the engine made them (remediation,
/// deployment, alerting).
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub actor: String,
    pub outcome: Outcome,
    pub at: jiff::Timestamp,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            actor: actor.into(),
            outcome: Outcome::Attempted,
            at: jiff::Timestamp::now(),
            details: None,
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Emit this audit event via tracing. Failures log at WARN.
    pub fn emit(&self) {
        let details = self
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        match self.outcome {
            Outcome::Failed => warn!(
                audit.action = %self.action,
                audit.resource_type = %self.resource_type,
                audit.resource_id = %self.resource_id,
                audit.actor = %self.actor,
                audit.outcome = self.outcome.as_str(),
                audit.details = %details,
                "audit event"
            ),
            Outcome::Attempted | Outcome::Succeeded | Outcome::Skipped => info!(
                audit.action = %self.action,
                audit.resource_type = %self.resource_type,
                audit.resource_id = %self.resource_id,
                audit.actor = %self.actor,
                audit.outcome = self.outcome.as_str(),
                audit.details = %details,
                "audit event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_outcome_and_details() {
        let event = AuditEvent::new("remediate", "vm", "100", "drift-monitor")
            .with_outcome(Outcome::Succeeded)
            .with_details(serde_json::json!({"attribute": "cores"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "succeeded");
        assert_eq!(json["details"]["attribute"], "cores");
        event.emit();
    }
}
