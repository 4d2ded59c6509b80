use std::path::PathBuf;

use pve_audit::{AuditEvent, Outcome};
use pve_core::DriftRecord;
use tokio::sync::Mutex;

use crate::client::BoxFuture;
use crate::error::DriftError;

/// Raised when a detection pass finds CRITICAL drift.
#[derive(Debug, Clone)]
pub struct DriftAlert {
    pub raised_at: jiff::Timestamp,
    pub report_path: Option<PathBuf>,
    pub critical: Vec<DriftRecord>,
}

/// Destination for critical-drift alerts (pager, chat webhook, mail, …).
pub trait AlertSink: Send + Sync {
    fn send<'a>(&'a self, alert: &'a DriftAlert) -> BoxFuture<'a, Result<(), DriftError>>;
}

/// Default sink: error-level log line plus one audit event per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send<'a>(&'a self, alert: &'a DriftAlert) -> BoxFuture<'a, Result<(), DriftError>> {
        Box::pin(async move {
            let report = alert
                .report_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            tracing::error!(
                count = alert.critical.len(),
                report = %report,
                "CRITICAL infrastructure drift detected"
            );
            for record in &alert.critical {
                AuditEvent::new(
                    "critical_drift_alert",
                    record.resource_type.as_str(),
                    &record.resource_id,
                    "drift-monitor",
                )
                .with_outcome(Outcome::Failed)
                .with_details(serde_json::json!({
                    "attribute": record.attribute,
                    "expected": record.expected_value,
                    "actual": record.actual_value,
                }))
                .emit();
            }
            Ok(())
        })
    }
}

/// Keeps every alert in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<DriftAlert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<DriftAlert> {
        self.alerts.lock().await.clone()
    }
}

impl AlertSink for RecordingAlertSink {
    fn send<'a>(&'a self, alert: &'a DriftAlert) -> BoxFuture<'a, Result<(), DriftError>> {
        Box::pin(async move {
            self.alerts.lock().await.push(alert.clone());
            Ok(())
        })
    }
}
