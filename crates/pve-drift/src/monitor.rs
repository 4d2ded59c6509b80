use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pve_core::{MonitorSettings, Severity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::{AlertSink, DriftAlert};
use crate::detector::DriftDetector;
use crate::error::DriftError;

/// Result of one monitoring pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub drift_count: usize,
    pub critical_count: usize,
    pub report_path: Option<PathBuf>,
    pub remediated: usize,
}

/// Cooperative polling loop around a [`DriftDetector`].
///
/// `stop()` is observed between ticks; a tick in flight always completes.
/// A stopped monitor cannot be restarted.
pub struct DriftMonitor {
    detector: Arc<DriftDetector>,
    alerts: Arc<dyn AlertSink>,
    settings: MonitorSettings,
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl DriftMonitor {
    pub fn new(
        detector: Arc<DriftDetector>,
        alerts: Arc<dyn AlertSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            detector,
            alerts,
            settings,
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        tracing::info!("drift monitor stop requested");
        self.shutdown.cancel();
    }

    /// Run until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            interval_secs = self.settings.interval_secs,
            auto_remediate_low = self.settings.auto_remediate_low,
            "drift monitor started"
        );

        while !self.shutdown.is_cancelled() {
            let wait = match self.tick().await {
                Ok(outcome) => {
                    tracing::debug!(
                        drift = outcome.drift_count,
                        critical = outcome.critical_count,
                        remediated = outcome.remediated,
                        "drift monitor tick complete"
                    );
                    self.settings.interval()
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_secs = self.settings.retry_secs,
                        "drift monitor tick failed, backing off"
                    );
                    self.settings.retry_interval()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.cancelled() => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("drift monitor stopped");
    }

    /// One detection pass: report, alert on CRITICAL, optionally remediate LOW.
    pub async fn tick(&self) -> Result<TickOutcome, DriftError> {
        let mut records = self.detector.detect_all_drift().await;
        if records.is_empty() {
            return Ok(TickOutcome::default());
        }

        let report_path = self.detector.generate_drift_report(&records)?;

        let critical: Vec<_> = records
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .cloned()
            .collect();
        if !critical.is_empty() {
            let alert = DriftAlert {
                raised_at: jiff::Timestamp::now(),
                report_path: Some(report_path.clone()),
                critical,
            };
            self.alerts.send(&alert).await?;
        }

        let mut remediated = 0;
        if self.settings.auto_remediate_low {
            for record in records.iter_mut().filter(|r| r.severity == Severity::Low) {
                if self.detector.remediate_drift(record).await {
                    remediated += 1;
                }
            }
        }

        Ok(TickOutcome {
            drift_count: records.len(),
            critical_count: records
                .iter()
                .filter(|r| r.severity == Severity::Critical)
                .count(),
            report_path: Some(report_path),
            remediated,
        })
    }
}

/// A monitor running on the tokio runtime.
pub struct MonitorHandle {
    monitor: Arc<DriftMonitor>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn spawn(monitor: Arc<DriftMonitor>) -> Self {
        let task = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.run().await }
        });
        Self { monitor, task }
    }

    pub fn monitor(&self) -> &Arc<DriftMonitor> {
        &self.monitor
    }

    pub fn stop(&self) {
        self.monitor.stop();
    }

    /// Wait for the loop to exit (call [`stop`](Self::stop) first).
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}
