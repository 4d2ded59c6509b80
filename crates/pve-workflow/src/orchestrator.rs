use std::sync::Arc;

use pve_audit::{AuditEvent, Outcome};
use pve_core::{Environment, ExecutionStatus, ReconcileConfig, Stage, WorkflowExecution};
use pve_drift::{
    AlertSink, CredentialProvider, DriftDetector, DriftMonitor, InfraClient, Lease, MonitorHandle,
    ResourceLeases, format_err_chain,
};
use pve_storage::ExecutionStore;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::{StageError, WorkflowError};
use crate::stages::{self, StageContext};

const WORKFLOW_NAME: &str = "deployment";
const ACTOR: &str = "workflow-orchestrator";

/// Runs deployments through validate → test → deploy → verify.
///
/// Executions requiring approval are parked as pending until
/// [`approve_execution`](Self::approve_execution) or
/// [`cancel_execution`](Self::cancel_execution). Only one pipeline per
/// environment runs at a time.
pub struct WorkflowOrchestrator {
    config: ReconcileConfig,
    detector: Arc<DriftDetector>,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<dyn ExecutionStore>,
    leases: Arc<ResourceLeases>,
}

impl WorkflowOrchestrator {
    pub fn new(
        config: ReconcileConfig,
        client: Arc<dyn InfraClient>,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn ExecutionStore>,
    ) -> Self {
        let leases = Arc::new(ResourceLeases::new());
        let detector = Arc::new(DriftDetector::new(client, &config.state_dir, leases.clone()));
        Self {
            config,
            detector,
            credentials,
            store,
            leases,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn detector(&self) -> &Arc<DriftDetector> {
        &self.detector
    }

    /// Start a deployment for `environment`. `branch` defaults to the
    /// environment policy's branch.
    ///
    /// Stage failures end the execution as failed and are reported through
    /// the returned record, not as `Err`.
    pub async fn execute_deployment_workflow(
        &self,
        environment: Environment,
        branch: Option<&str>,
        force: bool,
    ) -> Result<WorkflowExecution, WorkflowError> {
        self.execute_deployment_workflow_with_cancel(
            environment,
            branch,
            force,
            &CancellationToken::new(),
        )
        .await
    }

    /// As [`execute_deployment_workflow`](Self::execute_deployment_workflow).
    /// A cancelled `cancel` token stops the execution before it leaves pending;
    /// a running pipeline is never interrupted.
    pub async fn execute_deployment_workflow_with_cancel(
        &self,
        environment: Environment,
        branch: Option<&str>,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecution, WorkflowError> {
        let policy = self.config.policies.get(environment);
        let branch = branch.unwrap_or(policy.branch.as_str());
        let lease = self.lease_environment(environment).await?;

        let id = self.next_execution_id(environment).await?;
        let execution = WorkflowExecution::new(id, WORKFLOW_NAME, environment, branch);
        tracing::info!(
            execution = %execution.id,
            environment = %environment,
            branch = %branch,
            force,
            "deployment requested"
        );

        if policy.approval_required && !force {
            self.store.save(&execution).await?;
            tracing::info!(execution = %execution.id, "deployment awaiting approval");
            return Ok(execution);
        }

        self.run_pipeline(execution, cancel, lease).await
    }

    /// Run a pending execution's pipeline.
    pub async fn approve_execution(&self, id: &str) -> Result<WorkflowExecution, WorkflowError> {
        let execution = self.pending(id).await?;
        let lease = self.lease_environment(execution.environment).await?;
        // Re-read under the lease; a cancel may have landed in between.
        let execution = self.pending(id).await?;
        tracing::info!(execution = %id, "deployment approved");
        self.run_pipeline(execution, &CancellationToken::new(), lease).await
    }

    /// Cancel a pending execution. Running and finished executions are refused.
    pub async fn cancel_execution(&self, id: &str) -> Result<WorkflowExecution, WorkflowError> {
        let environment = self.pending(id).await?.environment;
        // Waits out a running approval of the same environment.
        let _lease = self.leases.acquire(environment_key(environment)).await;
        let mut execution = self.pending(id).await?;
        execution.cancel()?;
        self.store.save(&execution).await?;
        AuditEvent::new("cancel_deployment", "execution", id, ACTOR)
            .with_outcome(Outcome::Succeeded)
            .emit();
        tracing::info!(execution = %id, "deployment cancelled");
        Ok(execution)
    }

    pub async fn get_execution_status(
        &self,
        id: &str,
    ) -> Result<Option<WorkflowExecution>, WorkflowError> {
        Ok(self.store.get(id).await?)
    }

    /// All executions, oldest first.
    pub async fn list_executions(&self) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        Ok(self.store.list().await?)
    }

    /// Spawn a drift monitor sharing this orchestrator's detector and leases.
    pub fn start_drift_monitoring(&self, alerts: Arc<dyn AlertSink>) -> MonitorHandle {
        let monitor = DriftMonitor::new(self.detector.clone(), alerts, self.config.monitor.clone());
        MonitorHandle::spawn(Arc::new(monitor))
    }

    async fn run_pipeline(
        &self,
        mut execution: WorkflowExecution,
        cancel: &CancellationToken,
        _lease: Lease,
    ) -> Result<WorkflowExecution, WorkflowError> {
        if cancel.is_cancelled() {
            execution.cancel()?;
            self.store.save(&execution).await?;
            tracing::info!(execution = %execution.id, "deployment cancelled before start");
            return Ok(execution);
        }

        execution.start()?;
        self.store.save(&execution).await?;
        AuditEvent::new("deploy", "environment", execution.environment.as_str(), ACTOR)
            .with_details(json!({"execution": execution.id, "branch": execution.branch}))
            .emit();

        match self.run_stages(&mut execution).await {
            Ok(()) => {
                execution.succeed()?;
                tracing::info!(execution = %execution.id, "deployment succeeded");
            }
            Err(e) => {
                let message = format_err_chain(&e);
                tracing::error!(execution = %execution.id, error = %message, "deployment failed");
                execution.fail(message)?;
            }
        }
        self.store.save(&execution).await?;

        let outcome = match execution.status {
            ExecutionStatus::Success => Outcome::Succeeded,
            _ => Outcome::Failed,
        };
        AuditEvent::new("deploy", "environment", execution.environment.as_str(), ACTOR)
            .with_outcome(outcome)
            .with_details(json!({
                "execution": execution.id,
                "error": execution.error_message,
            }))
            .emit();
        Ok(execution)
    }

    /// Stages run strictly in order; the first failure skips the rest.
    async fn run_stages(&self, execution: &mut WorkflowExecution) -> Result<(), WorkflowError> {
        let id = execution.id.clone();
        let branch = execution.branch.clone();
        let ctx = StageContext {
            execution_id: &id,
            branch: &branch,
            config: &self.config,
            detector: &self.detector,
            credentials: self.credentials.as_ref(),
            leases: &self.leases,
        };

        let validated = stage(Stage::Validate, stages::validate::run(&ctx).await)?;
        self.record(execution, Stage::Validate, validated.reference).await?;

        let reference = stage(Stage::Test, stages::test::run(&ctx).await)?;
        self.record(execution, Stage::Test, reference).await?;

        let reference = stage(Stage::Deploy, stages::deploy::run(&ctx, &validated.manifest).await)?;
        self.record(execution, Stage::Deploy, reference).await?;

        let reference = stages::verify::run(&ctx).await;
        self.record(execution, Stage::Verify, reference).await?;

        Ok(())
    }

    async fn record(
        &self,
        execution: &mut WorkflowExecution,
        stage: Stage,
        reference: String,
    ) -> Result<(), WorkflowError> {
        tracing::info!(execution = %execution.id, stage = %stage, reference = %reference, "stage complete");
        execution.record_artifact(stage, reference)?;
        self.store.save(execution).await?;
        Ok(())
    }

    async fn pending(&self, id: &str) -> Result<WorkflowExecution, WorkflowError> {
        let execution = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        if execution.status != ExecutionStatus::Pending {
            return Err(WorkflowError::NotPending {
                id: id.to_string(),
                status: execution.status,
            });
        }
        Ok(execution)
    }

    async fn lease_environment(&self, environment: Environment) -> Result<Lease, WorkflowError> {
        self.leases
            .try_acquire(environment_key(environment))
            .await
            .ok_or(WorkflowError::EnvironmentBusy(environment))
    }

    /// `<environment>-<millis>`, suffixed `-2`, `-3`, … on collision.
    async fn next_execution_id(&self, environment: Environment) -> Result<String, WorkflowError> {
        let base = WorkflowExecution::id_for(environment, jiff::Timestamp::now());
        let mut id = base.clone();
        let mut n = 1;
        while self.store.get(&id).await?.is_some() {
            n += 1;
            id = format!("{base}-{n}");
        }
        Ok(id)
    }
}

fn stage<T>(stage: Stage, result: Result<T, StageError>) -> Result<T, WorkflowError> {
    result.map_err(|source| WorkflowError::Stage { stage, source })
}

fn environment_key(environment: Environment) -> String {
    format!("environment/{environment}")
}
