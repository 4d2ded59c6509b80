use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Deployment target environment.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| CoreError::UnknownEnvironment(s.to_string()))
    }
}

/// Deployment rules for one environment. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentPolicy {
    pub branch: String,
    pub auto_deploy: bool,
    pub approval_required: bool,
}

impl EnvironmentPolicy {
    pub fn default_for(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                branch: "develop".into(),
                auto_deploy: true,
                approval_required: false,
            },
            Environment::Staging => Self {
                branch: "staging".into(),
                auto_deploy: true,
                approval_required: false,
            },
            Environment::Production => Self {
                branch: "main".into(),
                auto_deploy: false,
                approval_required: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// pending → running → {success, failed}, or pending → cancelled.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running | Self::Cancelled) => true,
            (Self::Running, Self::Success | Self::Failed) => true,
            (Self::Pending, _) | (Self::Running, _) => false,
            (Self::Success | Self::Failed | Self::Cancelled, _) => false,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Test,
    Deploy,
    Verify,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::Validate, Stage::Test, Stage::Deploy, Stage::Verify];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Test => "test",
            Self::Deploy => "deploy",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker appended after a stage completes, e.g. `deploy:backups/state_backup_….json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub stage: Stage,
    pub reference: String,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.stage, self.reference)
    }
}

/// Mutable record tracking one pipeline invocation from start to terminal state.
///
/// Status changes only through the transition methods, which reject anything
/// other than pending → running → {success, failed} and pending → cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_name: String,
    pub environment: Environment,
    pub branch: String,
    pub status: ExecutionStatus,
    pub started_at: jiff::Timestamp,
    pub completed_at: Option<jiff::Timestamp>,
    pub error_message: Option<String>,
    pub artifacts: Vec<Artifact>,
}

impl WorkflowExecution {
    pub fn new(
        id: impl Into<String>,
        workflow_name: impl Into<String>,
        environment: Environment,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workflow_name: workflow_name.into(),
            environment,
            branch: branch.into(),
            status: ExecutionStatus::Pending,
            started_at: jiff::Timestamp::now(),
            completed_at: None,
            error_message: None,
            artifacts: Vec::new(),
        }
    }

    /// Candidate id for an execution started at `ts`, e.g. `staging-1791876612118`.
    pub fn id_for(environment: Environment, ts: jiff::Timestamp) -> String {
        format!("{environment}-{}", ts.as_millisecond())
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Running)?;
        self.started_at = jiff::Timestamp::now();
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Success)?;
        self.completed_at = Some(jiff::Timestamp::now());
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Failed)?;
        self.error_message = Some(message.into());
        self.completed_at = Some(jiff::Timestamp::now());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Cancelled)?;
        self.completed_at = Some(jiff::Timestamp::now());
        Ok(())
    }

    /// Artifacts are only recorded while the pipeline is running.
    pub fn record_artifact(
        &mut self,
        stage: Stage,
        reference: impl Into<String>,
    ) -> Result<(), CoreError> {
        if self.status != ExecutionStatus::Running {
            return Err(CoreError::NotRunning(self.status));
        }
        self.artifacts.push(Artifact {
            stage,
            reference: reference.into(),
        });
        Ok(())
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution() -> WorkflowExecution {
        WorkflowExecution::new("staging-1", "deployment", Environment::Staging, "staging")
    }

    #[test]
    fn happy_path_reaches_success_once() {
        let mut exec = execution();
        exec.start().unwrap();
        exec.record_artifact(Stage::Validate, "passed").unwrap();
        exec.succeed().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert!(exec.completed_at.is_some());

        assert!(exec.fail("late").is_err());
        assert!(exec.record_artifact(Stage::Verify, "late").is_err());
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(exec.error_message, None);
    }

    #[test]
    fn artifacts_outside_running_report_the_status() {
        let mut exec = execution();
        let err = exec.record_artifact(Stage::Validate, "early").unwrap_err();
        assert!(matches!(err, CoreError::NotRunning(ExecutionStatus::Pending)));
        assert!(err.to_string().starts_with("execution is pending"));
        assert!(exec.artifacts.is_empty());
    }

    #[test]
    fn pending_can_only_cancel_or_start() {
        let mut exec = execution();
        assert!(exec.succeed().is_err());
        assert!(exec.fail("nope").is_err());
        exec.cancel().unwrap();
        assert!(exec.start().is_err());
        assert_eq!(exec.status, ExecutionStatus::Cancelled);
    }

    #[test]
    fn running_cannot_be_cancelled() {
        let mut exec = execution();
        exec.start().unwrap();
        assert!(exec.cancel().is_err());
        exec.fail("boom").unwrap();
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn every_terminal_status_is_absorbing() {
        let all = [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ];
        for from in all.into_iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn environment_parses_and_defaults() {
        let env: Environment = "production".parse().unwrap();
        assert!(EnvironmentPolicy::default_for(env).approval_required);
        assert!(!EnvironmentPolicy::default_for(Environment::Development).approval_required);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn artifact_renders_with_stage_prefix() {
        let artifact = Artifact {
            stage: Stage::Deploy,
            reference: "backups/state_backup_x.json".into(),
        };
        assert_eq!(artifact.to_string(), "deploy:backups/state_backup_x.json");
    }
}
