use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use pve_core::{WorkflowExecution, paths};
use tokio::sync::Mutex;

use crate::documents;
use crate::error::StorageError;

/// Boxed `Send` future used by every trait-object seam in the workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Registry of workflow executions, injected into the orchestrator.
///
/// Implementations must refuse to overwrite a record that is already terminal
/// with different contents.
pub trait ExecutionStore: Send + Sync {
    /// Insert or replace the record with `execution.id`.
    fn save<'a>(
        &'a self,
        execution: &'a WorkflowExecution,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<WorkflowExecution>, StorageError>>;

    /// All records, oldest first.
    fn list(&self) -> BoxFuture<'_, Result<Vec<WorkflowExecution>, StorageError>>;
}

fn guard_terminal(
    existing: Option<&WorkflowExecution>,
    incoming: &WorkflowExecution,
) -> Result<(), StorageError> {
    match existing {
        Some(prev) if prev.status.is_terminal() && prev != incoming => {
            Err(StorageError::TerminalRecord {
                id: incoming.id.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn sort_by_start(mut executions: Vec<WorkflowExecution>) -> Vec<WorkflowExecution> {
    executions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    executions
}

/// Process-lifetime registry. Used by tests and single-shot CLI runs.
#[derive(Default)]
pub struct MemoryExecutionStore {
    records: Mutex<HashMap<String, WorkflowExecution>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionStore for MemoryExecutionStore {
    fn save<'a>(
        &'a self,
        execution: &'a WorkflowExecution,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            guard_terminal(records.get(&execution.id), execution)?;
            records.insert(execution.id.clone(), execution.clone());
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<WorkflowExecution>, StorageError>> {
        Box::pin(async move { Ok(self.records.lock().await.get(id).cloned()) })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<WorkflowExecution>, StorageError>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            Ok(sort_by_start(records.values().cloned().collect()))
        })
    }
}

/// Durable registry: one JSON document per execution under `<state_dir>/executions/`.
pub struct FileExecutionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileExecutionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join(paths::EXECUTIONS_DIR),
            write_lock: Mutex::new(()),
        }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(paths::execution(id))
    }
}

impl ExecutionStore for FileExecutionStore {
    fn save<'a>(
        &'a self,
        execution: &'a WorkflowExecution,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let path = self.record_path(&execution.id);
            let existing = documents::read_json::<WorkflowExecution>(&path)?;
            guard_terminal(existing.as_ref(), execution)?;
            documents::write_json_atomic(&path, execution)?;
            tracing::debug!(id = %execution.id, status = %execution.status, "execution persisted");
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<WorkflowExecution>, StorageError>> {
        Box::pin(async move { documents::read_json(&self.record_path(id)) })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<WorkflowExecution>, StorageError>> {
        Box::pin(async move {
            let entries = match std::fs::read_dir(&self.dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut executions = Vec::new();
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match documents::read_json::<WorkflowExecution>(&path) {
                    Ok(Some(execution)) => executions.push(execution),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable execution record");
                    }
                }
            }
            Ok(sort_by_start(executions))
        })
    }
}
