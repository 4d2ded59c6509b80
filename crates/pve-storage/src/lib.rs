//! pve-storage
//!
//! Local document persistence for the reconciliation engine: the baseline,
//! timestamped drift reports and state backups, and the execution registry.
//! Every document write goes through a temp file and an atomic rename.

pub mod archive;
pub mod baseline;
pub mod documents;
pub mod error;
pub mod executions;

pub use crate::baseline::BaselineStore;
pub use crate::error::StorageError;
pub use crate::executions::{BoxFuture, ExecutionStore, FileExecutionStore, MemoryExecutionStore};
