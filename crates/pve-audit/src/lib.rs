//! pve-audit
//!
//! Structured audit events for state-changing reconciliation actions.

pub mod events;

pub use crate::events::{AuditEvent, Outcome};
