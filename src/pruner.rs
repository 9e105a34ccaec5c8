//! Retention pruner
//!
//! Deletes flow events whose `received_timestamp` is older than the
//! retention period and asks the store to reclaim the freed space.
//!
//! Components:
//! - `retention`: cutoff computation, dry-run preview and execute run.
//! - `audit`: the per-run operational log.

pub mod audit;
pub mod retention;

pub use audit::{AuditEntry, AuditLog};
pub use retention::{cutoff_for, PruneMode, PruneReport, Pruner};
