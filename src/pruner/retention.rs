use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::error_handling::types::StoreError;
use crate::log_store::database::LogDatabase;

/// How a pruning run was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneMode {
    DryRun,
    Execute,
}

impl PruneMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PruneMode::DryRun => "dry-run",
            PruneMode::Execute => "execute",
        }
    }
}

/// Outcome of one pruning run.
#[derive(Debug, Clone)]
pub struct PruneReport {
    pub mode: PruneMode,
    pub retention_days: i64,
    pub cutoff: DateTime<Utc>,
    pub rows_matched: u64,
    pub rows_deleted: u64,
    pub compacted: bool,
}

/// The instant separating kept rows from prunable ones: `now` minus the
/// retention period. Rows strictly older than this are eligible.
pub fn cutoff_for(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    now - Duration::days(retention_days)
}

/// Single-invocation retention pruner over the shared log store.
///
/// One run is one bounded statement per step and never retries; the external
/// scheduler owns periodicity. Cutoffs only move forward between runs, so an
/// accidental overlap can never delete a row the other run needs to keep.
pub struct Pruner<'a> {
    db: &'a LogDatabase,
}

impl<'a> Pruner<'a> {
    pub fn new(db: &'a LogDatabase) -> Self {
        Self { db }
    }

    /// Dry run: count what an execute run would delete, mutating nothing.
    pub async fn preview(&self, retention_days: i64) -> Result<PruneReport, StoreError> {
        let cutoff = cutoff_for(Utc::now(), retention_days);
        info!(
            "Dry run: retention {} days, cutoff {} UTC",
            retention_days, cutoff
        );
        let rows_matched = self.db.count_older_than(cutoff).await?;
        info!("Found {} log entries eligible for deletion", rows_matched);
        Ok(PruneReport {
            mode: PruneMode::DryRun,
            retention_days,
            cutoff,
            rows_matched,
            rows_deleted: 0,
            compacted: false,
        })
    }

    /// Execute run: delete everything older than the cutoff, then compact.
    ///
    /// Compaction failures are downgraded to warnings; the delete already
    /// succeeded and is the durability-critical step. Zero matching rows is
    /// a successful no-op, never an error.
    pub async fn execute(&self, retention_days: i64) -> Result<PruneReport, StoreError> {
        let cutoff = cutoff_for(Utc::now(), retention_days);
        info!(
            "Pruning: retention {} days, deleting rows with received_timestamp < {} UTC",
            retention_days, cutoff
        );
        let rows_deleted = self.db.delete_older_than(cutoff).await?;
        info!("Deleted {} log entries", rows_deleted);

        let compacted = if rows_deleted > 0 {
            match self.db.compact().await {
                Ok(()) => {
                    info!("Storage compaction completed");
                    true
                }
                Err(e) => {
                    warn!("Storage compaction failed (non-critical): {}", e);
                    false
                }
            }
        } else {
            false
        };

        Ok(PruneReport {
            mode: PruneMode::Execute,
            retention_days,
            cutoff,
            rows_matched: rows_deleted,
            rows_deleted,
            compacted,
        })
    }
}
