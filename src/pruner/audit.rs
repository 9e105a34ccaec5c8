use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::pruner::retention::PruneReport;

/// One line of the pruner's operational log, serialized as JSON.
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub run_at: String,
    pub mode: &'static str,
    pub retention_days: i64,
    pub cutoff: Option<String>,
    pub rows_matched: Option<u64>,
    pub rows_deleted: Option<u64>,
    pub compacted: bool,
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn from_report(report: &PruneReport) -> Self {
        AuditEntry {
            run_at: Utc::now().to_rfc3339(),
            mode: report.mode.as_str(),
            retention_days: report.retention_days,
            cutoff: Some(report.cutoff.to_rfc3339()),
            rows_matched: Some(report.rows_matched),
            rows_deleted: Some(report.rows_deleted),
            compacted: report.compacted,
            error: None,
        }
    }

    /// Entry for a run that failed before producing a report.
    pub fn failure(mode: &'static str, retention_days: i64, error: String) -> Self {
        AuditEntry {
            run_at: Utc::now().to_rfc3339(),
            mode,
            retention_days,
            cutoff: None,
            rows_matched: None,
            rows_deleted: None,
            compacted: false,
            error: Some(error),
        }
    }
}

/// Append-only operational log, one JSON line per pruner run.
///
/// Every invocation writes a line whether it succeeded or not, so the file
/// is a complete audit trail of destructive activity against the store.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn record(&self, entry: &AuditEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}
