//! Retention pruner CLI.
//!
//! Removes log entries older than the configured retention period from the
//! `fns_logs` table. Intended to run periodically via cron or a systemd
//! timer; one invocation is one run, retry belongs to the scheduler.
//!
//! Exit code 0 on success (including a zero-row no-op), 1 on any
//! configuration, connection or query failure.

use clap::Parser;
use log::{error, info, warn};

use fns_logview::configuration::config::AppConfig;
use fns_logview::log_store::database::LogDatabase;
use fns_logview::pruner::audit::{AuditEntry, AuditLog};
use fns_logview::pruner::retention::{PruneMode, Pruner};

#[derive(Parser)]
#[command(name = "fns-log-pruner")]
#[command(version = "0.1.0")]
#[command(about = "Prune old FNS log entries from the database")]
struct Args {
    /// Show what would be deleted without actually deleting
    #[arg(long)]
    dry_run: bool,

    /// Number of days to keep (default: FNS_DAYS_TO_KEEP_LOGS)
    #[arg(long)]
    days: Option<i64>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();
    let mode = if args.dry_run {
        PruneMode::DryRun
    } else {
        PruneMode::Execute
    };

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    let days = args.days.unwrap_or(config.days_to_keep_logs);
    if days < 1 {
        error!("Retention period must be at least 1 day");
        std::process::exit(1);
    }

    let audit = AuditLog::new(&config.pruner_log_path);

    let db = match LogDatabase::connect(&config.db).await {
        Ok(db) => db,
        Err(e) => {
            error!("Unable to connect to the log store: {}", e);
            record(&audit, &AuditEntry::failure(mode.as_str(), days, e.to_string()));
            std::process::exit(1);
        }
    };

    let pruner = Pruner::new(&db);
    let result = match mode {
        PruneMode::DryRun => pruner.preview(days).await,
        PruneMode::Execute => pruner.execute(days).await,
    };

    match result {
        Ok(report) => {
            record(&audit, &AuditEntry::from_report(&report));
            match report.mode {
                PruneMode::DryRun => info!(
                    "Dry run completed. {} rows would be deleted, none were.",
                    report.rows_matched
                ),
                PruneMode::Execute => info!(
                    "Pruning completed successfully. Deleted {} rows.",
                    report.rows_deleted
                ),
            }
        }
        Err(e) => {
            error!("Error during log pruning: {}", e);
            record(&audit, &AuditEntry::failure(mode.as_str(), days, e.to_string()));
            std::process::exit(1);
        }
    }
}

fn record(audit: &AuditLog, entry: &AuditEntry) {
    if let Err(e) = audit.record(entry) {
        warn!("Unable to write the pruner audit log: {}", e);
    }
}
