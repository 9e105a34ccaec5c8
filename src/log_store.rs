//! Log store subsystem
//!
//! This module provides the data types and the database access layer for the
//! shared `fns_logs` table.
//!
//! Components:
//! - `types`: flow-event records, query filters and report types.
//! - `database`: sqlx-backed store implementation (SQLite or MySQL).

pub mod database;
pub mod types;

pub use database::LogDatabase;
pub use types::{FlowEventRecord, LogFilter, NewFlowEvent};
