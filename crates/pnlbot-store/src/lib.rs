//! # pnlbot Store
//!
//! DuckDB-backed log and state store for the pnlbot.
//!
//! ## Tables
//!
//! | Table | Key | Description |
//! |-------|-----|-------------|
//! | `call_log` | `name_step` | Latest market-data call per step (upsert) |
//! | `error_log` | - | Append-only error details |
//! | `email_state` | `subject` | Last-seen timestamp of each mail subject (upsert) |
//!
//! All values are passed as statement parameters, never interpolated.
//!
//! ```rust,no_run
//! use pnlbot_store::{LogStore, StoreConfig};
//!
//! let store = LogStore::open(StoreConfig::for_database(false))?;
//! store.upsert_email_state("Daily positions", "2024-03-01T07:15:00Z")?;
//! assert_eq!(
//!     store.email_state("Daily positions")?.as_deref(),
//!     Some("2024-03-01T07:15:00Z")
//! );
//! # Ok::<(), pnlbot_store::StoreError>(())
//! ```

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::duckdb::{DuckDbConnectionManager, PooledConnection};

const DATABASE_FILE: &str = "pnl.duckdb";
const TEST_DATABASE_FILE: &str = "pnl_test_local.duckdb";

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid stored value in column '{column}': {message}")]
    InvalidData {
        column: &'static str,
        message: String,
    },
}

/// Location of the store database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl StoreConfig {
    /// Store at an explicit database path.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            max_pool_size: 4,
        }
    }

    /// Production or test database inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, use_test_db: bool) -> Self {
        let file = if use_test_db {
            TEST_DATABASE_FILE
        } else {
            DATABASE_FILE
        };
        Self::at(dir.as_ref().join(file))
    }

    /// Store under the pnlbot home directory, using the separate local test
    /// database when `use_test_db` is set.
    pub fn for_database(use_test_db: bool) -> Self {
        Self::in_dir(resolve_pnlbot_home().join("store"), use_test_db)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::for_database(false)
    }
}

/// Outcome recorded for a market-data call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Failure,
}

impl CallStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(StoreError::InvalidData {
                column: "status",
                message: format!("unknown call status '{other}'"),
            }),
        }
    }
}

/// One row of `call_log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub name_step: String,
    pub function: String,
    pub request_id: String,
    pub status: CallStatus,
    pub row_count: Option<i64>,
    pub column_count: Option<i64>,
    pub elapsed_ms: i64,
    pub call_stack: Vec<String>,
    pub error_message: Option<String>,
    /// RFC3339 UTC.
    pub recorded_at: String,
}

/// One row of `error_log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub name_step: String,
    pub message: String,
    pub kind: String,
    pub location: String,
    /// RFC3339 UTC.
    pub recorded_at: String,
}

/// The log and state store.
#[derive(Clone)]
pub struct LogStore {
    manager: DuckDbConnectionManager,
}

impl LogStore {
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    /// Open (creating if needed) the database and apply migrations.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let connection = manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        drop(connection);

        Ok(Self { manager })
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Insert or replace the call log entry for `record.name_step`.
    pub fn upsert_call(&self, record: &CallRecord) -> Result<(), StoreError> {
        let call_stack = serde_json::to_string(&record.call_stack).map_err(|error| {
            StoreError::InvalidData {
                column: "call_stack",
                message: error.to_string(),
            }
        })?;

        let connection = self.manager.acquire()?;
        connection.execute(
            "INSERT OR REPLACE INTO call_log \
             (name_step, function, request_id, status, row_count, column_count, elapsed_ms, \
              call_stack, error_message, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.name_step,
                record.function,
                record.request_id,
                record.status.as_str(),
                record.row_count,
                record.column_count,
                record.elapsed_ms,
                call_stack,
                record.error_message,
                record.recorded_at,
            ],
        )?;
        Ok(())
    }

    pub fn call(&self, name_step: &str) -> Result<Option<CallRecord>, StoreError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT name_step, function, request_id, status, row_count, column_count, \
                    elapsed_ms, call_stack, error_message, recorded_at \
             FROM call_log WHERE name_step = ?",
        )?;
        let mut rows = statement.query(params![name_step])?;
        let record = match rows.next()? {
            Some(row) => Some(read_call(row)?),
            None => None,
        };
        Ok(record)
    }

    /// Most recent call entries first.
    pub fn recent_calls(&self, limit: usize) -> Result<Vec<CallRecord>, StoreError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT name_step, function, request_id, status, row_count, column_count, \
                    elapsed_ms, call_stack, error_message, recorded_at \
             FROM call_log ORDER BY recorded_at DESC, name_step LIMIT ?",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = statement.query(params![limit])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(read_call(row)?);
        }
        Ok(records)
    }

    pub fn append_error(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        let connection = self.manager.acquire()?;
        connection.execute(
            "INSERT INTO error_log (name_step, message, kind, location, recorded_at) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.name_step,
                record.message,
                record.kind,
                record.location,
                record.recorded_at,
            ],
        )?;
        Ok(())
    }

    /// Errors recorded for one step, oldest first.
    pub fn errors_for(&self, name_step: &str) -> Result<Vec<ErrorRecord>, StoreError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT name_step, message, kind, location, recorded_at \
             FROM error_log WHERE name_step = ? ORDER BY recorded_at",
        )?;
        let mut rows = statement.query(params![name_step])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(ErrorRecord {
                name_step: row.get(0)?,
                message: row.get(1)?,
                kind: row.get(2)?,
                location: row.get(3)?,
                recorded_at: row.get(4)?,
            });
        }
        Ok(records)
    }

    /// Record the last-seen timestamp (RFC3339) for a mail subject.
    pub fn upsert_email_state(&self, subject: &str, last_seen: &str) -> Result<(), StoreError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = connection
            .execute(
                "INSERT OR REPLACE INTO email_state (subject, last_seen, updated_at) \
                 VALUES (?, ?, CURRENT_TIMESTAMP)",
                params![subject, last_seen],
            )
            .map(|_| ())
            .map_err(StoreError::from);
        finalize_transaction(&connection, result)
    }

    pub fn email_state(&self, subject: &str) -> Result<Option<String>, StoreError> {
        let connection = self.manager.acquire()?;
        let mut statement =
            connection.prepare("SELECT last_seen FROM email_state WHERE subject = ?")?;
        let mut rows = statement.query(params![subject])?;
        let last_seen = match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(last_seen)
    }
}

fn read_call(row: &Row<'_>) -> Result<CallRecord, StoreError> {
    let status: String = row.get(3)?;
    let call_stack: String = row.get(7)?;
    let call_stack =
        serde_json::from_str(&call_stack).map_err(|error| StoreError::InvalidData {
            column: "call_stack",
            message: error.to_string(),
        })?;

    Ok(CallRecord {
        name_step: row.get(0)?,
        function: row.get(1)?,
        request_id: row.get(2)?,
        status: CallStatus::parse(&status)?,
        row_count: row.get(4)?,
        column_count: row.get(5)?,
        elapsed_ms: row.get(6)?,
        call_stack,
        error_message: row.get(8)?,
        recorded_at: row.get(9)?,
    })
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_pnlbot_home() -> PathBuf {
    if let Some(path) = env::var_os("PNLBOT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".pnlbot");
    }

    PathBuf::from(".pnlbot")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> LogStore {
        LogStore::open(StoreConfig::at(dir.join("store").join("pnl.duckdb"))).expect("store open")
    }

    fn call(name_step: &str, status: CallStatus, recorded_at: &str) -> CallRecord {
        CallRecord {
            name_step: name_step.to_string(),
            function: String::from("timeseries"),
            request_id: String::from("req-0001"),
            status,
            row_count: Some(3),
            column_count: Some(2),
            elapsed_ms: 41,
            call_stack: vec![String::from("pnlbot_core::market_data::timeseries")],
            error_message: None,
            recorded_at: recorded_at.to_string(),
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        drop(store);

        let reopened = open_store(temp.path());
        assert!(reopened.db_path().ends_with("pnl.duckdb"));
        assert!(reopened.recent_calls(10).expect("calls").is_empty());
    }

    #[test]
    fn call_log_upserts_by_name_step() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());

        store
            .upsert_call(&call("pnl_step1", CallStatus::Success, "2024-03-01T07:00:00Z"))
            .expect("first upsert");
        let mut failed = call("pnl_step1", CallStatus::Failure, "2024-03-01T08:00:00Z");
        failed.error_message = Some(String::from("unable to connect"));
        store.upsert_call(&failed).expect("second upsert");

        let stored = store.call("pnl_step1").expect("lookup").expect("present");
        assert_eq!(stored, failed);
        assert_eq!(store.recent_calls(10).expect("calls").len(), 1);
    }

    #[test]
    fn parameters_are_not_interpolated() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());

        let hostile = r#"step'; DROP TABLE call_log; --"#;
        store
            .upsert_call(&call(hostile, CallStatus::Success, "2024-03-01T07:00:00Z"))
            .expect("upsert");

        assert!(store.call(hostile).expect("lookup").is_some());
    }

    #[test]
    fn error_log_appends() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());

        for (index, at) in ["2024-03-01T07:00:00Z", "2024-03-01T07:05:00Z"].iter().enumerate() {
            store
                .append_error(&ErrorRecord {
                    name_step: String::from("pnl_step1"),
                    message: format!("failure {index}"),
                    kind: String::from("pnlbot_core::market_data::MarketDataError"),
                    location: String::from("src/market_data.rs:120"),
                    recorded_at: (*at).to_string(),
                })
                .expect("append");
        }

        let errors = store.errors_for("pnl_step1").expect("errors");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "failure 0");
        assert!(store.errors_for("other").expect("errors").is_empty());
    }

    #[test]
    fn email_state_upserts_by_subject() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());

        assert_eq!(store.email_state("Positions").expect("state"), None);
        store
            .upsert_email_state("Positions", "2024-03-01T07:15:00Z")
            .expect("upsert");
        store
            .upsert_email_state("Positions", "2024-03-02T07:15:00Z")
            .expect("upsert");

        assert_eq!(
            store.email_state("Positions").expect("state").as_deref(),
            Some("2024-03-02T07:15:00Z")
        );
    }

    #[test]
    fn test_database_uses_separate_file() {
        let live = StoreConfig::for_database(false);
        let test = StoreConfig::for_database(true);
        assert_ne!(live.db_path, test.db_path);
        assert!(test.db_path.ends_with(TEST_DATABASE_FILE));
    }
}
