//! Usage and error logging to the log store.
//!
//! Logging is best-effort: [`BestEffortSink`] reports sink failures through
//! `tracing` and never hands them back to the caller.

use std::backtrace::Backtrace;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

use pnlbot_store::{CallRecord, ErrorRecord, LogStore};

use crate::{ErrorInfo, UtcDateTime};

pub use pnlbot_store::CallStatus;

/// Frames kept from a captured call stack.
pub const MAX_CALL_STACK_FRAMES: usize = 10;

#[derive(Debug, Error)]
#[error("usage sink failed: {message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<pnlbot_store::StoreError> for SinkError {
    fn from(error: pnlbot_store::StoreError) -> Self {
        Self::new(error.to_string())
    }
}

/// One logged call to an upstream service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallLog {
    pub name_step: String,
    pub function: String,
    pub request_id: String,
    pub status: CallStatus,
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    pub elapsed_ms: u64,
    pub call_stack: Vec<String>,
    pub error: Option<ErrorInfo>,
    pub recorded_at: UtcDateTime,
}

/// Destination of call and error logs.
pub trait UsageSink: Send + Sync {
    fn record_call(&self, entry: &CallLog) -> Result<(), SinkError>;

    fn record_error(&self, name_step: &str, error: &ErrorInfo) -> Result<(), SinkError>;
}

/// Wraps a sink so that its failures never reach the caller.
#[derive(Clone)]
pub struct BestEffortSink {
    inner: Arc<dyn UsageSink>,
}

impl BestEffortSink {
    pub fn new(inner: Arc<dyn UsageSink>) -> Self {
        Self { inner }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    pub fn record_call(&self, entry: &CallLog) {
        if let Err(error) = self.inner.record_call(entry) {
            tracing::warn!(name_step = %entry.name_step, %error, "dropping call log entry");
        }
    }

    pub fn record_error(&self, name_step: &str, info: &ErrorInfo) {
        if let Err(error) = self.inner.record_error(name_step, info) {
            tracing::warn!(name_step, %error, "dropping error log entry");
        }
    }
}

impl Default for BestEffortSink {
    fn default() -> Self {
        Self::noop()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl UsageSink for NoopSink {
    fn record_call(&self, _entry: &CallLog) -> Result<(), SinkError> {
        Ok(())
    }

    fn record_error(&self, _name_step: &str, _error: &ErrorInfo) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink that rejects every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSink;

impl UsageSink for FailingSink {
    fn record_call(&self, _entry: &CallLog) -> Result<(), SinkError> {
        Err(SinkError::new("log store unavailable"))
    }

    fn record_error(&self, _name_step: &str, _error: &ErrorInfo) -> Result<(), SinkError> {
        Err(SinkError::new("log store unavailable"))
    }
}

/// In-process sink, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    calls: Mutex<Vec<CallLog>>,
    errors: Mutex<Vec<(String, ErrorInfo)>>,
}

impl MemorySink {
    pub fn calls(&self) -> Vec<CallLog> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn errors(&self) -> Vec<(String, ErrorInfo)> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UsageSink for MemorySink {
    fn record_call(&self, entry: &CallLog) -> Result<(), SinkError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }

    fn record_error(&self, name_step: &str, error: &ErrorInfo) -> Result<(), SinkError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name_step.to_string(), error.clone()));
        Ok(())
    }
}

impl UsageSink for LogStore {
    fn record_call(&self, entry: &CallLog) -> Result<(), SinkError> {
        let record = CallRecord {
            name_step: entry.name_step.clone(),
            function: entry.function.clone(),
            request_id: entry.request_id.clone(),
            status: entry.status,
            row_count: entry.rows.and_then(|rows| i64::try_from(rows).ok()),
            column_count: entry.columns.and_then(|columns| i64::try_from(columns).ok()),
            elapsed_ms: i64::try_from(entry.elapsed_ms).unwrap_or(i64::MAX),
            call_stack: entry.call_stack.clone(),
            error_message: entry.error.as_ref().map(|error| error.message.clone()),
            recorded_at: entry.recorded_at.format_rfc3339(),
        };
        self.upsert_call(&record)?;
        Ok(())
    }

    fn record_error(&self, name_step: &str, error: &ErrorInfo) -> Result<(), SinkError> {
        self.append_error(&ErrorRecord {
            name_step: name_step.to_string(),
            message: error.message.clone(),
            kind: error.kind.clone(),
            location: error.location.clone(),
            recorded_at: UtcDateTime::now().format_rfc3339(),
        })?;
        Ok(())
    }
}

/// Current call stack, one frame per entry, at most [`MAX_CALL_STACK_FRAMES`].
///
/// Captured whether or not `RUST_BACKTRACE` is set; `std`/`core` frames are skipped.
pub fn capture_call_stack() -> Vec<String> {
    let backtrace = Backtrace::force_capture().to_string();
    backtrace
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("at "))
        .map(|line| {
            line.split_once(": ")
                .map_or(line, |(_, frame)| frame)
                .to_string()
        })
        .filter(|frame| !frame.starts_with("std::") && !frame.starts_with("core::"))
        .take(MAX_CALL_STACK_FRAMES)
        .collect()
}
