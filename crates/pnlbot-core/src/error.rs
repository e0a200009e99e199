use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::correlation::IdentifierConstructionError;
use crate::email::EmailError;
use crate::market_data::MarketDataError;
use crate::notify::NotifyError;

/// Validation and contract errors exposed by `pnlbot-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("epoch milliseconds out of range or not an integer: '{value}'")]
    InvalidEpochMillis { value: String },
    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },

    #[error("series key must look like '(identifier, field)': '{key}'")]
    InvalidSeriesKey { key: String },
    #[error("series value for '{key}' at {epoch_ms} must be a number or null")]
    NonNumericValue { key: String, epoch_ms: String },
    #[error("{what} must be a JSON object")]
    NotAnObject { what: &'static str },

    #[error("request must include at least one ticker")]
    EmptyTickers,
    #[error("request must include at least one field")]
    EmptyFields,
    #[error("start date {start} is after end date {end}")]
    InvertedDateRange { start: String, end: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Identifier(#[from] IdentifierConstructionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Store(#[from] pnlbot_store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error details appended to the `errors` field of logged responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    /// Rust type name of the error.
    pub kind: String,
    /// `file:line` where the error was captured.
    pub location: String,
}

impl ErrorInfo {
    #[track_caller]
    pub fn capture<E>(error: &E) -> Self
    where
        E: std::error::Error,
    {
        let caller = Location::caller();
        Self {
            message: error.to_string(),
            kind: std::any::type_name::<E>().to_string(),
            location: format!("{}:{}", caller.file(), caller.line()),
        }
    }
}
