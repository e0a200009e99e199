//! Client for the Bloomberg proxy service.
//!
//! Two endpoints are used:
//!
//! - `POST {base}/timeseries` with `{tickers, fields, start_date, end_date}`,
//!   reshaped through [`crate::timeseries::reshape`];
//! - `POST {base}` with `{tickers, fields, YAS_YIELD_FLAG}` for point-in-time
//!   reference data.
//!
//! Without a base URL the client serves random data of the requested shape
//! when running in local mode and fails with
//! [`MarketDataError::UnconfiguredEnvironment`] otherwise. Each call is
//! recorded to the usage sink, successful or not.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use crate::config::{secrets, BotConfig};
use crate::http_client::{HttpClient, HttpError, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::timeseries::{self, TimeseriesTable};
use crate::usage_log::{capture_call_stack, BestEffortSink, CallLog, CallStatus};
use crate::{ErrorInfo, UtcDateTime, ValidationError};

/// Column holding the row label of a column-oriented reference response.
pub const INDEX_COLUMN: &str = "index";

/// Column holding the ticker in synthetic reference tables.
pub const TICKER_COLUMN: &str = "ticker";

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("`{name}` environment variable is not set")]
    UnconfiguredEnvironment { name: String },

    #[error("unable to connect to market data service at {url}: {message}")]
    UnableToConnect { url: String, message: String },

    #[error("market data service returned status {status}")]
    Upstream { status: u16, body: String },

    #[error("market data transport error: {0}")]
    Transport(String),

    #[error("failed to decode market data response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl MarketDataError {
    fn from_transport(url: &str, error: HttpError) -> Self {
        if error.is_unreachable() {
            Self::UnableToConnect {
                url: url.to_string(),
                message: error.message().to_string(),
            }
        } else {
            Self::Transport(error.message().to_string())
        }
    }
}

/// Historical data request; dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeseriesRequest {
    pub tickers: Vec<String>,
    pub fields: Vec<String>,
    pub start_date: Date,
    pub end_date: Date,
}

impl TimeseriesRequest {
    pub fn new(
        tickers: Vec<String>,
        fields: Vec<String>,
        start_date: Date,
        end_date: Date,
    ) -> Result<Self, ValidationError> {
        validate_lists(&tickers, &fields)?;
        if start_date > end_date {
            return Err(ValidationError::InvertedDateRange {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }

        Ok(Self {
            tickers,
            fields,
            start_date,
            end_date,
        })
    }
}

#[derive(Serialize)]
struct TimeseriesBody<'a> {
    tickers: &'a [String],
    fields: &'a [String],
    start_date: String,
    end_date: String,
}

/// Point-in-time reference data request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceRequest {
    pub tickers: Vec<String>,
    pub fields: Vec<String>,
    #[serde(rename = "YAS_YIELD_FLAG")]
    pub yas_yield_flag: Option<Value>,
}

impl ReferenceRequest {
    pub fn new(
        tickers: Vec<String>,
        fields: Vec<String>,
        yas_yield_flag: Option<Value>,
    ) -> Result<Self, ValidationError> {
        validate_lists(&tickers, &fields)?;
        Ok(Self {
            tickers,
            fields,
            yas_yield_flag,
        })
    }
}

fn validate_lists(tickers: &[String], fields: &[String]) -> Result<(), ValidationError> {
    if tickers.iter().all(|ticker| ticker.trim().is_empty()) {
        return Err(ValidationError::EmptyTickers);
    }
    if fields.iter().all(|field| field.trim().is_empty()) {
        return Err(ValidationError::EmptyFields);
    }
    Ok(())
}

/// Row-oriented reference data table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl ReferenceTable {
    /// Accepts an array of records or a column-oriented `{column: {row: value}}`
    /// object. Column-oriented rows gain an [`INDEX_COLUMN`] with their label.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(records) => Self::from_records(records),
            Value::Object(columns) => Self::from_columns(columns),
            _ => Err(ValidationError::NotAnObject {
                what: "reference response",
            }),
        }
    }

    fn from_records(records: &[Value]) -> Result<Self, ValidationError> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let record = record.as_object().ok_or(ValidationError::NotAnObject {
                what: "reference record",
            })?;
            for column in record.keys() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
            rows.push(record.clone());
        }
        Ok(Self { columns, rows })
    }

    fn from_columns(by_column: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut labels: Vec<String> = Vec::new();
        for cells in by_column.values() {
            let cells = cells.as_object().ok_or(ValidationError::NotAnObject {
                what: "reference column",
            })?;
            for label in cells.keys() {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }

        let rows = labels
            .iter()
            .map(|label| {
                let mut row = Map::new();
                row.insert(INDEX_COLUMN.to_string(), Value::String(label.clone()));
                for (column, cells) in by_column {
                    let cell = cells.get(label).cloned().unwrap_or(Value::Null);
                    row.insert(column.clone(), cell);
                }
                row
            })
            .collect();

        let mut columns = vec![INDEX_COLUMN.to_string()];
        columns.extend(by_column.keys().cloned());
        Ok(Self { columns, rows })
    }

    /// One row per ticker, one random value per field.
    pub fn synthetic<T: AsRef<str>, F: AsRef<str>>(tickers: &[T], fields: &[F]) -> Self {
        let mut columns = vec![TICKER_COLUMN.to_string()];
        columns.extend(fields.iter().map(|field| field.as_ref().to_string()));

        let rows = tickers
            .iter()
            .map(|ticker| {
                let mut row = Map::new();
                row.insert(
                    TICKER_COLUMN.to_string(),
                    Value::String(ticker.as_ref().to_string()),
                );
                for field in fields {
                    let value = serde_json::Number::from_f64(fastrand::f64())
                        .map_or(Value::Null, Value::Number);
                    row.insert(field.as_ref().to_string(), value);
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Market data client with local fallback and usage logging.
#[derive(Clone)]
pub struct MarketDataClient {
    base_url: Option<String>,
    local_mode: bool,
    timeout_ms: u64,
    name_step: String,
    http: Arc<dyn HttpClient>,
    sink: BestEffortSink,
}

impl MarketDataClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: None,
            local_mode: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            name_step: String::from("pnlbot"),
            http,
            sink: BestEffortSink::noop(),
        }
    }

    pub fn from_config(config: &BotConfig, http: Arc<dyn HttpClient>) -> Self {
        Self::new(http)
            .with_base_url(config.bloomberg_api_url.clone())
            .with_local_mode(config.local_mode)
            .with_timeout_ms(config.timeout_ms)
    }

    /// Blank URLs count as unset; a trailing slash is dropped.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self
    }

    pub fn with_local_mode(mut self, local_mode: bool) -> Self {
        self.local_mode = local_mode;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Prefix of the `name_step` under which calls are logged.
    pub fn with_name_step(mut self, name_step: impl Into<String>) -> Self {
        self.name_step = name_step.into();
        self
    }

    pub fn with_sink(mut self, sink: BestEffortSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub async fn timeseries(
        &self,
        request: &TimeseriesRequest,
    ) -> Result<TimeseriesTable, MarketDataError> {
        let started = Instant::now();
        let outcome = self.fetch_timeseries(request).await;
        let shape = outcome
            .as_ref()
            .ok()
            .map(|table| (table.row_count(), table.column_count()));
        self.log_call("timeseries", started, shape, outcome.as_ref().err());
        outcome
    }

    pub async fn reference(
        &self,
        request: &ReferenceRequest,
    ) -> Result<ReferenceTable, MarketDataError> {
        let started = Instant::now();
        let outcome = self.fetch_reference(request).await;
        let shape = outcome
            .as_ref()
            .ok()
            .map(|table| (table.row_count(), table.column_count()));
        self.log_call("reference", started, shape, outcome.as_ref().err());
        outcome
    }

    async fn fetch_timeseries(
        &self,
        request: &TimeseriesRequest,
    ) -> Result<TimeseriesTable, MarketDataError> {
        let Some(base_url) = self.endpoint()? else {
            tracing::info!(tickers = request.tickers.len(), "serving synthetic timeseries");
            return Ok(TimeseriesTable::synthetic(
                &request.tickers,
                &request.fields,
                request.start_date,
                request.end_date,
            ));
        };

        let body = TimeseriesBody {
            tickers: &request.tickers,
            fields: &request.fields,
            start_date: request.start_date.to_string(),
            end_date: request.end_date.to_string(),
        };
        let url = format!("{base_url}/timeseries");
        let payload = self.post(&url, &body).await?;
        Ok(timeseries::reshape(&payload, &request.fields)?)
    }

    async fn fetch_reference(
        &self,
        request: &ReferenceRequest,
    ) -> Result<ReferenceTable, MarketDataError> {
        let Some(base_url) = self.endpoint()? else {
            tracing::info!(tickers = request.tickers.len(), "serving synthetic reference data");
            return Ok(ReferenceTable::synthetic(&request.tickers, &request.fields));
        };

        let payload = self.post(base_url, request).await?;
        Ok(ReferenceTable::from_json(&payload)?)
    }

    /// `Ok(None)` selects the synthetic fallback.
    fn endpoint(&self) -> Result<Option<&str>, MarketDataError> {
        match self.base_url.as_deref() {
            Some(url) => Ok(Some(url)),
            None if self.local_mode => Ok(None),
            None => Err(MarketDataError::UnconfiguredEnvironment {
                name: secrets::BLOOMBERG_API_URL.env_key.to_string(),
            }),
        }
    }

    async fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<Value, MarketDataError> {
        let request = HttpRequest::post(url)
            .with_json(body)?
            .with_timeout_ms(self.timeout_ms);

        let response = self.http.execute(request).await.map_err(|error| {
            let error = MarketDataError::from_transport(url, error);
            tracing::error!(url, %error, "market data request failed");
            error
        })?;

        if !response.is_success() {
            return Err(MarketDataError::Upstream {
                status: response.status,
                body: response.body,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    fn log_call(
        &self,
        function: &str,
        started: Instant,
        shape: Option<(usize, usize)>,
        error: Option<&MarketDataError>,
    ) {
        let name_step = format!("{}:{function}", self.name_step);
        // Called through a closure so `#[track_caller]` records this line.
        #[allow(clippy::redundant_closure)]
        let error = error.map(|error| ErrorInfo::capture(error));
        if let Some(info) = &error {
            self.sink.record_error(&name_step, info);
        }

        self.sink.record_call(&CallLog {
            name_step,
            function: function.to_string(),
            request_id: Uuid::new_v4().to_string(),
            status: if error.is_some() {
                CallStatus::Failure
            } else {
                CallStatus::Success
            },
            rows: shape.map(|(rows, _)| rows),
            columns: shape.map(|(_, columns)| columns),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            call_stack: capture_call_stack(),
            error,
            recorded_at: UtcDateTime::now(),
        });
    }
}
