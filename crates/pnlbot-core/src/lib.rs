//! # pnlbot Core
//!
//! Identifier plumbing and data access for the PnL bot.
//!
//! ## Overview
//!
//! - **Correlation ID codec** between ISINs and Bloomberg identifiers
//! - **Portfolio derivation** from strategy codes
//! - **Timeseries reshaping** of the Bloomberg proxy payload
//! - **Market data client** with local synthetic fallback
//! - **Email reports** with CSV attachments and last-seen tracking
//! - **Best-effort usage logging** and Teams notifications
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Secrets resolution and runtime configuration |
//! | [`correlation`] | Correlation ID encode/decode, portfolio derivation |
//! | [`csv_table`] | CSV parsing of attachment bodies |
//! | [`domain`] | UTC timestamps and date parsing |
//! | [`email`] | Mailbox search and CSV extraction |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`market_data`] | Bloomberg proxy client |
//! | [`notify`] | Teams webhook notifier |
//! | [`state`] | Last-seen timestamps per email subject |
//! | [`timeseries`] | Timeseries response reshaper |
//! | [`usage_log`] | Call and error logging sinks |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pnlbot_core::{MarketDataClient, ReqwestHttpClient, TimeseriesRequest, parse_date};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MarketDataClient::new(Arc::new(ReqwestHttpClient::new()))
//!         .with_base_url(Some(String::from("http://bloomberg-proxy:8080")));
//!
//!     let request = TimeseriesRequest::new(
//!         vec![String::from("FR0014006ZC4@BGN Corp")],
//!         vec![String::from("PX_LAST")],
//!         parse_date("2024-01-01")?,
//!         parse_date("2024-01-31")?,
//!     )?;
//!     let table = client.timeseries(&request).await?;
//!     println!("{} rows", table.row_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Decoding never fails; encoding reports malformed input:
//!
//! ```rust
//! use pnlbot_core::{decode, encode, IdentifierConstructionError};
//!
//! assert_eq!(decode("FR0014006ZC4@BGN Corp"), "FR0014006ZC4");
//! assert!(matches!(
//!     encode("", "Future", None, false),
//!     Err(IdentifierConstructionError::MissingIsin)
//! ));
//! ```

pub mod config;
pub mod correlation;
pub mod csv_table;
pub mod domain;
pub mod email;
pub mod error;
pub mod http_client;
pub mod market_data;
pub mod notify;
pub mod state;
pub mod timeseries;
pub mod usage_log;

// Configuration
pub use config::{BotConfig, ConfigError, Secret, SecretResolver};

// Correlation IDs
pub use correlation::{
    decode, derive_portfolio, encode, CorrelationId, IdentifierConstructionError, SecurityType,
    VendorSuffix, MAIN_PORTFOLIO,
};

// CSV
pub use csv_table::{CsvError, CsvOptions, CsvTable};

// Domain types
pub use domain::{parse_date, UtcDateTime};

// Email
pub use email::{fetch_if_new, latest_csv, EmailCsv, EmailError, EmlDirMailbox, Mailbox, MemoryMailbox};

// Error types
pub use error::{CoreError, ErrorInfo, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Market data
pub use market_data::{
    MarketDataClient, MarketDataError, ReferenceRequest, ReferenceTable, TimeseriesRequest,
};

// Notifications
pub use notify::{notify_best_effort, Notification, Notifier, NotifyError, WebhookNotifier};

// State
pub use state::{MemoryStateStore, StateError, StateStore};

// Timeseries
pub use timeseries::{reshape, SeriesKey, TimeseriesPoint, TimeseriesTable};

// Usage logging
pub use usage_log::{
    BestEffortSink, CallLog, CallStatus, FailingSink, MemorySink, NoopSink, SinkError, UsageSink,
};

// Store (re-exported from pnlbot-store)
pub use pnlbot_store::{LogStore, StoreConfig, StoreError};
