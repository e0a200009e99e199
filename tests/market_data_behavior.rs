//! Behavior-driven tests for the market data client
//!
//! These tests verify HOW the client talks to the Bloomberg proxy, how it
//! falls back in local mode, and how every call is logged without the log
//! ever breaking the call.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pnlbot_core::{
    parse_date, BestEffortSink, CallStatus, FailingSink, HttpClient, HttpError, HttpMethod,
    HttpRequest, HttpResponse, MarketDataClient, MarketDataError, MemorySink, NoopHttpClient,
    ReferenceRequest, TimeseriesRequest,
};
use serde_json::{json, Value};

/// Answers every request with a fixed outcome and keeps what it was sent.
struct ScriptedHttpClient {
    outcome: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn responding(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: HttpError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("lock").push(request);
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}

fn timeseries_request() -> TimeseriesRequest {
    TimeseriesRequest::new(
        vec![String::from("FR0014006ZC4@BGN Corp")],
        vec![String::from("PX_LAST")],
        parse_date("2024-01-01").expect("date"),
        parse_date("2024-01-31").expect("date"),
    )
    .expect("request")
}

// =============================================================================
// Timeseries endpoint
// =============================================================================

#[tokio::test]
async fn when_timeseries_is_requested_client_posts_to_timeseries_path() {
    // Given: A proxy that answers with one series
    let http = ScriptedHttpClient::responding(
        200,
        json!({ "(FR0014006ZC4@BGN Corp, PX_LAST)": { "1704067200000": 99.5 } }),
    );
    let client = MarketDataClient::new(http.clone())
        .with_base_url(Some(String::from("http://proxy.test/")))
        .with_timeout_ms(2_500);

    // When: A timeseries is requested
    let table = client.timeseries(&timeseries_request()).await.expect("timeseries");

    // Then: The request hits /timeseries with ISO dates and the configured timeout
    let sent = http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, HttpMethod::Post);
    assert_eq!(sent[0].url, "http://proxy.test/timeseries");
    assert_eq!(sent[0].timeout_ms, 2_500);

    let body: Value = serde_json::from_str(sent[0].body.as_deref().expect("body")).expect("json");
    assert_eq!(
        body,
        json!({
            "tickers": ["FR0014006ZC4@BGN Corp"],
            "fields": ["PX_LAST"],
            "start_date": "2024-01-01",
            "end_date": "2024-01-31"
        })
    );

    // And: The reshaped table carries the decoded ISIN
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.points()[0].isin, "FR0014006ZC4");
}

#[tokio::test]
async fn when_proxy_times_out_client_reports_unable_to_connect() {
    // Given: A proxy that never answers in time
    let http = ScriptedHttpClient::failing(HttpError::timeout("request timeout"));
    let memory = Arc::new(MemorySink::default());
    let client = MarketDataClient::new(http)
        .with_base_url(Some(String::from("http://proxy.test")))
        .with_sink(BestEffortSink::new(memory.clone()));

    // When: A timeseries is requested
    let error = client.timeseries(&timeseries_request()).await.expect_err("must fail");

    // Then: The failure is classified and logged
    assert!(matches!(error, MarketDataError::UnableToConnect { .. }));
    let calls = memory.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, CallStatus::Failure);
    assert!(calls[0].error.is_some());
    assert_eq!(memory.errors().len(), 1);
}

#[tokio::test]
async fn when_a_call_fails_the_error_log_points_at_the_client() {
    // Given: A proxy that refuses connections
    let http = ScriptedHttpClient::failing(HttpError::connect("connection refused"));
    let memory = Arc::new(MemorySink::default());
    let client = MarketDataClient::new(http)
        .with_base_url(Some(String::from("http://proxy.test")))
        .with_sink(BestEffortSink::new(memory.clone()));

    // When: A timeseries is requested
    client.timeseries(&timeseries_request()).await.expect_err("must fail");

    // Then: The logged location is a line of the market data client
    let errors = memory.errors();
    let (name_step, info) = &errors[0];
    assert_eq!(name_step, "pnlbot:timeseries");
    assert!(info.location.contains("market_data.rs"), "location was {}", info.location);
    assert!(info.kind.ends_with("MarketDataError"));
}

#[tokio::test]
async fn when_proxy_returns_server_error_client_reports_upstream_status() {
    let http = ScriptedHttpClient::responding(502, json!({ "detail": "bad gateway" }));
    let client =
        MarketDataClient::new(http).with_base_url(Some(String::from("http://proxy.test")));

    let error = client.timeseries(&timeseries_request()).await.expect_err("must fail");

    assert!(matches!(error, MarketDataError::Upstream { status: 502, .. }));
}

#[tokio::test]
async fn when_proxy_returns_empty_object_table_is_empty_with_expected_columns() {
    let http = ScriptedHttpClient::responding(200, json!({}));
    let client =
        MarketDataClient::new(http).with_base_url(Some(String::from("http://proxy.test")));

    let table = client.timeseries(&timeseries_request()).await.expect("timeseries");

    assert!(table.is_empty());
    assert_eq!(table.columns(), ["px_last", "isin"]);
}

// =============================================================================
// Reference endpoint
// =============================================================================

#[tokio::test]
async fn when_reference_data_is_requested_client_posts_to_base_url() {
    // Given: A proxy that answers with records
    let http = ScriptedHttpClient::responding(
        200,
        json!([{ "ticker": "FR0014006ZC4@BGN Corp", "YAS_BOND_YLD": 3.4 }]),
    );
    let client = MarketDataClient::new(http.clone())
        .with_base_url(Some(String::from("http://proxy.test")));
    let request = ReferenceRequest::new(
        vec![String::from("FR0014006ZC4@BGN Corp")],
        vec![String::from("YAS_BOND_YLD")],
        Some(json!(1)),
    )
    .expect("request");

    // When: Reference data is requested
    let table = client.reference(&request).await.expect("reference");

    // Then: The base URL itself is used and the yield flag is forwarded
    let sent = http.sent();
    assert_eq!(sent[0].url, "http://proxy.test");
    let body: Value = serde_json::from_str(sent[0].body.as_deref().expect("body")).expect("json");
    assert_eq!(body["YAS_YIELD_FLAG"], json!(1));
    assert_eq!(table.row_count(), 1);
}

// =============================================================================
// Configuration and local mode
// =============================================================================

#[tokio::test]
async fn when_base_url_is_missing_outside_local_mode_client_is_unconfigured() {
    let client = MarketDataClient::new(Arc::new(NoopHttpClient));

    let error = client.timeseries(&timeseries_request()).await.expect_err("must fail");

    assert!(matches!(error, MarketDataError::UnconfiguredEnvironment { .. }));
    assert!(error.to_string().contains("bloomberg-api-url"));
}

#[tokio::test]
async fn when_base_url_is_missing_in_local_mode_client_serves_synthetic_data() {
    // Given: A local run without a proxy
    let http = ScriptedHttpClient::responding(500, json!(null));
    let client = MarketDataClient::new(http.clone()).with_local_mode(true);
    let request = ReferenceRequest::new(
        vec![String::from("ABC Corp"), String::from("DEF Corp")],
        vec![String::from("NAME"), String::from("CPN")],
        None,
    )
    .expect("request");

    // When: Data is requested
    let table = client.reference(&request).await.expect("synthetic");

    // Then: The table has the requested shape and nothing went over the wire
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.columns, ["ticker", "NAME", "CPN"]);
    assert!(http.sent().is_empty());
}

// =============================================================================
// Usage logging
// =============================================================================

#[tokio::test]
async fn when_log_store_fails_the_call_still_succeeds() {
    // Given: A usage sink that rejects every entry
    let http = ScriptedHttpClient::responding(
        200,
        json!({ "(ABC Corp, PX_LAST)": { "1704067200000": 1.0 } }),
    );
    let client = MarketDataClient::new(http)
        .with_base_url(Some(String::from("http://proxy.test")))
        .with_sink(BestEffortSink::new(Arc::new(FailingSink)));

    // When: A timeseries is requested
    let result = client.timeseries(&timeseries_request()).await;

    // Then: The logging outage is invisible to the caller
    assert_eq!(result.expect("timeseries").row_count(), 1);
}

#[tokio::test]
async fn when_call_succeeds_shape_is_logged_under_its_step() {
    let http = ScriptedHttpClient::responding(
        200,
        json!({ "(ABC Corp, PX_LAST)": { "1704067200000": 1.0, "1704153600000": 2.0 } }),
    );
    let memory = Arc::new(MemorySink::default());
    let client = MarketDataClient::new(http)
        .with_base_url(Some(String::from("http://proxy.test")))
        .with_name_step("pnl_daily")
        .with_sink(BestEffortSink::new(memory.clone()));

    client.timeseries(&timeseries_request()).await.expect("timeseries");

    let calls = memory.calls();
    assert_eq!(calls[0].name_step, "pnl_daily:timeseries");
    assert_eq!(calls[0].status, CallStatus::Success);
    assert_eq!(calls[0].rows, Some(2));
    assert_eq!(calls[0].columns, Some(2));
    assert!(!calls[0].request_id.is_empty());
    assert!(!calls[0].call_stack.is_empty());
    assert!(calls[0].call_stack.len() <= 10);
    assert!(memory.errors().is_empty());
}
