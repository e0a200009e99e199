//! Behavior-driven tests for timeseries reshaping
//!
//! These tests verify HOW the vendor's `(identifier, field)`-keyed payload is
//! flattened into ISIN-keyed points.

use pnlbot_core::{reshape, TimeseriesTable, UtcDateTime, ValidationError};
use serde_json::{json, Value};

#[test]
fn when_response_is_empty_table_has_expected_columns_and_no_rows() {
    // Given: Empty responses in both shapes the service produces
    for response in [json!({}), Value::Null] {
        // When: They are reshaped for two requested fields
        let table = reshape(&response, &["PX_LAST", "YLD_YTM_MID"]).expect("reshape");

        // Then: Columns are the lower-cased fields plus the ISIN column
        assert_eq!(table.columns(), ["px_last", "yld_ytm_mid", "isin"]);
        assert_eq!(table.row_count(), 0);
        assert!(table.is_empty());
    }
}

#[test]
fn when_response_has_one_series_each_timestamp_becomes_a_row() {
    // Given: One series with two epoch-millisecond keys
    let response = json!({
        "(ABC123 Corp, Last_Price)": {
            "1704067200000": 101.5,
            "1704153600000": 102.25
        }
    });

    // When: The response is reshaped
    let table = reshape(&response, &["Last_Price"]).expect("reshape");

    // Then: The identifier is decoded and dates are UTC instants
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.columns(), ["Last_Price", "isin"]);

    let first = &table.points()[0];
    assert_eq!(first.isin, "ABC123");
    assert_eq!(first.field, "Last_Price");
    assert_eq!(first.value, Some(101.5));
    assert_eq!(first.date, UtcDateTime::parse("2024-01-01T00:00:00Z").expect("ts"));

    let second = &table.points()[1];
    assert_eq!(second.date.epoch_millis(), 1_704_153_600_000);
}

#[test]
fn when_timestamps_arrive_out_of_order_points_are_chronological() {
    // Given: Keys whose text order differs from their numeric order
    let response = json!({
        "(G Z2 Comdty, PX_LAST)": {
            "999999999999": 1.0,
            "1000000000000": 2.0,
            "86400000": 0.5
        }
    });

    // When: The response is reshaped
    let table = reshape(&response, &["PX_LAST"]).expect("reshape");

    // Then: Points follow time, not key text
    let millis: Vec<i64> = table.points().iter().map(|p| p.date.epoch_millis()).collect();
    assert_eq!(millis, [86_400_000, 999_999_999_999, 1_000_000_000_000]);
    assert!(table.points().iter().all(|p| p.isin == "G Z2"));
}

#[test]
fn when_several_fields_are_returned_each_keeps_its_own_rows() {
    // Given: Two fields for the same security and dates
    let response = json!({
        "('FR0014006ZC4@BGN Corp', 'PX_LAST')": { "1704067200000": 99.0 },
        "('FR0014006ZC4@BGN Corp', 'YLD_YTM_MID')": { "1704067200000": 3.1 }
    });

    // When: The response is reshaped
    let table = reshape(&response, &["PX_LAST", "YLD_YTM_MID"]).expect("reshape");

    // Then: Rows are not joined across fields
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.columns(), ["PX_LAST", "YLD_YTM_MID", "isin"]);
    assert_eq!(table.for_isin("FR0014006ZC4").count(), 2);
}

#[test]
fn when_every_series_is_empty_table_has_expected_columns_and_no_rows() {
    // Given: Keys for both requested fields, none with observations
    let response = json!({
        "(ABC Corp, PX_LAST)": {},
        "(ABC Corp, YLD_YTM_MID)": {}
    });

    // When: The response is reshaped
    let table = reshape(&response, &["PX_LAST", "YLD_YTM_MID"]).expect("reshape");

    // Then: The table looks like an empty response, not an isin-only table
    assert_eq!(table.columns(), ["px_last", "yld_ytm_mid", "isin"]);
    assert_eq!(table.row_count(), 0);
}

#[test]
fn when_one_series_is_empty_its_field_still_gets_a_column() {
    // Given: One field with data and one without
    let response = json!({
        "(ABC Corp, PX_LAST)": { "1704067200000": 99.0 },
        "(ABC Corp, YLD_YTM_MID)": {}
    });

    // When: The response is reshaped
    let table = reshape(&response, &["PX_LAST", "YLD_YTM_MID"]).expect("reshape");

    // Then: Both fields are columns, only one contributes rows
    assert_eq!(table.columns(), ["PX_LAST", "YLD_YTM_MID", "isin"]);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.points()[0].field, "PX_LAST");
}

#[test]
fn when_epoch_key_is_not_an_integer_reshape_fails() {
    // Given: A malformed timestamp key
    let response = json!({ "(ABC Corp, PX_LAST)": { "2024-01-01": 1.0 } });

    // When: The response is reshaped
    let error = reshape(&response, &["PX_LAST"]).expect_err("must fail");

    // Then: The offending key is reported
    assert!(matches!(
        error,
        ValidationError::InvalidEpochMillis { ref value } if value == "2024-01-01"
    ));
}

#[test]
fn when_series_key_has_no_field_reshape_fails() {
    let response = json!({ "ABC Corp": { "1704067200000": 1.0 } });
    let error = reshape(&response, &["PX_LAST"]).expect_err("must fail");
    assert!(matches!(error, ValidationError::InvalidSeriesKey { .. }));
}

#[test]
fn synthetic_tables_cover_every_day_ticker_and_field() {
    // Given: A three-day window for two tickers and two fields
    let start = pnlbot_core::parse_date("2024-03-01").expect("date");
    let end = pnlbot_core::parse_date("2024-03-03").expect("date");

    // When: A synthetic table is built
    let table = TimeseriesTable::synthetic(&["ABC Corp", "DEF Govt"], &["PX_LAST", "PX_BID"], start, end);

    // Then: One point per day per ticker and field, values in [0, 1)
    assert_eq!(table.row_count(), 12);
    assert!(table
        .points()
        .iter()
        .all(|p| p.value.is_some_and(|v| (0.0..1.0).contains(&v))));
}

#[test]
fn synthetic_tables_name_columns_like_a_service_response() {
    // Given: A service response and a synthetic table for the same field
    let response = json!({ "(ABC Corp, PX_LAST)": { "1709251200000": 1.0 } });
    let day = pnlbot_core::parse_date("2024-03-01").expect("date");

    // When: Both are built
    let reshaped = reshape(&response, &["PX_LAST"]).expect("reshape");
    let synthetic = TimeseriesTable::synthetic(&["ABC Corp"], &["PX_LAST"], day, day);

    // Then: Column names match, field case included
    assert_eq!(synthetic.columns(), reshaped.columns());
    assert_eq!(synthetic.points()[0].isin, reshaped.points()[0].isin);
}

#[test]
fn synthetic_tables_without_tickers_match_an_empty_response() {
    let day = pnlbot_core::parse_date("2024-03-01").expect("date");
    let tickers: [&str; 0] = [];

    let synthetic = TimeseriesTable::synthetic(&tickers, &["PX_LAST"], day, day);
    let empty = reshape(&json!({}), &["PX_LAST"]).expect("reshape");

    assert_eq!(synthetic.columns(), empty.columns());
    assert!(synthetic.is_empty());
}
