//! Reshape the vendor timeseries payload into ISIN-keyed points.
//!
//! The service answers with a JSON object whose keys are stringified
//! `(identifier, field)` tuples and whose values map epoch milliseconds to
//! numbers:
//!
//! ```json
//! { "(FR0014006ZC4@BGN Corp, PX_LAST)": { "1704067200000": 101.2 } }
//! ```
//!
//! Every key contributes its own rows; rows of different fields for the same
//! date and ISIN are not joined.

use serde::Serialize;
use serde_json::{Map, Value};
use time::Date;

use crate::correlation;
use crate::{UtcDateTime, ValidationError};

/// Name of the column carrying the decoded ISIN.
pub const ISIN_COLUMN: &str = "isin";

/// A parsed `(identifier, field)` response key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKey {
    pub identifier: String,
    pub field: String,
}

impl SeriesKey {
    /// Accepts `(ABC Corp, PX_LAST)` as well as the quoted `('ABC Corp', 'PX_LAST')`.
    pub fn parse(key: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidSeriesKey {
            key: key.to_string(),
        };

        let inner = key.trim();
        let inner = inner.strip_prefix('(').unwrap_or(inner);
        let inner = inner.strip_suffix(')').unwrap_or(inner);

        let (identifier, field) = inner.split_once(',').ok_or_else(invalid)?;
        let identifier = strip_quotes(identifier.trim());
        let field = strip_quotes(field.trim());
        if identifier.is_empty() || field.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            identifier: identifier.to_string(),
            field: field.to_string(),
        })
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// One observation of one field for one security.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesPoint {
    pub date: UtcDateTime,
    pub isin: String,
    pub field: String,
    /// `None` where the service sent `null`.
    pub value: Option<f64>,
}

/// Long-format table of timeseries points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesTable {
    columns: Vec<String>,
    points: Vec<TimeseriesPoint>,
}

impl TimeseriesTable {
    /// Zero rows; columns are the lower-cased field names plus `isin`.
    pub fn empty<S: AsRef<str>>(field_names: &[S]) -> Self {
        let mut columns: Vec<String> = Vec::with_capacity(field_names.len() + 1);
        for name in field_names {
            let name = name.as_ref().to_lowercase();
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        columns.push(ISIN_COLUMN.to_string());
        Self {
            columns,
            points: Vec::new(),
        }
    }

    /// One column per distinct field, in first-seen order, then `isin`.
    fn from_parts(fields: Vec<String>, points: Vec<TimeseriesPoint>) -> Self {
        let mut columns = fields;
        columns.push(ISIN_COLUMN.to_string());
        Self { columns, points }
    }

    /// Random values of the requested shape, one point per calendar day.
    ///
    /// Columns keep the field names' case, as a non-empty service response
    /// does; only the zero-row table of [`Self::empty`] lower-cases them.
    pub fn synthetic<T: AsRef<str>, F: AsRef<str>>(
        tickers: &[T],
        fields: &[F],
        start: Date,
        end: Date,
    ) -> Self {
        let mut points = Vec::new();
        for ticker in tickers {
            let isin = correlation::decode(ticker.as_ref());
            for field in fields {
                let mut day = start;
                while day <= end {
                    points.push(TimeseriesPoint {
                        date: UtcDateTime::start_of_day(day),
                        isin: isin.clone(),
                        field: field.as_ref().to_string(),
                        value: Some(fastrand::f64()),
                    });
                    match day.next_day() {
                        Some(next) => day = next,
                        None => break,
                    }
                }
            }
        }

        if points.is_empty() {
            return Self::empty(fields);
        }
        let mut columns: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            push_distinct(&mut columns, field.as_ref());
        }
        Self::from_parts(columns, points)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn points(&self) -> &[TimeseriesPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<TimeseriesPoint> {
        self.points
    }

    pub fn row_count(&self) -> usize {
        self.points.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points of one security, in table order.
    pub fn for_isin<'a>(&'a self, isin: &'a str) -> impl Iterator<Item = &'a TimeseriesPoint> {
        self.points.iter().filter(move |point| point.isin == isin)
    }
}

/// Flatten a timeseries response into a [`TimeseriesTable`].
///
/// `field_names` only shape the empty table returned for an empty response.
pub fn reshape<S: AsRef<str>>(
    response: &Value,
    field_names: &[S],
) -> Result<TimeseriesTable, ValidationError> {
    let series = match response {
        Value::Null => return Ok(TimeseriesTable::empty(field_names)),
        Value::Object(series) => series,
        _ => return Err(ValidationError::NotAnObject { what: "timeseries response" }),
    };

    if series.is_empty() {
        return Ok(TimeseriesTable::empty(field_names));
    }

    let mut fields: Vec<String> = Vec::new();
    let mut points = Vec::new();
    for (raw_key, values) in series {
        let key = SeriesKey::parse(raw_key)?;
        push_distinct(&mut fields, &key.field);
        let isin = correlation::decode(&key.identifier);
        let values = values.as_object().ok_or(ValidationError::NotAnObject {
            what: "timeseries series",
        })?;

        let mut rows = series_rows(raw_key, values)?;
        rows.sort_by_key(|(date, _)| *date);
        tracing::debug!(key = %raw_key, isin = %isin, rows = rows.len(), "reshaped series");

        points.extend(rows.into_iter().map(|(date, value)| TimeseriesPoint {
            date,
            isin: isin.clone(),
            field: key.field.clone(),
            value,
        }));
    }

    // Series that are all empty carry no more than an empty response.
    if points.is_empty() {
        return Ok(TimeseriesTable::empty(field_names));
    }
    Ok(TimeseriesTable::from_parts(fields, points))
}

fn push_distinct(columns: &mut Vec<String>, field: &str) {
    if !columns.iter().any(|column| column == field) {
        columns.push(field.to_string());
    }
}

fn series_rows(
    raw_key: &str,
    values: &Map<String, Value>,
) -> Result<Vec<(UtcDateTime, Option<f64>)>, ValidationError> {
    values
        .iter()
        .map(|(epoch_ms, value)| {
            let date = UtcDateTime::parse_epoch_millis(epoch_ms)?;
            let value = match value {
                Value::Null => None,
                Value::Number(number) => number.as_f64(),
                _ => {
                    return Err(ValidationError::NonNumericValue {
                        key: raw_key.to_string(),
                        epoch_ms: epoch_ms.clone(),
                    })
                }
            };
            Ok((date, value))
        })
        .collect()
}
