//! In-memory CSV tables parsed from attachment bodies.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("malformed csv: {0}")]
    Malformed(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Without a header row columns are named `0`, `1`, ...
    pub has_headers: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl CsvTable {
    /// Every record must have as many fields as the header row.
    pub fn parse(content: &str, options: CsvOptions) -> Result<Self, CsvError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(options.has_headers)
            .trim(csv::Trim::Headers)
            .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

        let mut headers: Vec<String> = if options.has_headers {
            reader.headers()?.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
        }

        if !options.has_headers {
            let width = records.first().map_or(0, Vec::len);
            headers = (0..width).map(|index| index.to_string()).collect();
        }

        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cells of one named column.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|header| header == name)?;
        Some(
            self.records
                .iter()
                .map(|record| record.get(index).map_or("", String::as_str))
                .collect(),
        )
    }

    /// Records as JSON objects; numeric cells become numbers, empty cells `null`.
    pub fn to_json_rows(&self) -> Vec<Map<String, Value>> {
        self.records
            .iter()
            .map(|record| {
                self.headers
                    .iter()
                    .zip(record)
                    .map(|(header, cell)| (header.clone(), infer_cell(cell)))
                    .collect()
            })
            .collect()
    }
}

fn infer_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Number(integer.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(cell.to_string()), Value::Number)
}
