//! Domain value types shared across the crate.

mod timestamp;

pub use timestamp::{parse_date, UtcDateTime};
