//! Measurement analysis.
//!
//! Field extraction, daily and hourly statistics, and chart series.

pub mod aggregator;
pub mod charts;
pub mod extract;

pub use aggregator::*;
pub use charts::build_chart_data;
pub use extract::{extract_fields, records_without_labels, FieldPolicy};
