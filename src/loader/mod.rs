//! Measurement file loading.
//!
//! This module reads a JSON array of measurement records and validates
//! the record shape at the boundary, so the statistics code never has to
//! second-guess its input.

use crate::models::RawMeasurement;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Timestamp layout every record must follow.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Length of a zero-padded timestamp.
const TIMESTAMP_LEN: usize = "YYYY-MM-DD HH:MM:SS".len();

/// Failure to turn a measurement source into records.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read measurement file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("measurement data is not a valid JSON array of records: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("record {index} has an invalid timestamp {value:?} (expected YYYY-MM-DD HH:MM:SS)")]
    InvalidTimestamp { index: usize, value: String },
}

/// Load and validate measurements from a file.
pub fn load_measurements(path: &Path) -> Result<Vec<RawMeasurement>, LoadError> {
    info!("Loading measurements from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_measurements(&content)?;
    info!("Loaded {} measurements", records.len());

    Ok(records)
}

/// Parse and validate measurements from JSON text.
///
/// Record order is preserved; it doubles as chronological order.
pub fn parse_measurements(content: &str) -> Result<Vec<RawMeasurement>, LoadError> {
    let records: Vec<RawMeasurement> = serde_json::from_str(content)?;

    for (index, record) in records.iter().enumerate() {
        validate_timestamp(&record.timestamp).ok_or_else(|| LoadError::InvalidTimestamp {
            index,
            value: record.timestamp.clone(),
        })?;
    }

    debug!("Validated {} timestamps", records.len());
    Ok(records)
}

/// chrono accepts unpadded fields, so the fixed width is checked as well.
fn validate_timestamp(timestamp: &str) -> Option<NaiveDateTime> {
    if timestamp.len() != TIMESTAMP_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = include_str!("../../fixtures/day_sample.json");

    #[test]
    fn test_parse_sample_fixture() {
        let records = parse_measurements(SAMPLE).unwrap();
        assert!(!records.is_empty());
        assert_eq!(records[0].timestamp, "2024-01-15 00:05:00");
    }

    #[test]
    fn test_parse_preserves_order() {
        let json = r#"[
            {"timestamp": "2024-01-15 10:00:00", "top_5_labels": ["traffic"]},
            {"timestamp": "2024-01-15 09:00:00", "top_5_labels": ["voices"]},
            {"timestamp": "2024-01-15 11:00:00", "top_5_labels": ["music"]}
        ]"#;

        let records = parse_measurements(json).unwrap();
        let stamps: Vec<_> = records.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec![
                "2024-01-15 10:00:00",
                "2024-01-15 09:00:00",
                "2024-01-15 11:00:00"
            ]
        );
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_measurements("[]").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_array() {
        let err = parse_measurements(r#"{"timestamp": "2024-01-15 10:00:00"}"#).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = parse_measurements("[{").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_rejects_wrong_label_shape() {
        let json = r#"[{"timestamp": "2024-01-15 10:00:00", "top_5_labels": {"10": "traffic"}}]"#;
        assert!(matches!(
            parse_measurements(json).unwrap_err(),
            LoadError::Parse(_)
        ));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let json = r#"[
            {"timestamp": "2024-01-15 10:00:00"},
            {"timestamp": "2024-01-15 25:00:00"}
        ]"#;

        match parse_measurements(json).unwrap_err() {
            LoadError::InvalidTimestamp { index, value } => {
                assert_eq!(index, 1);
                assert_eq!(value, "2024-01-15 25:00:00");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_timestamp_without_time() {
        let json = r#"[{"timestamp": "2024-01-15"}]"#;
        assert!(matches!(
            parse_measurements(json).unwrap_err(),
            LoadError::InvalidTimestamp { index: 0, .. }
        ));
    }

    #[test]
    fn test_rejects_unpadded_hour() {
        let json = r#"[
            {"timestamp": "2024-01-15 09:30:00", "LAeq_segment_dB": 50.0, "top_5_labels": ["traffic"]},
            {"timestamp": "2024-01-15 9:30:00", "LAeq_segment_dB": 50.0, "top_5_labels": ["traffic"]}
        ]"#;

        match parse_measurements(json).unwrap_err() {
            LoadError::InvalidTimestamp { index, value } => {
                assert_eq!(index, 1);
                assert_eq!(value, "2024-01-15 9:30:00");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_unpadded_date() {
        let json = r#"[{"timestamp": "2024-1-15 09:30:00"}]"#;
        assert!(matches!(
            parse_measurements(json).unwrap_err(),
            LoadError::InvalidTimestamp { index: 0, .. }
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let records = load_measurements(file.path()).unwrap();
        assert_eq!(records.len(), parse_measurements(SAMPLE).unwrap().len());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_measurements(Path::new("/nonexistent/measurements.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/measurements.json"));
    }
}
