//! Per-record field extraction.
//!
//! Splits each raw measurement into the five extract kinds. Every extract
//! list is index-aligned with the input and carries its own timestamp copy.

use crate::models::{
    AverageMedianExtract, BackgroundNoiseExtract, DominantNoiseExtract, Extracts,
    MinMaxPeakExtract, RatingExtract, RawMeasurement,
};
use thiserror::Error;
use tracing::{debug, warn};

/// A record is missing a field required for extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("record {index} ({timestamp}) has no noise labels")]
    MissingLabels { index: usize, timestamp: String },
}

/// What to do with a record that has no noise labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPolicy {
    /// Keep the record; its dominant noise type is left empty and it is
    /// ignored by the noise-type statistics.
    #[default]
    Lenient,
    /// Abort the whole batch with a [`FieldError`].
    Strict,
}

impl FieldPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FieldPolicy::Strict
        } else {
            FieldPolicy::Lenient
        }
    }
}

/// Extract the five per-record views from the raw measurements.
pub fn extract_fields(
    records: &[RawMeasurement],
    policy: FieldPolicy,
) -> Result<Extracts, FieldError> {
    let mut extracts = Extracts {
        ratings: Vec::with_capacity(records.len()),
        dominant_noise: Vec::with_capacity(records.len()),
        average_median: Vec::with_capacity(records.len()),
        min_max_peak: Vec::with_capacity(records.len()),
        background_noise: Vec::with_capacity(records.len()),
    };

    for (index, record) in records.iter().enumerate() {
        let dominant = match record.top_5_labels.first() {
            Some(label) => Some(label.clone()),
            None if policy == FieldPolicy::Strict => {
                return Err(FieldError::MissingLabels {
                    index,
                    timestamp: record.timestamp.clone(),
                });
            }
            None => {
                warn!(
                    "Record {} ({}) has no noise labels, skipping it for noise statistics",
                    index, record.timestamp
                );
                None
            }
        };

        extracts.ratings.push(RatingExtract {
            timestamp: record.timestamp.clone(),
            rating: record.laeq_rating.clone(),
        });
        extracts.dominant_noise.push(DominantNoiseExtract {
            timestamp: record.timestamp.clone(),
            dominant_noise_type: dominant,
        });
        extracts.average_median.push(AverageMedianExtract {
            timestamp: record.timestamp.clone(),
            average_db: record.laeq_segment_db,
            median_db: record.l50_db,
        });
        extracts.min_max_peak.push(MinMaxPeakExtract {
            timestamp: record.timestamp.clone(),
            min_db: record.lmin_db,
            max_db: record.lmax_db,
            peak_db: record.lpeak_db,
        });
        extracts.background_noise.push(BackgroundNoiseExtract {
            timestamp: record.timestamp.clone(),
            background_noise_db: record.l90_db,
        });
    }

    debug!("Extracted fields from {} records", records.len());
    Ok(extracts)
}

/// Number of records whose dominant noise type could not be extracted.
pub fn records_without_labels(extracts: &Extracts) -> usize {
    extracts
        .dominant_noise
        .iter()
        .filter(|d| d.dominant_noise_type.is_none())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_measurements;

    fn record(timestamp: &str, labels: &[&str]) -> RawMeasurement {
        RawMeasurement {
            timestamp: timestamp.to_string(),
            laeq_rating: Some("C".to_string()),
            laeq_segment_db: Some(52.3),
            l50_db: Some(48.1),
            lmin_db: Some(30.0),
            lmax_db: Some(70.2),
            lpeak_db: Some(75.0),
            l90_db: Some(28.5),
            top_5_labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_extracts_are_index_aligned() {
        let records =
            parse_measurements(include_str!("../../fixtures/day_sample.json")).unwrap();
        let extracts = extract_fields(&records, FieldPolicy::Strict).unwrap();

        assert_eq!(extracts.len(), records.len());
        assert_eq!(extracts.dominant_noise.len(), records.len());
        assert_eq!(extracts.average_median.len(), records.len());
        assert_eq!(extracts.min_max_peak.len(), records.len());
        assert_eq!(extracts.background_noise.len(), records.len());

        for (k, raw) in records.iter().enumerate() {
            assert_eq!(extracts.ratings[k].timestamp, raw.timestamp);
            assert_eq!(extracts.dominant_noise[k].timestamp, raw.timestamp);
            assert_eq!(extracts.average_median[k].timestamp, raw.timestamp);
            assert_eq!(extracts.min_max_peak[k].timestamp, raw.timestamp);
            assert_eq!(extracts.background_noise[k].timestamp, raw.timestamp);
        }
    }

    #[test]
    fn test_field_mapping() {
        let records = vec![record("2024-01-15 14:00:00", &["traffic", "voices"])];
        let extracts = extract_fields(&records, FieldPolicy::Lenient).unwrap();

        assert_eq!(extracts.ratings[0].rating.as_deref(), Some("C"));
        assert_eq!(
            extracts.dominant_noise[0].dominant_noise_type.as_deref(),
            Some("traffic")
        );
        assert_eq!(extracts.average_median[0].average_db, Some(52.3));
        assert_eq!(extracts.average_median[0].median_db, Some(48.1));
        assert_eq!(extracts.min_max_peak[0].min_db, Some(30.0));
        assert_eq!(extracts.min_max_peak[0].max_db, Some(70.2));
        assert_eq!(extracts.min_max_peak[0].peak_db, Some(75.0));
        assert_eq!(extracts.background_noise[0].background_noise_db, Some(28.5));
    }

    #[test]
    fn test_lenient_keeps_unlabelled_record() {
        let records = vec![
            record("2024-01-15 14:00:00", &["traffic"]),
            record("2024-01-15 14:30:00", &[]),
        ];
        let extracts = extract_fields(&records, FieldPolicy::Lenient).unwrap();

        assert_eq!(extracts.len(), 2);
        assert_eq!(extracts.dominant_noise[1].dominant_noise_type, None);
        assert_eq!(records_without_labels(&extracts), 1);
    }

    #[test]
    fn test_strict_rejects_unlabelled_record() {
        let records = vec![
            record("2024-01-15 14:00:00", &["traffic"]),
            record("2024-01-15 14:30:00", &[]),
        ];
        let err = extract_fields(&records, FieldPolicy::Strict).unwrap_err();

        assert_eq!(
            err,
            FieldError::MissingLabels {
                index: 1,
                timestamp: "2024-01-15 14:30:00".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let extracts = extract_fields(&[], FieldPolicy::Strict).unwrap();
        assert!(extracts.is_empty());
    }
}
