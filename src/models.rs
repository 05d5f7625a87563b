//! Data models for the measurement aggregator.
//!
//! This module contains the raw measurement record as it appears in the
//! input file, the per-record extracts derived from it, and the summary
//! and report structures handed to the presentation side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label used wherever a grade cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Acoustic comfort grade, from A (quietest) to G (loudest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Grade {
    /// All grades, best first.
    pub const ALL: [Grade; 7] = [
        Grade::A,
        Grade::B,
        Grade::C,
        Grade::D,
        Grade::E,
        Grade::F,
        Grade::G,
    ];

    /// Ordinal value used for averaging (A=1 .. G=7).
    pub fn ordinal(self) -> u8 {
        self as u8 + 1
    }

    /// Inverse of [`Grade::ordinal`].
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            1..=7 => Some(Self::ALL[usize::from(value - 1)]),
            _ => None,
        }
    }

    /// Returns an emoji representation of the grade.
    pub fn emoji(&self) -> &'static str {
        match self {
            Grade::A | Grade::B => "🟢",
            Grade::C | Grade::D => "🟡",
            Grade::E => "🟠",
            Grade::F | Grade::G => "🔴",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
            Grade::G => "G",
        };
        write!(f, "{}", letter)
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "E" => Ok(Grade::E),
            "F" => Ok(Grade::F),
            "G" => Ok(Grade::G),
            other => Err(format!("Unknown grade: {}", other)),
        }
    }
}

/// One measurement segment as stored in the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    /// Segment start, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// Letter grade of the segment.
    #[serde(rename = "LAeq_rating", default)]
    pub laeq_rating: Option<String>,
    /// Equivalent continuous level over the segment.
    #[serde(rename = "LAeq_segment_dB", default)]
    pub laeq_segment_db: Option<f64>,
    #[serde(rename = "L50_dB", default)]
    pub l50_db: Option<f64>,
    #[serde(rename = "Lmin_dB", default)]
    pub lmin_db: Option<f64>,
    #[serde(rename = "Lmax_dB", default)]
    pub lmax_db: Option<f64>,
    #[serde(rename = "LPeak_dB", default)]
    pub lpeak_db: Option<f64>,
    #[serde(rename = "L90_dB", default)]
    pub l90_db: Option<f64>,
    /// Noise classifications, most confident first.
    #[serde(default)]
    pub top_5_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingExtract {
    pub timestamp: String,
    pub rating: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMedianExtract {
    pub timestamp: String,
    #[serde(rename = "average_dB")]
    pub average_db: Option<f64>,
    #[serde(rename = "median_dB")]
    pub median_db: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxPeakExtract {
    pub timestamp: String,
    #[serde(rename = "min_dB")]
    pub min_db: Option<f64>,
    #[serde(rename = "max_dB")]
    pub max_db: Option<f64>,
    #[serde(rename = "peak_dB")]
    pub peak_db: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundNoiseExtract {
    pub timestamp: String,
    #[serde(rename = "background_noise_dB")]
    pub background_noise_db: Option<f64>,
}

/// Dominant noise type of one record.
///
/// `dominant_noise_type` is `None` only when the record had no labels and
/// the lenient field policy was in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantNoiseExtract {
    pub timestamp: String,
    pub dominant_noise_type: Option<String>,
}

/// The five per-record extract lists, index-aligned with the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extracts {
    pub ratings: Vec<RatingExtract>,
    pub dominant_noise: Vec<DominantNoiseExtract>,
    pub average_median: Vec<AverageMedianExtract>,
    pub min_max_peak: Vec<MinMaxPeakExtract>,
    pub background_noise: Vec<BackgroundNoiseExtract>,
}

impl Extracts {
    /// Number of records the extracts were built from.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

/// Share of the records dominated by one noise type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseShare {
    pub noise_type: String,
    pub percentage: f64,
}

/// Most frequent noise type within one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyDominantNoise {
    pub noise_type: String,
    pub percentage: f64,
}

/// Representative levels of one hour bucket. `None` when no record of
/// the hour carried the underlying field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyLevels {
    #[serde(rename = "average_dB")]
    pub average_db: Option<f64>,
    #[serde(rename = "min_dB")]
    pub min_db: Option<f64>,
    #[serde(rename = "max_dB")]
    pub max_db: Option<f64>,
    #[serde(rename = "peak_dB")]
    pub peak_db: Option<f64>,
}

/// Summary statistics over a whole measurement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    /// Number of records the statistics were computed from.
    pub measurement_count: usize,
    pub avg_db: f64,
    pub avg_db_day: f64,
    pub avg_db_night: f64,
    pub max_db: Option<f64>,
    pub min_db: Option<f64>,
    pub avg_background_db: f64,
    /// Daily grade letter, or `N/A`.
    pub grade: String,
    pub noise_by_hour: BTreeMap<String, Vec<String>>,
    /// Top noise types, highest share first.
    pub noise_percentage: Vec<NoiseShare>,
    pub noise_percentage_hourly: BTreeMap<String, HourlyDominantNoise>,
    pub db_min_max_peak_by_hourly: BTreeMap<String, HourlyLevels>,
    /// True when these numbers are stand-ins for data that failed to load.
    #[serde(default)]
    pub placeholder: bool,
}

impl MeasurementSummary {
    /// Fallback statistics shown when the measurement file cannot be read.
    pub fn placeholder() -> Self {
        Self {
            measurement_count: 0,
            avg_db: 42.5,
            avg_db_day: 42.5,
            avg_db_night: 33.2,
            max_db: Some(78.0),
            min_db: Some(22.0),
            avg_background_db: 0.0,
            grade: Grade::C.to_string(),
            noise_by_hour: BTreeMap::new(),
            noise_percentage: Vec::new(),
            noise_percentage_hourly: BTreeMap::new(),
            db_min_max_peak_by_hourly: BTreeMap::new(),
            placeholder: true,
        }
    }

    /// The daily grade, if one could be computed.
    pub fn grade(&self) -> Option<Grade> {
        self.grade.parse().ok()
    }
}

/// Metadata about the generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Measurement file the report was built from.
    pub input_file: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Model that produced the diagnostic, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub measurement_count: usize,
    /// Records whose dominant noise type could not be extracted.
    pub records_without_labels: usize,
    pub duration_seconds: f64,
}

/// The complete noise report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: MeasurementSummary,
    /// Per-record extracts, omitted when disabled in the report settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracts: Option<Extracts>,
    /// Free-text diagnostic produced by the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Why the diagnostic is missing, when it was requested but failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_error: Option<String>,
    pub recommendations: Vec<String>,
    /// Why the measurement file could not be used, for placeholder reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_ordinal_roundtrip() {
        for grade in Grade::ALL {
            assert_eq!(Grade::from_ordinal(grade.ordinal()), Some(grade));
        }
        assert_eq!(Grade::A.ordinal(), 1);
        assert_eq!(Grade::G.ordinal(), 7);
        assert_eq!(Grade::from_ordinal(0), None);
        assert_eq!(Grade::from_ordinal(8), None);
    }

    #[test]
    fn test_grade_ordering() {
        assert!(Grade::A < Grade::B);
        assert!(Grade::F < Grade::G);
    }

    #[test]
    fn test_grade_from_str() {
        assert_eq!("C".parse::<Grade>(), Ok(Grade::C));
        assert!("c".parse::<Grade>().is_err());
        assert!("H".parse::<Grade>().is_err());
        assert!("".parse::<Grade>().is_err());
    }

    #[test]
    fn test_raw_measurement_field_names() {
        let json = r#"{
            "timestamp": "2024-01-15 14:00:00",
            "LAeq_rating": "C",
            "LAeq_segment_dB": 52.3,
            "L50_dB": 48.1,
            "Lmin_dB": 30.0,
            "Lmax_dB": 70.2,
            "LPeak_dB": 75.0,
            "L90_dB": 28.5,
            "top_5_labels": ["traffic", "voices"]
        }"#;

        let record: RawMeasurement = serde_json::from_str(json).unwrap();
        assert_eq!(record.laeq_rating.as_deref(), Some("C"));
        assert_eq!(record.laeq_segment_db, Some(52.3));
        assert_eq!(record.lpeak_db, Some(75.0));
        assert_eq!(record.top_5_labels[0], "traffic");
    }

    #[test]
    fn test_raw_measurement_missing_fields_are_none() {
        let json = r#"{"timestamp": "2024-01-15 14:00:00"}"#;
        let record: RawMeasurement = serde_json::from_str(json).unwrap();
        assert_eq!(record.laeq_segment_db, None);
        assert_eq!(record.laeq_rating, None);
        assert!(record.top_5_labels.is_empty());
    }

    #[test]
    fn test_placeholder_summary() {
        let summary = MeasurementSummary::placeholder();
        assert!(summary.placeholder);
        assert_eq!(summary.grade(), Some(Grade::C));
        assert_eq!(summary.avg_db_night, 33.2);
    }

    #[test]
    fn test_summary_grade_not_available() {
        let mut summary = MeasurementSummary::placeholder();
        summary.grade = NOT_AVAILABLE.to_string();
        assert_eq!(summary.grade(), None);
    }
}
