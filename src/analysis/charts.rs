//! Chart-ready data for a charting front end.
//!
//! Produces a timeline of hourly levels, a radar of noise-type shares and a
//! (date, hour) heatmap of average levels.

use super::aggregator::{hour_of, round1};
use crate::models::{AverageMedianExtract, Extracts, MeasurementSummary};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub hour: u32,
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub peak: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPoint {
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub date: String,
    pub day: String,
    #[serde(rename = "dayIndex")]
    pub day_index: u32,
    pub hour: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartMetadata {
    pub grade: String,
    pub total_measurements: usize,
    pub hours_covered: usize,
    pub noise_types: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub timeline: Vec<TimelinePoint>,
    pub radar: Vec<RadarPoint>,
    pub heatmap: Vec<HeatmapCell>,
    pub metadata: ChartMetadata,
}

/// Turn a label like `dog_bark` into `Dog Bark`.
pub fn display_category(label: &str) -> String {
    label
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn heatmap(extracts: &[AverageMedianExtract]) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(NaiveDate, u32), (f64, usize)> = BTreeMap::new();

    for item in extracts {
        let Some(value) = item.average_db else {
            continue;
        };
        let Some(date) = item
            .timestamp
            .split(' ')
            .next()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let Some(hour) = hour_of(&item.timestamp).and_then(|h| h.parse::<u32>().ok()) else {
            continue;
        };

        let cell = cells.entry((date, hour)).or_insert((0.0, 0));
        cell.0 += value;
        cell.1 += 1;
    }

    cells
        .into_iter()
        .map(|((date, hour), (sum, count))| HeatmapCell {
            date: date.format("%Y-%m-%d").to_string(),
            day: date.format("%a").to_string(),
            day_index: date.weekday().num_days_from_monday(),
            hour,
            value: round1(sum / count as f64),
        })
        .collect()
}

/// Build all chart series from the extracts and their summary.
pub fn build_chart_data(extracts: &Extracts, summary: &MeasurementSummary) -> ChartData {
    let timeline: Vec<TimelinePoint> = summary
        .db_min_max_peak_by_hourly
        .iter()
        .filter_map(|(hour, levels)| {
            Some(TimelinePoint {
                hour: hour.parse().ok()?,
                value: levels.average_db,
                min: levels.min_db,
                max: levels.max_db,
                peak: levels.peak_db,
            })
        })
        .collect();

    let radar: Vec<RadarPoint> = summary
        .noise_percentage
        .iter()
        .map(|share| RadarPoint {
            category: display_category(&share.noise_type),
            value: share.percentage,
        })
        .collect();

    let metadata = ChartMetadata {
        grade: summary.grade.clone(),
        total_measurements: summary.measurement_count,
        hours_covered: timeline.len(),
        noise_types: radar.len(),
    };

    ChartData {
        timeline,
        radar,
        heatmap: heatmap(&extracts.average_median),
        metadata,
    }
}
