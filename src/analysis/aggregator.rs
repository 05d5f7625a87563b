//! Measurement aggregation and statistics.
//!
//! This module reduces the per-record extracts to the daily and hourly
//! statistics shown in reports. Every function here is pure: the same
//! extracts always give the same statistics.

use crate::models::{
    AverageMedianExtract, BackgroundNoiseExtract, DominantNoiseExtract, Extracts, Grade,
    HourlyDominantNoise, HourlyLevels, MeasurementSummary, MinMaxPeakExtract, NoiseShare,
    RatingExtract, NOT_AVAILABLE,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Settings for the summary computation.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// How many noise types the daily breakdown keeps.
    pub top_noise_types: usize,
    /// First night hour (inclusive).
    pub night_start_hour: u32,
    /// First day hour after the night (exclusive end of the night).
    pub night_end_hour: u32,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            top_noise_types: 5,
            night_start_hour: 22,
            night_end_hour: 6,
        }
    }
}

impl From<&crate::config::AggregationConfig> for AggregationSettings {
    fn from(config: &crate::config::AggregationConfig) -> Self {
        Self {
            top_noise_types: config.top_noise_types,
            night_start_hour: config.night_start_hour,
            night_end_hour: config.night_end_hour,
        }
    }
}

impl AggregationSettings {
    /// Whether the given hour of day belongs to the night window.
    pub fn is_night_hour(&self, hour: u32) -> bool {
        if self.night_start_hour <= self.night_end_hour {
            (self.night_start_hour..self.night_end_hour).contains(&hour)
        } else {
            hour >= self.night_start_hour || hour < self.night_end_hour
        }
    }
}

/// Round to one decimal place, ties away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Two-digit hour of a `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn hour_of(timestamp: &str) -> Option<&str> {
    let hour = timestamp.split(' ').nth(1)?.split(':').next()?;
    match hour.parse::<u32>() {
        Ok(h) if hour.len() == 2 && h < 24 => Some(hour),
        _ => None,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Count labels, keeping the order in which each label first appears.
fn count_in_order<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for label in labels {
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    counts
}

/// Daily grade: mean of the valid letter ordinals, rounded to the nearest
/// grade (halves round up, towards the worse grade).
///
/// Missing or unknown letters are ignored. Returns `None` when no record
/// carries a valid grade.
pub fn average_rating(ratings: &[RatingExtract]) -> Option<Grade> {
    let avg = mean(
        ratings
            .iter()
            .filter_map(|r| r.rating.as_deref()?.parse::<Grade>().ok())
            .map(|g| f64::from(g.ordinal())),
    )?;

    Grade::from_ordinal(avg.round() as u8)
}

/// Same as [`average_rating`], rendered as a letter or `N/A`.
pub fn average_rating_label(ratings: &[RatingExtract]) -> String {
    average_rating(ratings)
        .map(|g| g.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Mean of the present `average_dB` values, rounded to one decimal.
/// Returns `0.0` when no value is present.
pub fn average_db(extracts: &[AverageMedianExtract]) -> f64 {
    mean(extracts.iter().filter_map(|e| e.average_db))
        .map(round1)
        .unwrap_or(0.0)
}

/// [`average_db`] restricted to records whose hour matches `keep`.
pub fn average_db_for_hours(
    extracts: &[AverageMedianExtract],
    keep: impl Fn(u32) -> bool,
) -> f64 {
    let selected = extracts.iter().filter(|e| {
        hour_of(&e.timestamp)
            .and_then(|h| h.parse::<u32>().ok())
            .is_some_and(&keep)
    });

    mean(selected.filter_map(|e| e.average_db))
        .map(round1)
        .unwrap_or(0.0)
}

/// Mean background level (L90), rounded to one decimal, `0.0` when absent.
pub fn average_background_db(extracts: &[BackgroundNoiseExtract]) -> f64 {
    mean(extracts.iter().filter_map(|e| e.background_noise_db))
        .map(round1)
        .unwrap_or(0.0)
}

/// Highest `max_dB` over all records.
pub fn max_level(extracts: &[MinMaxPeakExtract]) -> Option<f64> {
    extracts.iter().filter_map(|e| e.max_db).reduce(f64::max)
}

/// Lowest `min_dB` over all records.
pub fn min_level(extracts: &[MinMaxPeakExtract]) -> Option<f64> {
    extracts.iter().filter_map(|e| e.min_db).reduce(f64::min)
}

/// Group dominant noise types by the hour of their timestamp.
///
/// Labels keep input order within an hour. Hours without records are
/// absent, as are records without a dominant noise type.
pub fn noise_type_by_hour(dominants: &[DominantNoiseExtract]) -> BTreeMap<String, Vec<String>> {
    let mut by_hour: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for item in dominants {
        let (Some(hour), Some(label)) = (hour_of(&item.timestamp), &item.dominant_noise_type)
        else {
            debug!("Skipping {} for hourly noise grouping", item.timestamp);
            continue;
        };

        by_hour
            .entry(hour.to_string())
            .or_default()
            .push(label.clone());
    }

    by_hour
}

/// Share of records dominated by each noise type, top `top_n` only,
/// highest share first.
///
/// Shares are `100 * count / total` rounded to one decimal. Only when the
/// returned shares would add up to more than 100% do the ones rounded up
/// the most give back a tenth each, until the total is exactly 100%.
/// Equal counts keep first-seen order.
pub fn dominant_noise_percentage_daily(
    dominants: &[DominantNoiseExtract],
    top_n: usize,
) -> Vec<NoiseShare> {
    let mut counts = count_in_order(
        dominants
            .iter()
            .filter_map(|d| d.dominant_noise_type.as_deref()),
    );
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return Vec::new();
    }

    counts.sort_by_key(|(_, c)| std::cmp::Reverse(*c));
    counts.truncate(top_n);

    // Work in tenths of a percent so the total can be checked exactly.
    let total = total as i64;
    let mut tenths: Vec<i64> = counts
        .iter()
        .map(|(_, c)| (2000 * *c as i64 + total) / (2 * total))
        .collect();

    let mut sum: i64 = tenths.iter().sum();
    while sum > 1000 {
        let overshoot = |i: usize| tenths[i] * total - 1000 * counts[i].1 as i64;
        let worst = (0..tenths.len())
            .reduce(|best, i| if overshoot(i) >= overshoot(best) { i } else { best })
            .unwrap_or(0);
        tenths[worst] -= 1;
        sum -= 1;
    }

    counts
        .into_iter()
        .zip(tenths)
        .map(|((label, _), t)| NoiseShare {
            noise_type: label.to_string(),
            percentage: t as f64 / 10.0,
        })
        .collect()
}

/// Most frequent noise type of each hour, with its share of that hour.
///
/// Ties go to the label counted first within the hour.
pub fn dominant_noise_percentage_hourly(
    by_hour: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, HourlyDominantNoise> {
    let mut hourly = BTreeMap::new();

    for (hour, labels) in by_hour {
        let counts = count_in_order(labels.iter().map(String::as_str));
        let Some((label, count)) = counts
            .into_iter()
            .reduce(|best, next| if next.1 > best.1 { next } else { best })
        else {
            continue;
        };

        hourly.insert(
            hour.clone(),
            HourlyDominantNoise {
                noise_type: label.to_string(),
                percentage: round1(100.0 * count as f64 / labels.len() as f64),
            },
        );
    }

    hourly
}

#[derive(Default)]
struct LevelBucket {
    average_sum: f64,
    average_count: usize,
    min: Option<f64>,
    max: Option<f64>,
    peak: Option<f64>,
}

fn fold_option(current: Option<f64>, next: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (current, next) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

/// Per-hour representative levels.
///
/// For each hour: `average_dB` is the mean of the records' `average_dB`
/// values, `min_dB` the lowest `min_dB`, `max_dB` the highest `max_dB` and
/// `peak_dB` the highest `peak_dB`. All values are rounded to one decimal.
/// Each extract list is bucketed by its own timestamps.
pub fn min_max_peak_by_hour(
    averages_medians: &[AverageMedianExtract],
    min_max_peaks: &[MinMaxPeakExtract],
) -> BTreeMap<String, HourlyLevels> {
    let mut buckets: BTreeMap<String, LevelBucket> = BTreeMap::new();

    for item in averages_medians {
        let Some(hour) = hour_of(&item.timestamp) else {
            continue;
        };
        let bucket = buckets.entry(hour.to_string()).or_default();
        if let Some(avg) = item.average_db {
            bucket.average_sum += avg;
            bucket.average_count += 1;
        }
    }

    for item in min_max_peaks {
        let Some(hour) = hour_of(&item.timestamp) else {
            continue;
        };
        let bucket = buckets.entry(hour.to_string()).or_default();
        bucket.min = fold_option(bucket.min, item.min_db, f64::min);
        bucket.max = fold_option(bucket.max, item.max_db, f64::max);
        bucket.peak = fold_option(bucket.peak, item.peak_db, f64::max);
    }

    buckets
        .into_iter()
        .map(|(hour, b)| {
            let average_db = (b.average_count > 0)
                .then(|| round1(b.average_sum / b.average_count as f64));
            let levels = HourlyLevels {
                average_db,
                min_db: b.min.map(round1),
                max_db: b.max.map(round1),
                peak_db: b.peak.map(round1),
            };
            (hour, levels)
        })
        .collect()
}

/// Compute every summary statistic from the extracts.
pub fn summarize(extracts: &Extracts, settings: &AggregationSettings) -> MeasurementSummary {
    let noise_by_hour = noise_type_by_hour(&extracts.dominant_noise);
    let noise_percentage_hourly = dominant_noise_percentage_hourly(&noise_by_hour);

    let summary = MeasurementSummary {
        measurement_count: extracts.len(),
        avg_db: average_db(&extracts.average_median),
        avg_db_day: average_db_for_hours(&extracts.average_median, |h| {
            !settings.is_night_hour(h)
        }),
        avg_db_night: average_db_for_hours(&extracts.average_median, |h| {
            settings.is_night_hour(h)
        }),
        max_db: max_level(&extracts.min_max_peak),
        min_db: min_level(&extracts.min_max_peak),
        avg_background_db: average_background_db(&extracts.background_noise),
        grade: average_rating_label(&extracts.ratings),
        noise_by_hour,
        noise_percentage: dominant_noise_percentage_daily(
            &extracts.dominant_noise,
            settings.top_noise_types,
        ),
        noise_percentage_hourly,
        db_min_max_peak_by_hourly: min_max_peak_by_hour(
            &extracts.average_median,
            &extracts.min_max_peak,
        ),
        placeholder: false,
    };

    debug!(
        "Summarized {} records: {} dB, grade {}",
        summary.measurement_count, summary.avg_db, summary.grade
    );

    summary
}

/// The hours with the highest average level, loudest first.
pub fn loudest_hours(summary: &MeasurementSummary, n: usize) -> Vec<(&str, f64)> {
    let mut hours: Vec<(&str, f64)> = summary
        .db_min_max_peak_by_hourly
        .iter()
        .filter_map(|(hour, levels)| Some((hour.as_str(), levels.average_db?)))
        .collect();

    hours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    hours.truncate(n);

    hours
}
