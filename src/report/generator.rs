//! Markdown and JSON report generation.
//!
//! This module renders the aggregated statistics and the optional
//! diagnostic text into a noise report.

use crate::analysis::loudest_hours;
use crate::config::ReportConfig;
use crate::models::{Grade, MeasurementSummary, Report, ReportMetadata};
use anyhow::Result;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, settings: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Sonalyze Noise Report\n\n");

    if let Some(ref load_error) = report.load_error {
        output.push_str(&format!(
            "> ⚠️ **Measurements could not be loaded:** {}\n>\n> The figures below are placeholders.\n\n",
            load_error
        ));
    }

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_noise_types_section(&report.summary));

    if settings.include_hourly_tables {
        output.push_str(&generate_hourly_section(&report.summary));
    }

    output.push_str(&generate_diagnostic_section(report));
    output.push_str(&generate_recommendations_section(&report.recommendations));
    output.push_str(&generate_footer());

    output
}

fn fmt_db(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1} dB", v),
        None => "n/a".to_string(),
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input File:** `{}`\n", metadata.input_file));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Measurements:** {}\n",
        metadata.measurement_count
    ));
    if metadata.records_without_labels > 0 {
        section.push_str(&format!(
            "- **Records Without Noise Labels:** {}\n",
            metadata.records_without_labels
        ));
    }
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the daily summary section.
fn generate_summary_section(summary: &MeasurementSummary) -> String {
    let mut section = String::new();

    section.push_str("## Daily Summary\n\n");

    let grade = match summary.grade() {
        Some(g) => format!("{} {}", g.emoji(), g),
        None => summary.grade.clone(),
    };

    section.push_str("| Grade | Average | Day | Night | Background (L90) | Min | Max |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{}** | {:.1} dB | {:.1} dB | {:.1} dB | {:.1} dB | {} | {} |\n\n",
        grade,
        summary.avg_db,
        summary.avg_db_day,
        summary.avg_db_night,
        summary.avg_background_db,
        fmt_db(summary.min_db),
        fmt_db(summary.max_db),
    ));

    let loudest = loudest_hours(summary, 3);
    if !loudest.is_empty() {
        section.push_str("### Loudest Hours\n\n");
        section.push_str("| Hour | Average |\n");
        section.push_str("|:---|:---:|\n");

        for (hour, level) in loudest {
            section.push_str(&format!("| {}h | {:.1} dB |\n", hour, level));
        }
        section.push('\n');
    }

    section
}

/// Generate the noise-type breakdown.
fn generate_noise_types_section(summary: &MeasurementSummary) -> String {
    if summary.noise_percentage.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Dominant Noise Types\n\n");
    section.push_str("| Noise Type | Share |\n");
    section.push_str("|:---|:---:|\n");

    for share in &summary.noise_percentage {
        section.push_str(&format!(
            "| {} | {:.1}% |\n",
            share.noise_type, share.percentage
        ));
    }
    section.push('\n');

    section
}

/// Generate the per-hour table.
fn generate_hourly_section(summary: &MeasurementSummary) -> String {
    if summary.db_min_max_peak_by_hourly.is_empty() && summary.noise_percentage_hourly.is_empty()
    {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Hourly Breakdown\n\n");
    section.push_str("| Hour | Average | Min | Max | Peak | Dominant Noise |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---|\n");

    let mut hours: Vec<&String> = summary
        .db_min_max_peak_by_hourly
        .keys()
        .chain(summary.noise_percentage_hourly.keys())
        .collect();
    hours.sort();
    hours.dedup();

    for hour in hours {
        let levels = summary
            .db_min_max_peak_by_hourly
            .get(hour)
            .cloned()
            .unwrap_or_default();
        let dominant = summary
            .noise_percentage_hourly
            .get(hour)
            .map(|d| format!("{} ({:.1}%)", d.noise_type, d.percentage))
            .unwrap_or_else(|| "-".to_string());

        section.push_str(&format!(
            "| {}h | {} | {} | {} | {} | {} |\n",
            hour,
            fmt_db(levels.average_db),
            fmt_db(levels.min_db),
            fmt_db(levels.max_db),
            fmt_db(levels.peak_db),
            dominant
        ));
    }
    section.push('\n');

    section
}

/// Generate the diagnostic section.
fn generate_diagnostic_section(report: &Report) -> String {
    let mut section = String::new();

    if let Some(ref text) = report.diagnostic {
        section.push_str("## Diagnostic\n\n");
        section.push_str(text.trim());
        section.push_str("\n\n");
    } else if let Some(ref error) = report.diagnostic_error {
        section.push_str("## Diagnostic\n\n");
        section.push_str(&format!("*Diagnostic unavailable: {}*\n\n", error));
    }

    section
}

/// Generate the recommendations section.
fn generate_recommendations_section(recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommendations\n\n");

    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by Sonalyze*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Whether the grade reaches a `--fail-on` threshold (same or worse).
pub fn grade_at_or_worse(summary: &MeasurementSummary, threshold: Grade) -> bool {
    summary.grade().is_some_and(|g| g >= threshold)
}

/// Write content to a file, creating parent directories as needed.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{extract_fields, summarize, AggregationSettings, FieldPolicy};
    use crate::loader::parse_measurements;
    use chrono::Utc;

    fn create_test_report() -> Report {
        let records =
            parse_measurements(include_str!("../../fixtures/day_sample.json")).unwrap();
        let extracts = extract_fields(&records, FieldPolicy::Strict).unwrap();
        let summary = summarize(&extracts, &AggregationSettings::default());

        Report {
            metadata: ReportMetadata {
                input_file: "day_sample.json".to_string(),
                analysis_date: Utc::now(),
                model_used: Some("test-model".to_string()),
                measurement_count: records.len(),
                records_without_labels: 0,
                duration_seconds: 1.5,
            },
            summary,
            extracts: Some(extracts),
            diagnostic: Some("1. Overview\nNights are calm.".to_string()),
            diagnostic_error: None,
            recommendations: vec!["Install double glazing".to_string()],
            load_error: None,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# Sonalyze Noise Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Daily Summary"));
        assert!(markdown.contains("44.3 dB"));
        assert!(markdown.contains("## Dominant Noise Types"));
        assert!(markdown.contains("| silence | 25.0% |"));
        assert!(markdown.contains("## Hourly Breakdown"));
        assert!(markdown.contains("| 07h | 55.7 dB | 39.0 dB | 74.0 dB | 80.0 dB | traffic (66.7%) |"));
        assert!(markdown.contains("Nights are calm."));
        assert!(markdown.contains("1. Install double glazing"));
        assert!(!markdown.contains("placeholders"));
    }

    #[test]
    fn test_markdown_without_hourly_tables() {
        let report = create_test_report();
        let settings = ReportConfig {
            include_hourly_tables: false,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &settings);
        assert!(!markdown.contains("## Hourly Breakdown"));
    }

    #[test]
    fn test_markdown_diagnostic_error() {
        let mut report = create_test_report();
        report.diagnostic = None;
        report.diagnostic_error = Some("cannot connect to model server".to_string());

        let markdown = generate_markdown_report(&report, &ReportConfig::default());
        assert!(markdown.contains("Diagnostic unavailable: cannot connect to model server"));
    }

    #[test]
    fn test_markdown_placeholder_report() {
        let mut report = create_test_report();
        report.summary = MeasurementSummary::placeholder();
        report.load_error = Some("file not found".to_string());

        let markdown = generate_markdown_report(&report, &ReportConfig::default());
        assert!(markdown.contains("Measurements could not be loaded:** file not found"));
        assert!(markdown.contains("42.5 dB"));
        assert!(!markdown.contains("## Dominant Noise Types"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let report = create_test_report();
        let section = generate_metadata_section(&report.metadata);

        assert!(section.contains("day_sample.json"));
        assert!(section.contains("test-model"));
        assert!(section.contains("**Measurements:** 12"));
        assert!(!section.contains("Without Noise Labels"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["avg_db"], 44.3);
        assert_eq!(value["summary"]["grade"], "C");
        assert_eq!(value["summary"]["noise_percentage"][0]["noise_type"], "silence");
        assert_eq!(
            value["summary"]["db_min_max_peak_by_hourly"]["07"]["peak_dB"],
            80.0
        );
        assert_eq!(
            value["extracts"]["average_median"][0]["average_dB"],
            32.0
        );
        assert!(value.get("diagnostic_error").is_none());
    }

    #[test]
    fn test_grade_threshold() {
        let report = create_test_report();
        assert!(grade_at_or_worse(&report.summary, Grade::C));
        assert!(grade_at_or_worse(&report.summary, Grade::B));
        assert!(!grade_at_or_worse(&report.summary, Grade::D));

        let mut unknown = report.summary.clone();
        unknown.grade = "N/A".to_string();
        assert!(!grade_at_or_worse(&unknown, Grade::A));
    }

    #[test]
    fn test_write_output_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("day.md");

        write_output(&path, "# report").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# report");
    }
}
