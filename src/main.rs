//! Sonalyze - acoustic measurement aggregator
//!
//! A CLI tool that summarizes a day of sound-level measurements and asks
//! a local LLM (via Ollama) for a plain-text noise diagnostic.
//!
//! Exit codes:
//!   0 - Success (grade below the --fail-on threshold, or no --fail-on set)
//!   1 - Runtime error (unreadable input, bad config, unwritable output, etc.)
//!   2 - Daily grade at or worse than the --fail-on threshold

mod analysis;
mod cli;
mod config;
mod diagnostic;
mod loader;
mod models;
mod report;

use analysis::{AggregationSettings, FieldPolicy};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use diagnostic::{DiagnosticRequest, Diagnostician, OllamaDiagnostician};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Extracts, Grade, MeasurementSummary, Report, ReportMetadata};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Sonalyze v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .sonalyze.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize the model, night hours, and report contents.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Statistics produced from the input file (or placeholders standing in for it).
struct Aggregation {
    summary: MeasurementSummary,
    extracts: Option<Extracts>,
    records_without_labels: usize,
    load_error: Option<String>,
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = args.input_path();

    // Step 1: Load and aggregate the measurements
    println!("📥 Loading measurements: {}", input.display());
    let aggregation = aggregate(&args, &config)?;

    // Step 2: Chart data, when requested
    if let (Some(charts_path), Some(extracts)) = (&args.charts, &aggregation.extracts) {
        let charts = analysis::build_chart_data(extracts, &aggregation.summary);
        let json = serde_json::to_string_pretty(&charts)?;
        report::write_output(charts_path, &json)
            .with_context(|| format!("Failed to write chart data to {}", charts_path.display()))?;
        info!("Chart data written to {}", charts_path.display());
    }

    // Step 3: Diagnostic
    let wants_diagnostic = !args.no_diagnostic && aggregation.extracts.is_some();
    let (diagnostic, diagnostic_error) = if wants_diagnostic {
        run_diagnostic(&args, &config, &aggregation).await?
    } else {
        debug!("Diagnostic skipped");
        (None, None)
    };

    let recommendations = diagnostic
        .as_deref()
        .map(diagnostic::extract_recommendations)
        .unwrap_or_default();

    // Step 4: Build and write the report
    println!("\n📝 Generating report...");

    let metadata = ReportMetadata {
        input_file: input.display().to_string(),
        analysis_date: Utc::now(),
        model_used: wants_diagnostic.then(|| config.model.name.clone()),
        measurement_count: aggregation.summary.measurement_count,
        records_without_labels: aggregation.records_without_labels,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let is_placeholder = aggregation.summary.placeholder;
    let report = Report {
        metadata,
        summary: aggregation.summary,
        extracts: aggregation
            .extracts
            .filter(|_| config.report.include_extracts),
        diagnostic,
        diagnostic_error,
        recommendations,
        load_error: aggregation.load_error,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = std::path::PathBuf::from(&config.general.output);
    report::write_output(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let summary = &report.summary;
    println!("\n📊 Noise Summary:");
    println!("   Measurements: {}", summary.measurement_count);
    println!("   Grade: {}", summary.grade);
    println!(
        "   Average: {:.1} dB | Day: {:.1} dB | Night: {:.1} dB",
        summary.avg_db, summary.avg_db_day, summary.avg_db_night
    );
    if let Some(top) = summary.noise_percentage.first() {
        println!("   Main noise: {} ({:.1}%)", top.noise_type, top.percentage);
    }
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let threshold = Grade::from(fail_level);
        if is_placeholder {
            warn!("Skipping --fail-on check: statistics are placeholders");
        } else if report::grade_at_or_worse(summary, threshold) {
            eprintln!(
                "\n⛔ Daily grade {} is at or worse than {}. Failing (exit code 2).",
                summary.grade, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Load, extract and summarize the measurements.
fn aggregate(args: &Args, config: &Config) -> Result<Aggregation> {
    let input = args.input_path();

    let records = match loader::load_measurements(&input) {
        Ok(records) => records,
        Err(e) if args.placeholder_on_error => {
            warn!("{}; using placeholder statistics", e);
            return Ok(Aggregation {
                summary: MeasurementSummary::placeholder(),
                extracts: None,
                records_without_labels: 0,
                load_error: Some(e.to_string()),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let policy = FieldPolicy::from_strict(config.aggregation.strict);
    let extracts = analysis::extract_fields(&records, policy)?;
    let records_without_labels = analysis::records_without_labels(&extracts);
    if records_without_labels > 0 {
        warn!(
            "{} record(s) without noise labels were left out of the noise statistics",
            records_without_labels
        );
    }

    let settings = AggregationSettings::from(&config.aggregation);
    let summary = analysis::summarize(&extracts, &settings);

    Ok(Aggregation {
        summary,
        extracts: Some(extracts),
        records_without_labels,
        load_error: None,
    })
}

/// Ask the model for a diagnostic. Collaborator failures are reported
/// back as the second element rather than failing the run.
async fn run_diagnostic(
    args: &Args,
    config: &Config,
    aggregation: &Aggregation,
) -> Result<(Option<String>, Option<String>)> {
    let context = match args.context {
        Some(ref path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file: {}", path.display()))?,
        None => diagnostic::DEFAULT_GUIDELINES.to_string(),
    };

    let accommodation = match args.accommodation {
        Some(ref path) => Some(std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read accommodation file: {}", path.display())
        })?),
        None => None,
    };

    let aggregated_json = serde_json::to_string(&serde_json::json!({
        "summary": &aggregation.summary,
        "extracts": &aggregation.extracts,
    }))?;

    let request = DiagnosticRequest {
        context,
        aggregated_json,
        accommodation,
    };

    println!("\n🤖 Requesting diagnostic...");
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    println!("   Timeout: {}s", config.model.timeout_seconds);

    let diagnostician = match OllamaDiagnostician::new((&config.model).into()) {
        Ok(d) => d,
        Err(e) => {
            warn!("Diagnostic unavailable: {}", e);
            return Ok((None, Some(e.to_string())));
        }
    };

    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message("Waiting for the model...");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = diagnostician.diagnose(&request).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(text) => {
            info!("Diagnostic received ({} chars)", text.len());
            Ok((Some(diagnostic::strip_code_blocks(&text)), None))
        }
        Err(e) => {
            warn!("Diagnostic unavailable: {}", e);
            println!("   ⚠️  Diagnostic unavailable: {}", e);
            Ok((None, Some(e.to_string())))
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
