//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Grade;
use clap::Parser;
use std::path::PathBuf;

/// Sonalyze - acoustic measurement aggregator
///
/// Summarize a day of sound-level measurements (averages, grades, dominant
/// noise types per hour) and ask a local LLM for a plain-text diagnostic.
///
/// Examples:
///   sonalyze --input measurements.json
///   sonalyze --input measurements.json --context oms.txt --accommodation flat.json
///   sonalyze --input measurements.json --no-diagnostic --format json
///   sonalyze --input measurements.json --charts charts.json --fail-on E
///   sonalyze --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Measurement file (JSON array of records)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Default: from config or sonalyze_report.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also write chart-ready data (timeline, radar, heatmap) as JSON
    #[arg(long, value_name = "FILE")]
    pub charts: Option<PathBuf>,

    /// Guideline text the diagnostic is grounded on
    ///
    /// Defaults to a built-in summary of the WHO noise guidelines.
    #[arg(long, value_name = "FILE")]
    pub context: Option<PathBuf>,

    /// Accommodation description handed to the diagnostic as-is
    #[arg(long, value_name = "FILE")]
    pub accommodation: Option<PathBuf>,

    /// Ollama model used for the diagnostic
    #[arg(short, long, default_value = "llama3.2:latest", env = "SONALYZE_MODEL")]
    pub model: String,

    /// Ollama API endpoint URL
    #[arg(long, default_value = "http://localhost:11434", env = "OLLAMA_URL")]
    pub ollama_url: String,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long, default_value = "0.3")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip the LLM diagnostic and only compute statistics
    #[arg(long)]
    pub no_diagnostic: bool,

    /// Fail on records without noise labels instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Write a report from placeholder statistics when the input cannot be loaded
    #[arg(long)]
    pub placeholder_on_error: bool,

    /// Exit with code 2 if the daily grade is at or worse than this grade
    #[arg(long, value_name = "GRADE", ignore_case = true)]
    pub fail_on: Option<GradeArg>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .sonalyze.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .sonalyze.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Grade threshold for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum GradeArg {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl From<GradeArg> for Grade {
    fn from(arg: GradeArg) -> Self {
        match arg {
            GradeArg::A => Grade::A,
            GradeArg::B => Grade::B,
            GradeArg::C => Grade::C,
            GradeArg::D => Grade::D,
            GradeArg::E => Grade::E,
            GradeArg::F => Grade::F,
            GradeArg::G => Grade::G,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate Ollama URL format (not needed without a diagnostic)
        if !self.no_diagnostic
            && !self.ollama_url.starts_with("http://")
            && !self.ollama_url.starts_with("https://")
        {
            return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // The input file itself is checked when loading, so that
        // --placeholder-on-error can take over.
        for (flag, path) in [
            ("--context", &self.context),
            ("--accommodation", &self.accommodation),
        ] {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(format!("{} file does not exist: {}", flag, path.display()));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Get the input path (validated by clap unless --init-config).
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_default()
    }
}
