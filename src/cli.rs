//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::agent::AgentKind;
use crate::models::{Language, ReportSummary};
use clap::Parser;
use std::path::{Path, PathBuf};

/// CodeSwarm - multi-agent static analysis for source snippets
///
/// Runs error detection, complexity, memory, security, quality,
/// algorithm visualization and fix suggestion agents over one file and
/// prints a combined report.
///
/// Examples:
///   codeswarm --file app.py
///   codeswarm --file - --language javascript --format json
///   codeswarm --file main.c --fail-on critical --stream
///   codeswarm --serve --port 8080
///   codeswarm --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Source file to analyze, or `-` to read from stdin
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["serve", "list_agents", "list_languages", "init_config"]
    )]
    pub file: Option<PathBuf>,

    /// Language of the source
    ///
    /// Inferred from the file extension when omitted.
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<Language>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print progress events as JSON lines on stderr
    #[arg(long)]
    pub stream: bool,

    /// Fail if issues at or above this level are found
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is exceeded.
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Start the HTTP API server
    #[arg(long, conflicts_with = "file")]
    pub serve: bool,

    /// Address for the HTTP server to bind
    #[arg(long, env = "CODESWARM_HOST", value_name = "HOST")]
    pub host: Option<String>,

    /// Port for the HTTP server
    #[arg(long, env = "CODESWARM_PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// List the built-in agents and exit
    #[arg(long)]
    pub list_agents: bool,

    /// List the supported languages and exit
    #[arg(long)]
    pub list_languages: bool,

    /// Generate a default .codeswarm.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .codeswarm.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-agent timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Agents to skip (comma-separated)
    ///
    /// Example: --disable memory_profiler,algorithm_visualizer
    #[arg(long, value_name = "AGENTS", value_delimiter = ',')]
    pub disable: Option<Vec<String>>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
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

/// Threshold for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Warning,
    Critical,
}

impl FailOnLevel {
    /// Whether the summary contains issues at or above this level.
    pub fn exceeded_by(&self, summary: &ReportSummary) -> bool {
        match self {
            FailOnLevel::Critical => summary.critical_issues > 0,
            FailOnLevel::Warning => summary.critical_issues + summary.warnings > 0,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the source is read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.file.as_deref() == Some(Path::new("-"))
    }

    /// Language given on the command line, else guessed from the file extension.
    pub fn resolve_language(&self) -> Option<Language> {
        self.language.or_else(|| {
            self.file
                .as_deref()
                .and_then(|p| p.extension())
                .and_then(|ext| ext.to_str())
                .and_then(Language::from_extension)
        })
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref disabled) = self.disable {
            if let Some(unknown) = disabled.iter().find(|id| AgentKind::from_id(id).is_none()) {
                return Err(format!("Unknown agent: {}", unknown));
            }
        }

        // Listing and config generation ignore the input file
        if self.init_config || self.list_agents || self.list_languages || self.serve {
            return Ok(());
        }

        if self.reads_stdin() {
            if self.language.is_none() {
                return Err("--language is required when reading from stdin".to_string());
            }
            return Ok(());
        }

        if let Some(ref path) = self.file {
            if !path.is_file() {
                return Err(format!("File does not exist: {}", path.display()));
            }
            if self.resolve_language().is_none() {
                return Err(format!(
                    "Cannot infer language from {}; pass --language",
                    path.display()
                ));
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
}
