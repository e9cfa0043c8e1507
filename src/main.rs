//! CodeSwarm - multi-agent static analysis orchestrator
//!
//! Runs a set of analysis agents over a source snippet, either once from
//! the command line or behind an HTTP API, and aggregates their findings
//! into a single report.
//!
//! Exit codes:
//!   0 - Success (no issues above threshold, or no --fail-on set)
//!   1 - Runtime or validation error (unreadable file, bad config, etc.)
//!   2 - Issues found above --fail-on threshold

mod agent;
mod analysis;
mod cli;
mod config;
mod models;
mod orchestrator;
mod report;
mod server;
mod validation;

use agent::{Agent, AgentKind};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{Language, Metadata};
use orchestrator::{JsonLinesNotifier, Notifier, ProgressBarNotifier, Scheduler};
use serde_json::json;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

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

    init_logging(&args);

    info!("CodeSwarm v{}", env!("CARGO_PKG_VERSION"));
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

/// Handle --init-config: generate a default .codeswarm.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize timeouts, enabled agents, limits, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report printed on stdout stays machine readable.
/// `RUST_LOG` overrides the level derived from the flags.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch to the selected mode. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    if args.list_agents {
        print_agents(&config);
        return Ok(0);
    }

    if args.list_languages {
        for language in &config.limits.supported_languages {
            println!("{:<12} {}", language.as_str(), language.display_name());
        }
        return Ok(0);
    }

    let scheduler = Scheduler::from_config(&config).context("Invalid agent configuration")?;
    for (idx, stage) in scheduler.stages().iter().enumerate() {
        let names: Vec<&str> = stage.iter().map(|agent| agent.name()).collect();
        debug!("Stage {}: {}", idx + 1, names.join(", "));
    }

    if args.serve {
        server::serve(config, scheduler).await?;
        return Ok(0);
    }

    analyze_file(&args, &config, &scheduler).await
}

/// Analyze the input file and write the report. Returns 0 or 2.
async fn analyze_file(args: &Args, config: &Config, scheduler: &Scheduler) -> Result<i32> {
    let code = read_source(args)?;
    let language = args
        .resolve_language()
        .map(|l| l.as_str())
        .unwrap_or_default();

    let language = match validation::validate_request(&code, language, &config.limits) {
        Ok(language) => language,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(1);
        }
    };

    let context = request_context(args, language);
    let notifier: Option<Box<dyn Notifier>> = if args.stream {
        Some(Box::new(JsonLinesNotifier::new(std::io::stderr())))
    } else if args.quiet {
        None
    } else {
        Some(Box::new(ProgressBarNotifier::new(scheduler.agent_count())))
    };

    let report = scheduler
        .analyze_with_progress(&code, language, context, notifier.as_deref())
        .await;
    drop(notifier);

    let failed = analysis::aggregator::failed_agents(&report.agent_results);
    if !failed.is_empty() {
        warn!("{} agent(s) failed during analysis", failed.len());
    }

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => println!("{}", output),
    }

    let summary = &report.summary;
    info!(
        "Findings: {} total | 🔴 {} critical | 🟡 {} warnings | 🔵 {} info | quality {}/100",
        summary.total_findings,
        summary.critical_issues,
        summary.warnings,
        summary.infos,
        summary.quality_score
    );

    // Check --fail-on threshold
    if let Some(level) = args.fail_on {
        if level.exceeded_by(summary) {
            eprintln!(
                "\n⛔ Issues found at or above {:?} level. Failing (exit code 2).",
                level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Read the source from the input file or stdin.
fn read_source(args: &Args) -> Result<String> {
    if args.reads_stdin() {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read source from stdin")?;
        return Ok(code);
    }

    let path = args.file.as_deref().context("No input file given")?;
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path.display()))
}

/// Auxiliary context passed to every agent.
fn request_context(args: &Args, language: Language) -> Metadata {
    let mut context = Metadata::new();
    context.insert("language".to_string(), json!(language));
    if let Some(ref path) = args.file {
        context.insert("source".to_string(), json!(path.display().to_string()));
    }
    context
}

fn print_agents(config: &Config) {
    println!("Built-in agents:\n");
    for kind in AgentKind::ALL {
        let marker = if config.orchestrator.is_enabled(kind.id()) {
            "✅"
        } else {
            "⛔"
        };
        println!("  {} {:<22} {}", marker, kind.id(), kind.description());
        if !kind.dependencies().is_empty() {
            println!("     depends on: {}", kind.dependencies().join(", "));
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
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
