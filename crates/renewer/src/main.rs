//! Reissue - Main entry point
//!
//! Renews X.509 certificates that are about to expire, once or on a schedule.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use reissue::renewer::hours;
use reissue::{MappingOutcome, RenewalScheduler, Renewer, RunReport, SetupError};
use reissue_config::Config;

/// Configuration file used when none is given
const DEFAULT_CONFIG_PATH: &str = "reissue.kdl";

/// Exit status when `--fail-on-error` is set and something failed
const EXIT_RENEWAL_FAILED: u8 = 2;

/// Reissue - batch renewal of X.509 certificates
#[derive(Parser, Debug)]
#[command(name = "reissue")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (KDL, or TOML with a .toml extension)
    #[arg(short = 'c', long = "config", env = "REISSUE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Exit with status 2 if any mapping or certificate failed
    #[arg(long = "fail-on-error", global = true)]
    fail_on_error: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Run one renewal pass over every mapping (default)
    Run,
    /// Run renewal passes every interval-hours until stopped
    Daemon,
    /// Validate the configuration file and exit
    Test,
    /// Show discovered certificates and which are due, without renewing
    Scan,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            return Ok(ExitCode::FAILURE);
        }
    };

    let command = cli.command.unwrap_or(Commands::Run);
    if let Commands::Test = command {
        return test_config(&config, &config_path);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;

    runtime.block_on(async {
        let renewer = match Renewer::from_config(&config) {
            Ok(renewer) => renewer,
            Err(SetupError::Config(e)) => {
                eprintln!("{:?}", miette::Report::new(e));
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e).context("Failed to set up renewal"),
        };

        let failed = match command {
            Commands::Run => {
                let report = renewer.run_once().await;
                print_report(&report);
                report.has_failures()
            }
            Commands::Daemon => {
                let interval =
                    Duration::from_secs(config.interval_hours.saturating_mul(3600));
                let scheduler = RenewalScheduler::new(renewer).with_interval(interval);
                let runs = scheduler.run(reissue::signals::shutdown_signal()).await;
                info!(runs, "Daemon stopped");
                false
            }
            Commands::Scan => scan(&renewer).await,
            Commands::Test => false,
        };

        Ok(if failed && cli.fail_on_error {
            ExitCode::from(EXIT_RENEWAL_FAILED)
        } else {
            ExitCode::SUCCESS
        })
    })
}

/// Install the global subscriber
fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Validate configuration and print a summary
fn test_config(config: &Config, path: &Path) -> Result<ExitCode> {
    let warnings = match config.validated() {
        Ok(warnings) => warnings,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            return Ok(ExitCode::FAILURE);
        }
    };
    for warning in &warnings {
        warn!("{}", warning);
    }

    let mappings = config.mappings();

    println!("reissue: configuration file {} test is successful", path.display());
    println!("  - {} scanner(s)", config.scanners.len());
    println!("  - {} provider(s)", config.providers.len());
    println!(
        "  - {} of {} mapping(s) runnable",
        mappings.len(),
        config.mappings.len()
    );
    for mapping in &mappings {
        println!(
            "    {}: {} -> {} (expire {}h, threshold {}h)",
            mapping.name,
            mapping.scanner,
            mapping.provider,
            mapping.expire_hours,
            mapping.threshold_hours
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Discovery only: print every record and whether it is due
async fn scan(renewer: &Renewer) -> bool {
    let mut failed = false;
    let now = Utc::now();

    for mapping in renewer.mappings() {
        let Some(scanner) = renewer.scanner(&mapping.scanner) else {
            println!("{}: scanner '{}' is not registered", mapping.name, mapping.scanner);
            continue;
        };

        let threshold = hours(mapping.threshold_hours);
        match scanner.scan(threshold).await {
            Ok(records) => {
                println!("{} ({} record(s)):", mapping.name, records.len());
                for record in records {
                    let expiration = record
                        .expiration
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string());
                    let due = if record.is_due(threshold, now) { "due" } else { "ok" };
                    println!("  [{due}] {} expires {expiration}", record.id);
                }
            }
            Err(e) => {
                failed = true;
                println!("{}: discovery failed: {e}", mapping.name);
            }
        }
    }

    failed
}

/// Print a one-line summary per mapping
fn print_report(report: &RunReport) {
    for mapping in &report.mappings {
        match &mapping.outcome {
            MappingOutcome::Completed(batch) => {
                println!(
                    "{}: {} discovered, {} due, {} renewed, {} failed",
                    mapping.name,
                    batch.discovered,
                    batch.eligible,
                    batch.renewed.len(),
                    batch.failures.len()
                );
                for failure in &batch.failures {
                    println!("  failed: {failure}");
                }
            }
            MappingOutcome::DiscoveryFailed(e) => {
                println!("{}: discovery failed: {e}", mapping.name);
            }
            MappingOutcome::Skipped(reason) => {
                println!("{}: skipped: {reason}", mapping.name);
            }
        }
    }
}
