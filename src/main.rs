use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod exit_codes;
mod harness;
mod join;
mod mysql;
mod output;
mod phases;
mod probe;
mod report;

use config::{parse_duration, Endpoint, HarnessConfig};
use mysql::MySqlConnector;
use output::Output;
use report::ConsoleReporter;

/// Version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the config file
const CONFIG_ENV: &str = "WIREPROBE_CONFIG";

#[derive(Parser)]
#[command(name = "wireprobe")]
#[command(version = VERSION)]
#[command(
    about = "Probe a MySQL-wire-compatible server: handshake, credentials, pooled concurrency",
    long_about = None
)]
#[command(
    after_help = "Every phase always runs. The exit code is 0 whenever the run completes; read the check lines for results."
)]
struct Cli {
    /// Path to config file (default: ./wireprobe.toml, or $WIREPROBE_CONFIG)
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Endpoint for the basic connectivity phase (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    basic_endpoint: Option<String>,

    /// Endpoint for the credential sweep (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    sweep_endpoint: Option<String>,

    /// Endpoint for the pool stress phase (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    pool_endpoint: Option<String>,

    /// Number of concurrent pool tasks
    #[arg(long, value_name = "N")]
    tasks: Option<usize>,

    /// Give up waiting for pool tasks after this long (e.g. "30s"). Default: wait forever
    #[arg(long = "task-timeout", value_name = "DURATION")]
    task_timeout: Option<String>,

    /// Only print failed checks and the summary
    #[arg(long)]
    quiet: bool,

    /// Show debug logging and per-phase progress on stderr
    #[arg(long)]
    verbose: bool,

    /// Disable colored output (also honored: NO_COLOR)
    #[arg(long = "no-color")]
    no_color: bool,
}

/// Load the config file and apply CLI overrides on top.
fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let path = cli
        .config_path
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let mut config = HarnessConfig::load(path.as_deref())?;

    if let Some(ref raw) = cli.basic_endpoint {
        config.basic.target.endpoint = parse_endpoint(raw, "--basic-endpoint")?;
    }
    if let Some(ref raw) = cli.sweep_endpoint {
        config.credentials.endpoint = parse_endpoint(raw, "--sweep-endpoint")?;
    }
    if let Some(ref raw) = cli.pool_endpoint {
        config.pool.target.endpoint = parse_endpoint(raw, "--pool-endpoint")?;
    }
    if let Some(tasks) = cli.tasks {
        config.pool.tasks = tasks;
    }
    if let Some(ref raw) = cli.task_timeout {
        config.pool.task_timeout = Some(parse_duration(raw).context("Invalid --task-timeout")?);
    }

    Ok(config)
}

fn parse_endpoint(raw: &str, flag: &str) -> Result<Endpoint> {
    raw.parse::<Endpoint>()
        .with_context(|| format!("Invalid {}", flag))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "wireprobe=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A subscriber may already be installed (e.g. by a test harness).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before parsing CLI so env vars are available)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose);

    let output = Output::new(cli.quiet, cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };
    tracing::debug!(?config, "loaded configuration");

    let reporter = Arc::new(ConsoleReporter::new(cli.quiet));
    harness::run_all(&config, &MySqlConnector::new(), reporter.clone(), &output).await;

    if !cli.quiet {
        output.always("");
    }
    output.always(&reporter.summary().format_human());
    output.flush();

    std::process::exit(exit_codes::COMPLETED);
}
