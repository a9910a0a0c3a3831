//! TLS Reach CLI Application
//!
//! Reads domain lists from files or stdin, checks that every resolved
//! address accepts a TLS handshake for its domain, and prints one verdict
//! line per domain as soon as it is known.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tls_reach_lib::{
    feed_files, feed_stdin, load_env_config, CheckConfig, ConfigManager, DomainVerifier,
    FileConfig, Pipeline, MAX_PARALLELISM,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for tls-reach
#[derive(Parser, Debug)]
#[command(name = "tls-reach")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check that domains accept TLS connections on every resolved address")]
#[command(
    long_about = "Check that domains accept TLS connections on every resolved address.\n\nFILES hold one or several domains per line, separated by whitespace or commas.\nWith no FILES, domains are read from stdin.\n\nExample:\n  domain.ru\n  domain2.ru,www.domain2.ru"
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Files with domains to check (stdin when none)
    #[arg(value_name = "FILES", help_heading = "Input")]
    pub files: Vec<PathBuf>,

    /// Timeout for every address in milliseconds (default: 1000)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "MS",
        help_heading = "Checking"
    )]
    pub timeout: Option<u64>,

    /// Parallel check count (default: 10, max: 1000)
    #[arg(
        short = 'p',
        long = "parallel",
        value_name = "N",
        help_heading = "Checking"
    )]
    pub parallel: Option<usize>,

    /// Port to connect to (default: 443)
    #[arg(long = "port", value_name = "PORT", help_heading = "Checking")]
    pub port: Option<u16>,

    /// File with allowed networks, one CIDR or address per line, #-comments allowed.
    /// Every address is allowed when not set.
    #[arg(
        short = 'n',
        long = "networks",
        value_name = "FILE",
        help_heading = "Checking"
    )]
    pub networks: Option<PathBuf>,

    /// Output one JSON object per domain
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Print totals to stderr when done
    #[arg(long = "summary", help_heading = "Output Format")]
    pub summary: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Verbose logging to stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.timeout == Some(0) {
        return Err("Timeout must be greater than 0".to_string());
    }

    if let Some(parallel) = args.parallel {
        if parallel == 0 || parallel > MAX_PARALLELISM {
            return Err(format!(
                "Parallel count must be between 1 and {}",
                MAX_PARALLELISM
            ));
        }
    }

    if args.port == Some(0) {
        return Err("Port must be between 1 and 65535".to_string());
    }

    Ok(())
}

/// Logs go to stderr. `RUST_LOG` applies unless `--verbose` is set.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Main checking logic: ingestion task, worker pool, and the result sink here.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = build_config(&args)?;
    debug!(?config, "effective configuration");

    let verifier = DomainVerifier::from_config(&config)?;
    if let Some(allow_list) = verifier.allow_list() {
        info!(
            "loaded {} networks ({} lines skipped)",
            allow_list.len(),
            allow_list.skipped().len()
        );
    }

    let pipeline = Pipeline::new(Arc::new(verifier), config.parallelism);
    let (tasks, tasks_rx) = pipeline.task_channel();
    let mut results = pipeline.spawn(tasks_rx);

    let files = args.files.clone();
    let ingestion = tokio::spawn(async move {
        if files.is_empty() {
            feed_stdin(tasks).await
        } else {
            feed_files(&files, tasks).await
        }
    });

    let started = Instant::now();
    let mut stats = ui::RunStats::default();
    let mut out = io::stdout();

    while let Some(verdict) = results.recv().await {
        ui::write_verdict(&mut out, &verdict, args.json)?;
        stats.record(&verdict);
    }

    let queued = ingestion.await?;
    debug!("{} domains queued, {} verdicts printed", queued, stats.domains);

    if args.summary {
        ui::print_summary(&stats, started.elapsed());
    }

    Ok(())
}

/// Build the run configuration with proper precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (TR_*)
/// 3. Explicit config file (--config or TR_CONFIG)
/// 4. Local config file (./tls-reach.toml or ./.tls-reach.toml)
/// 5. Global config file (~/.tls-reach.toml)
/// 6. XDG config file (~/.config/tls-reach/config.toml)
/// 7. Built-in defaults
fn build_config(args: &Args) -> Result<CheckConfig, Box<dyn Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config(args.verbose);

    let explicit_path = args.config.as_ref().or(env_config.config.as_ref());
    let file_config = match explicit_path {
        Some(path) => {
            debug!("using explicit config file {}", path.display());
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path.display(), e))?
        }
        None => config_manager.discover_and_load().unwrap_or_else(|e| {
            debug!("config discovery failed: {}", e);
            FileConfig::default()
        }),
    };

    let config = file_config.apply_to(CheckConfig::default());
    let config = env_config.apply_to(config);
    Ok(apply_cli_args_to_config(config, args))
}

/// Apply CLI arguments to config (highest precedence).
///
/// Only flags the user actually passed override lower layers.
fn apply_cli_args_to_config(mut config: CheckConfig, args: &Args) -> CheckConfig {
    if let Some(ms) = args.timeout {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(parallel) = args.parallel {
        config = config.with_parallelism(parallel);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(networks) = &args.networks {
        config.networks_file = Some(networks.clone());
    }
    config
}
