//! kapacitor-unit: run TICKscript unit tests against live Kapacitor and InfluxDB

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use kapacitor_unit::config::{DEFAULT_CALL_TIMEOUT, DEFAULT_INFLUXDB_URL, DEFAULT_KAPACITOR_URL};
use kapacitor_unit::report::render_summary;
use kapacitor_unit::{InfluxDbClient, KapacitorClient, RunOptions, Runner, TestSuite};

/// Unit tests for Kapacitor TICKscripts
#[derive(Parser, Debug)]
#[command(name = "kapacitor-unit")]
#[command(about = "Run TICKscript unit tests against Kapacitor and InfluxDB", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML file with the test definitions
    #[arg(long)]
    tests: PathBuf,

    /// Directory containing the TICKscripts
    #[arg(long, default_value = "./")]
    dir: PathBuf,

    /// Kapacitor base URL
    #[arg(long, env = "KAPACITOR_URL", default_value = DEFAULT_KAPACITOR_URL)]
    kapacitor: String,

    /// InfluxDB base URL
    #[arg(long, env = "INFLUXDB_URL", default_value = DEFAULT_INFLUXDB_URL)]
    influxdb: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CALL_TIMEOUT.as_secs())]
    timeout: u64,

    /// How long batch tests wait before reading alert counts (e.g. 3s, 500ms, 0s)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "3s")]
    batch_grace: Duration,

    /// Also write the suite report as JSON to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable coloured output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    /// A zero `--batch-grace` is honoured: batch results are read immediately.
    fn run_options(&self, cancel: CancellationToken) -> RunOptions {
        RunOptions {
            call_timeout: Duration::from_secs(self.timeout),
            batch_grace: self.batch_grace,
            cancel,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let suite = TestSuite::load(&cli.tests)
        .with_context(|| format!("Failed to load tests from {}", cli.tests.display()))?;

    let options = cli.run_options(CancellationToken::new());
    let call_timeout = options.call_timeout;
    let kapacitor = KapacitorClient::new(&cli.kapacitor, call_timeout)
        .context("Failed to build Kapacitor client")?;
    let influxdb = InfluxDbClient::new(&cli.influxdb, call_timeout)
        .context("Failed to build InfluxDB client")?;

    tokio::spawn(handle_ctrl_c(options.cancel.clone()));

    let runner = Runner::new(&kapacitor, &influxdb, options);
    let report = runner.run_suite(&suite, &cli.dir).await;

    println!("{}", render_summary(&report));

    if let Some(path) = &cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// First Ctrl+C cancels the running test (its cleanup still runs).
/// A second Ctrl+C exits immediately.
async fn handle_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    eprintln!("\nReceived Ctrl+C, cleaning up the current test...");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("\nReceived second Ctrl+C, aborting immediately.");
        std::process::exit(1);
    }
}
