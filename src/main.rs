#![allow(clippy::result_large_err)]

use std::time::Duration;

use clap::Parser;
use miette::Diagnostic;
use miette::Result;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::outputter::CheckReport;
use crate::outputter::OutPutter;
use crate::parser::ConfigFormat;
use crate::parser::parse_endpoints;
use crate::runner::CheckOutcome;
use crate::runner::CheckSettings;
use crate::runner::HttpTransport;
use crate::runner::RunnerError;
use crate::runner::run_checks;
use crate::validator::EndpointSpec;
use crate::validator::ValidationError;
use crate::validator::Validator;

mod asserter;
mod cli;
mod outputter;
mod parser;
mod runner;
mod validator;

#[derive(Error, Debug, Diagnostic)]
pub enum VaktError {
    #[error("Failed to read config file: {0}")]
    #[diagnostic(help("point --path at the endpoint list"))]
    ConfigRead(std::io::Error),

    #[error("Failed to parse JSON config: {0}")]
    JsonParsing(serde_json::Error),

    #[error("Failed to parse TOML config: {0}")]
    TomlParsing(toml::de::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ConfigValidation(#[from] ValidationError),

    #[error("Failed to build the HTTP client: {0}")]
    HttpClient(reqwest::Error),

    #[error("Check pipeline stopped: {0}")]
    Pipeline(String),

    #[error("Failed to write the report: {0}")]
    Report(serde_json::Error),
}

/// Reads, decodes and validates the endpoint list at `path`.
///
/// Any error here is fatal: nothing has been requested yet and nothing will
/// be.
fn load_config(path: &str) -> Result<Vec<EndpointSpec>, VaktError> {
    let contents = std::fs::read_to_string(path).map_err(VaktError::ConfigRead)?;
    let entries = parse_endpoints(&contents, ConfigFormat::from_path(path))?;

    let specs = Validator::new(entries, &contents, path)
        .validate()
        .map_err(VaktError::ConfigValidation)?;

    debug!(path, endpoints = specs.len(), "config loaded");

    Ok(specs)
}

/// Diagnostics go to stderr, stdout only ever carries the JSON report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vakt=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Spawns the runner and the outputter, connected by an unbounded channel.
///
/// The runner checks one endpoint at a time, so outcomes reach the
/// outputter in config order.
fn run_pipeline_tasks(
    specs: Vec<EndpointSpec>,
    settings: CheckSettings,
    transport: HttpTransport,
    path: &str,
) -> (JoinHandle<Result<(), RunnerError>>, JoinHandle<CheckReport>) {
    let (runner_tx, outputter_rx) = flume::unbounded::<CheckOutcome>();
    let n_checks = specs.len();

    // Outputter Task
    let outputter_path = path.to_owned();
    let outputter_handle = tokio::spawn(async move {
        OutPutter::start(outputter_rx, &outputter_path, n_checks).await
    });

    // Runner Task
    let runner_handle =
        tokio::spawn(async move { run_checks(specs, settings, transport, runner_tx).await });

    (runner_handle, outputter_handle)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Everything that can abort the run happens before the first request.
    let specs = load_config(&cli.path)?;
    let settings = CheckSettings {
        ok_statuses: cli.ok_statuses.clone(),
        timeout: Duration::from_secs(cli.timeout),
    };
    let transport = HttpTransport::new(settings.timeout).map_err(VaktError::HttpClient)?;

    let (runner_handle, outputter_handle) =
        run_pipeline_tasks(specs, settings, transport, &cli.path);
    let (runner, report) = futures::join!(runner_handle, outputter_handle);

    runner
        .map_err(|e| VaktError::Pipeline(e.to_string()))?
        .map_err(|e| VaktError::Pipeline(e.to_string()))?;
    let report = report.map_err(|e| VaktError::Pipeline(e.to_string()))?;

    println!("{}", report.to_json(cli.pretty).map_err(VaktError::Report)?);

    Ok(())
}
