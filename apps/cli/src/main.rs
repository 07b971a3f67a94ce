//! Smoke-test runner for a live ride-hailing server.
//!
//! Runs a fixed list of end-to-end cases, prints a Markdown results table and
//! optionally writes it to a file. Exits non-zero when any case fails.

mod client;
mod report;
mod scenarios;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::report::{CaseResult, Report};

#[derive(Parser)]
#[command(
    name = "ridehail-smoke",
    about = "Smoke-test a running ride-hailing server and report the results",
    version
)]
struct Cli {
    /// Server root, without the API prefix.
    #[arg(long, default_value = "http://localhost:5000")]
    base_url: String,
    /// API prefix the server was configured with.
    #[arg(long, default_value = "/api/v1")]
    prefix: String,
    /// Also write the Markdown report to this file.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api = ApiClient::new(&cli.base_url, &cli.prefix, Duration::from_secs(cli.timeout))
        .context("Failed to build HTTP client")?;

    tracing::info!(base_url = %cli.base_url, "Running smoke tests");
    let mut report = Report::new(&cli.base_url);
    for case in scenarios::all() {
        let started = Instant::now();
        let outcome = (case.run)(&api).await;
        let elapsed = started.elapsed();
        match &outcome {
            Ok(_) => tracing::info!(case = case.name, ?elapsed, "passed"),
            Err(e) => tracing::warn!(case = case.name, ?elapsed, error = %e, "failed"),
        }
        report.push(CaseResult {
            name: case.name,
            group: case.group,
            outcome: outcome.map_err(|e| format!("{e:#}")),
            duration: elapsed,
        });
    }

    let markdown = report.to_markdown();
    println!("{markdown}");
    if let Some(path) = &cli.report {
        std::fs::write(path, &markdown)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Report written");
    }

    let failed = report.failed();
    if failed > 0 {
        tracing::error!(failed, total = report.len(), "Smoke tests failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
