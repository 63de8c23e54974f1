//! CLI entry point for the WebDAV benchmark.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use davbench_core::{WebDavClient, payload, run_suite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{load_default_file_config, resolve_settings};
use cli::Args;
use progress::{ConsoleReporter, render_table};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let loaded = load_default_file_config()?;
    if let Some(path) = loaded.config.as_ref().and(loaded.path.as_deref()) {
        debug!(path = %path.display(), "loaded config file");
    }
    let settings = resolve_settings(&args, loaded.config.as_ref())?;
    debug!(suite = ?settings.suite, "resolved run settings");

    payload::warm_up();
    let client = WebDavClient::new(settings.client)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling benchmark");
            ctrl_c_token.cancel();
        }
    });

    info!(url = %client.base_url(), user = client.username(), "Benchmark starting");

    let reporter = ConsoleReporter::new(!args.quiet && !args.json);
    let report = run_suite(client, &settings.suite, cancel.clone(), &reporter).await;
    reporter.finish();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !args.quiet {
        print!("{}", render_table(&report));
    }

    info!(
        scenarios = report.scenarios().count(),
        errors = report.error_count(),
        completed = report.completed,
        "Benchmark complete"
    );

    // Per-transfer errors are part of the report; only a suite that could not
    // start fails the process.
    if report.error.is_some() && !cancel.is_cancelled() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
