use std::{path::Path, time::Duration};

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use metric_selector::{mask_api_key, Cli, Settings};
use selector::{sink, NerdGraphClient, OutputFiles};

fn main() -> Result<()> {
    // Must be taken while the process is still single-threaded.
    let started_at = sink::now();

    color_eyre::install()?;
    let _cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    tracing::info!("using API key: {}", mask_api_key(&settings.executor.api_key));
    println!("Account ID: {}", settings.audit.account_id);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to create Tokio runtime")?;
    let timestamp = sink::run_timestamp(started_at);
    let files = runtime.block_on(audit(settings, &timestamp))?;

    println!("Processing complete. Check the output files for details:");
    println!("  {}", files.used.display());
    println!("  {}", files.unused.display());
    Ok(())
}

async fn audit(settings: Settings, timestamp: &str) -> Result<OutputFiles> {
    let client = NerdGraphClient::new(&settings.executor)?;
    tracing::info!(endpoint = client.endpoint(), "client initialized");

    let progress = spinner();
    let run = selector::run(&client, &settings.audit);
    let result = match settings.run_timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| eyre!("audit did not finish within {}s", limit.as_secs()))?,
        None => run.await,
    };
    progress.finish_and_clear();
    let report = result.wrap_err("audit failed")?;

    let files = OutputFiles::new(Path::new("."), settings.audit.account_id, timestamp);
    report.write(&files)?;
    tracing::info!(
        used = report.usage.used_count(),
        unused = report.usage.len() - report.usage.used_count(),
        "audit complete"
    );
    Ok(files)
}

fn spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        progress.set_style(style);
    }
    progress.set_message("Auditing metrics...");
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}
