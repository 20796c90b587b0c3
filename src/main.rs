// This is the entry point of the CSV uploader.
//
// **Architecture Overview:**
// - `core/` = Upload logic (selector resolution, batch building, worksheet handling)
// - `infra/` = Implementations of core traits (Google auth, Google Sheets API)
// - `cli/` = Command line arguments and the run configuration
//
// This file's job is to:
// 1. Load configuration
// 2. Resolve the upload tasks
// 3. Wire the auth provider and spreadsheet backend into the upload service
// 4. Turn any failure into a message and a non-zero exit code

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a handful of mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, UploadConfig};
use crate::core::batch::BatchBuilder;
use crate::core::selectors::resolve_arguments;
use crate::core::upload::{plan_uploads, UploadOutcome, UploadReport, UploadService};
use crate::infra::google_auth::{GoogleAuth, SPREADSHEETS_SCOPE};
use crate::infra::google_sheets::SheetsApiClient;

async fn run(config: UploadConfig) -> anyhow::Result<()> {
    let tasks = resolve_arguments(&config.files, config.name_by_filename)?;
    for task in &tasks {
        tracing::debug!(file = %task.path.display(), worksheet = %task.selector, "Resolved task");
    }

    let builder = BatchBuilder::new(config.delimiter);

    if config.dry_run {
        let reports = plan_uploads(&builder, &tasks).await?;
        log_summary(&reports);
        return Ok(());
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let http = reqwest::Client::builder()
        .user_agent(concat!("upload-to-sheets/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let auth = GoogleAuth::from_secrets_file(
        &config.secrets_path,
        &config.token_cache_path,
        SPREADSHEETS_SCOPE,
        http.clone(),
    )
    .await?;

    let backend = SheetsApiClient::new(http, auth, &config.spreadsheet_id, config.value_input);
    let service = UploadService::new(backend, builder);

    tracing::info!(
        spreadsheet = %config.spreadsheet_id,
        files = tasks.len(),
        "Starting upload"
    );
    let reports = service.upload_all(&tasks).await?;
    log_summary(&reports);

    Ok(())
}

fn log_summary(reports: &[UploadReport]) {
    let uploaded = reports
        .iter()
        .filter(|r| matches!(r.outcome, UploadOutcome::Uploaded { .. }))
        .count();
    let skipped = reports
        .iter()
        .filter(|r| r.outcome == UploadOutcome::SkippedEmpty)
        .count();
    let planned = reports.len() - uploaded - skipped;

    tracing::info!(uploaded, skipped, planned, "Done");
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (if it exists) before clap reads them
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let home_dir = dirs::home_dir();

    let result = match UploadConfig::from_cli(cli, home_dir.as_deref()) {
        Ok(config) => run(config).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
