#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod engine;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use cirrus_core::{CompletionOutcome, SessionData, UploadResult};
use cirrus_reqwest::ReqwestClient;
use cirrus_upload::S3UploadManager;

use crate::config::Cli;
use crate::engine::ReplayEngine;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "cirrus_cli::startup";
pub const TRACING_TARGET_CONFIG: &str = "cirrus_cli::config";
pub const TRACING_TARGET_REPLAY: &str = "cirrus_cli::replay";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_STARTUP,
            error = %error,
            "confirmation replay failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let client = ReqwestClient::new(cli.http.clone()).context("failed to create HTTP client")?;
    let engine = Arc::new(ReplayEngine::new(cli.object.retries));
    let manager = S3UploadManager::builder(
        cli.uploader.clone(),
        engine.clone(),
        client.into_service(),
    )
    .build()
    .context("failed to create upload manager")?;

    let session = SessionData::new(cli.object.name.clone(), cli.object.uuid)
        .with_key(cli.object.key.clone());
    let id = manager
        .add_canned_file(&session)
        .context("failed to register the stored object")?;

    let delay = Duration::from_secs(cli.object.retry_delay);
    let mut outcome = manager
        .on_upload_complete(id, UploadResult::with_success(true))
        .await;

    while !outcome.is_terminal() {
        let Some(replay) = engine.take_replay() else {
            break;
        };

        tracing::info!(
            target: TRACING_TARGET_REPLAY,
            file_id = %id,
            delay_secs = delay.as_secs(),
            "Replaying rejected confirmation"
        );

        tokio::time::sleep(delay).await;
        outcome = replay().await;
    }

    let result = engine
        .result()
        .ok_or_else(|| anyhow!("no completion was reported"))?;
    let rendered =
        serde_json::to_string_pretty(result.as_map()).context("failed to render result")?;
    println!("{rendered}");

    if outcome != CompletionOutcome::Confirmed {
        return Err(anyhow!(
            "object was not confirmed: {}",
            result.error().unwrap_or(outcome.as_ref())
        ));
    }

    tracing::info!(
        target: TRACING_TARGET_REPLAY,
        file_id = %id,
        "Object confirmed"
    );

    Ok(())
}
