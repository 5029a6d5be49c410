//! CLI configuration.
//!
//! ```text
//! Cli
//! ├── object: ObjectArgs          # the stored object to confirm
//! ├── uploader: UploaderConfig    # endpoints, confirmation options
//! └── http: ReqwestConfig         # confirmation timeout, AJAX marker, user agent
//! ```

use std::process;

use anyhow::{Context, anyhow};
use cirrus_reqwest::ReqwestConfig;
use cirrus_upload::UploaderConfig;
use clap::{Args, Parser};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "cirrus")]
#[command(about = "Replays the completion confirmation of a stored object")]
#[command(version)]
pub struct Cli {
    /// The stored object to confirm.
    #[clap(flatten)]
    pub object: ObjectArgs,

    /// Upload session configuration.
    #[clap(flatten)]
    pub uploader: UploaderConfig,

    /// HTTP client configuration.
    #[clap(flatten)]
    pub http: ReqwestConfig,
}

/// The object whose confirmation is replayed.
#[derive(Debug, Clone, Args)]
pub struct ObjectArgs {
    /// Storage key of the object
    #[arg(long, env = "OBJECT_KEY")]
    pub key: String,

    /// UUID the object was uploaded under
    #[arg(long, env = "OBJECT_UUID")]
    pub uuid: Uuid,

    /// Original filename
    #[arg(long, env = "OBJECT_NAME")]
    pub name: String,

    /// Extra confirmation parameter as `name=value`; repeatable
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Automatic replays allowed after a rejected confirmation
    #[arg(long, env = "CONFIRM_RETRIES", default_value_t = 0)]
    pub retries: u32,

    /// Seconds to wait before each replay
    #[arg(long, env = "CONFIRM_RETRY_DELAY", default_value_t = 1)]
    pub retry_delay: u64,
}

/// Parses a `name=value` pair.
fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected name=value, got `{raw}`")),
    }
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        let mut cli = Self::parse();
        cli.apply_params();
        cli
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Copies `--param` pairs into the confirmation parameters.
    fn apply_params(&mut self) {
        let params = &mut self.uploader.upload_success.params;
        for (name, value) in &self.object.params {
            params.insert(name.clone(), Value::String(value.clone()));
        }
    }

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.uploader
            .validate()
            .context("invalid uploader configuration")?;

        if self.uploader.upload_success.endpoint.is_none() {
            return Err(anyhow!(
                "no confirmation endpoint configured, pass --success-endpoint"
            ));
        }

        if self.object.key.trim().is_empty() {
            return Err(anyhow!("object key cannot be empty"));
        }

        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            endpoint = %self.uploader.request.endpoint,
            success_endpoint = ?self.uploader.upload_success.endpoint,
            cors = self.uploader.upload_success.cors.expected,
            params = self.uploader.upload_success.params.len(),
            confirmation_timeout_secs = self.http.timeout().as_secs(),
            send_credentials = self.uploader.upload_success.cors.send_credentials,
            retries = self.object.retries,
            "Confirmation configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
