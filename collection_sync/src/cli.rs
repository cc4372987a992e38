//! Command-line surface of the `collection-sync` binary.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::sync::{self, SyncSummary};

/// Keeps Postman collections in step with the Gemini API discovery document.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file. Built-in defaults apply when omitted.
    #[arg(short, long, global = true, env = "COLLECTION_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// API key sent with the discovery request.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path of the API docs artifact.
    #[arg(long, global = true)]
    pub docs: Option<PathBuf>,

    /// Directory holding the Postman collections.
    #[arg(long, global = true)]
    pub collections_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub discovery_url: Option<String>,

    #[arg(long, global = true)]
    pub api_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Fetches the discovery document and writes the API docs artifact.
    Fetch,
    /// Reconciles every collection against the API docs artifact.
    Update,
    /// Runs `fetch`, then `update`.
    Sync,
}

impl Cli {
    /// Loads the config file and applies the flags on top of it.
    pub fn load_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::load(self.config.as_deref()).context("Failed to load config")?;

        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(docs) = &self.docs {
            config.docs_path = docs.clone();
        }
        if let Some(dir) = &self.collections_dir {
            config.collections_dir = dir.clone();
        }
        if let Some(url) = &self.discovery_url {
            config.discovery_url = url.clone();
        }
        if let Some(version) = &self.api_version {
            config.api_version = version.clone();
        }
        Ok(config)
    }
}

/// Runs the parsed command. The exit code is non-zero when any collection
/// failed to update.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let client = Client::new();

    match cli.command {
        Commands::Fetch => {
            fetch(&client, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Update => update(&config),
        Commands::Sync => {
            fetch(&client, &config).await?;
            update(&config)
        }
    }
}

async fn fetch(client: &Client, config: &SyncConfig) -> Result<()> {
    let discovery = sync::fetch_step(client, config)
        .await
        .context("Failed to save API documentation")?;
    if discovery.is_fallback() {
        info!("Wrote fallback API documentation without endpoints");
    }
    Ok(())
}

fn update(config: &SyncConfig) -> Result<ExitCode> {
    let summary = sync::update_step(config, Utc::now()).context("Failed to update collections")?;
    Ok(report(&summary))
}

fn report(summary: &SyncSummary) -> ExitCode {
    if summary.has_failures() {
        error!("Collection update finished with failures: {summary}");
        ExitCode::FAILURE
    } else {
        info!("Collection update finished: {summary}");
        ExitCode::SUCCESS
    }
}
