//! `collection-sync`: regenerates the API docs artifact and reconciles the
//! Postman collections against it.

use anyhow::Result;
use clap::Parser;
use collection_sync::cli::{self, Cli};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run(Cli::parse()).await
}
