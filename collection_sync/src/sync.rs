//! The `fetch` and `update` steps, and the per-collection outcomes of an
//! update run.
//!
//! Collections are processed one at a time. A collection that cannot be
//! updated is recorded as failed and the run moves on to the next file.

use chrono::{DateTime, Utc};
use reqwest::Client;
use std::fmt;
use std::path::Path;
use sync_core::{reconcile_collection, ApiDocs, ReconcileOptions, ReconcileReport};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::fetch::{discover, Discovery};
use crate::store;

/// Fetches the discovery document (or falls back) and writes the artifact.
pub async fn fetch_step(client: &Client, config: &SyncConfig) -> Result<Discovery> {
    let discovery = discover(client, config).await;
    store::write_api_docs(&config.docs_path, discovery.docs())?;
    info!(path = %config.docs_path.display(), "API documentation saved");
    Ok(discovery)
}

/// Reads the artifact from `config.docs_path` and reconciles every collection.
pub fn update_step(config: &SyncConfig, now: DateTime<Utc>) -> Result<SyncSummary> {
    let docs = store::read_api_docs(&config.docs_path)?;
    update_collections(&docs, config, now)
}

/// Reconciles every collection in `config.collections_dir` against `docs`.
///
/// Only a failure to list the directory aborts the run.
pub fn update_collections(
    docs: &ApiDocs,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<SyncSummary> {
    let files = store::collection_files(&config.collections_dir)?;
    info!("Found {} collection files to update", files.len());

    let mut summary = SyncSummary::default();
    for path in files {
        let outcome = update_one(&path, docs, config, now);
        match &outcome.status {
            Status::Updated { model, report } => info!(
                collection = %outcome.file,
                matched = report.matched,
                requests = report.requests,
                "Updated collection: {} with model: {}",
                outcome.file,
                model
            ),
            Status::Skipped => warn!(
                collection = %outcome.file,
                "No model mapping found for {}, skipping", outcome.file
            ),
            Status::Failed(err) => warn!(
                collection = %outcome.file,
                error = %err,
                "Failed to update collection"
            ),
        }
        summary.outcomes.push(outcome);
    }
    Ok(summary)
}

fn update_one(path: &Path, docs: &ApiDocs, config: &SyncConfig, now: DateTime<Utc>) -> Outcome {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let status = match config.model_for(&file) {
        None => Status::Skipped,
        Some(model) => match reconcile_file(path, &file, docs, model, config, now) {
            Ok(report) => Status::Updated {
                model: model.to_string(),
                report,
            },
            Err(err) => Status::Failed(err),
        },
    };
    Outcome { file, status }
}

fn reconcile_file(
    path: &Path,
    file: &str,
    docs: &ApiDocs,
    model_name: &str,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport> {
    let model = docs.model(model_name)?;
    let mut collection = store::read_collection(path)?;

    let options = ReconcileOptions {
        script_mode: config.script_mode,
        match_path_templates: config.match_path_templates,
    };
    let report = reconcile_collection(&mut collection, &model.endpoints, &model.name, now, options);
    for warning in &report.warnings {
        warn!(collection = %file, "{warning}");
    }

    store::write_collection(path, &collection)?;
    Ok(report)
}

#[derive(Debug)]
pub struct Outcome {
    pub file: String,
    pub status: Status,
}

#[derive(Debug)]
pub enum Status {
    Updated { model: String, report: ReconcileReport },
    /// No model is mapped to the file; it was not touched.
    Skipped,
    /// The file was not written.
    Failed(Error),
}

#[derive(Debug, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<Outcome>,
}

impl SyncSummary {
    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, Status::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, Status::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, Status::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn outcome(&self, file: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.file == file)
    }

    fn count(&self, pred: impl Fn(&Status) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} skipped, {} failed",
            self.updated(),
            self.skipped(),
            self.failed()
        )
    }
}
