//! Retrieval of the discovery document and construction of the API docs
//! artifact, falling back to the declared models when retrieval fails.

use reqwest::Client;
use sync_core::{build_api_docs, ApiDocs, DiscoveryDocument};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};

/// Where to fetch the discovery document from.
#[derive(Debug, Clone)]
pub struct DiscoverySource {
    pub url: String,
    pub version: String,
    pub api_key: Option<String>,
}

impl From<&SyncConfig> for DiscoverySource {
    fn from(config: &SyncConfig) -> Self {
        Self {
            url: config.discovery_url.clone(),
            version: config.api_version.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// The artifact together with how it was obtained.
#[derive(Debug)]
pub enum Discovery {
    Live(ApiDocs),
    Fallback { docs: ApiDocs, reason: Error },
}

impl Discovery {
    pub fn docs(&self) -> &ApiDocs {
        match self {
            Self::Live(docs) | Self::Fallback { docs, .. } => docs,
        }
    }

    pub fn into_docs(self) -> ApiDocs {
        match self {
            Self::Live(docs) | Self::Fallback { docs, .. } => docs,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// GETs `{url}?version={version}&key={api_key}` and parses the body.
pub async fn fetch_discovery(client: &Client, source: &DiscoverySource) -> Result<DiscoveryDocument> {
    info!(url = %source.url, version = %source.version, "Fetching API discovery document");

    let mut request = client
        .get(&source.url)
        .query(&[("version", source.version.as_str())]);
    if let Some(key) = &source.api_key {
        request = request.query(&[("key", key.as_str())]);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status(status));
    }

    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Builds the artifact from the live document, or from the declared models
/// alone when the fetch fails for any reason.
pub async fn discover(client: &Client, config: &SyncConfig) -> Discovery {
    let source = DiscoverySource::from(config);
    if source.api_key.is_none() {
        warn!("No API key configured; the discovery request is sent without one");
    }

    match fetch_discovery(client, &source).await {
        Ok(doc) => {
            let docs = build_api_docs(
                &doc,
                config.declared_models(),
                &config.capability_rules,
                &config.headers,
            );
            info!(
                models = docs.models.len(),
                endpoints = docs.endpoint_count(),
                "Built API docs from discovery document"
            );
            Discovery::Live(docs)
        }
        Err(reason) => {
            warn!(error = %reason, "Error fetching API documentation, using fallback");
            Discovery::Fallback {
                docs: ApiDocs::fallback(config.declared_models()),
                reason,
            }
        }
    }
}
