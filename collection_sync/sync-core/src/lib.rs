//! Core reconciliation pipeline for `collection_sync`.
//!
//! Flattens a discovery document into endpoint descriptors, tags them onto the
//! declared models, and merges them into Postman collections. Nothing in this
//! crate touches the network, the filesystem or the process environment.

pub mod artifact;
pub mod collection;
pub mod discovery;
pub mod error;
pub mod reconcile;
pub mod script;
pub mod tagger;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub use artifact::{baseline_models, build_api_docs, ApiDocs};
pub use collection::{Collection, CollectionItem, RequestEntry};
pub use discovery::{extract_endpoints, DiscoveryDocument, Extractor, Resource};
pub use error::{Error, Result};
pub use reconcile::{
    find_endpoint, reconcile_collection, BodyWarning, ReconcileOptions, ReconcileReport,
};
pub use script::ScriptMode;
pub use tagger::{default_rules, tag_endpoints, CapabilityRule};

// --- Shared Metadata Structs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    #[default]
    Query,
    Path,
    Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
    pub required: bool,
    pub location: ParamLocation,
    #[serde(
        rename = "defaultValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub status: u16,
    pub description: String,
    pub schema: Value,
}

/// A header an endpoint expects on every request sent to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSpec {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// One flattened API method. `(name, path)` identifies it, but the same pair
/// may show up more than once when nested resources repeat a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub name: String,
    pub path: String,
    pub description: String,
    pub http_method: String,
    pub parameters: Vec<Parameter>,
    pub responses: Vec<ResponseSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderSpec>,
}

impl EndpointDescriptor {
    /// The declared `200` response, if the method has one.
    pub fn success_response(&self) -> Option<&ResponseSpec> {
        self.responses.iter().find(|r| r.status == 200)
    }
}

/// A declared model. `endpoints` is filled by [`tag_endpoints`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    pub description: String,
    pub max_tokens: u32,
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDescriptor>,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        max_tokens: u32,
        capabilities: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            max_tokens,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            endpoints: Vec::new(),
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
