//! Run configuration.
//!
//! Every field has a built-in default describing the stock Gemini setup, so a
//! config file only needs the keys it wants to change:
//!
//! ```toml
//! collections_dir = "postman"
//! script_mode = "merge"
//!
//! [collections]
//! "Gemini Chat.postman_collection.json" = "gemini-1.5-flash-latest"
//!
//! [[headers]]
//! key = "x-goog-api-client"
//! value = "collection-sync"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use sync_core::{default_rules, CapabilityRule, HeaderSpec, Model, ScriptMode};

use crate::error::{Error, Result};

pub const DEFAULT_DISCOVERY_URL: &str =
    "https://generativelanguage.googleapis.com/$discovery/rest";
pub const DEFAULT_API_VERSION: &str = "v1beta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub discovery_url: String,
    pub api_version: String,
    /// Never read from or written to the config file; comes from the CLI or
    /// `GEMINI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Where the API docs artifact is written and read.
    pub docs_path: PathBuf,
    pub collections_dir: PathBuf,
    pub script_mode: ScriptMode,
    /// Let `{...}` placeholders in endpoint paths match any URL segment text.
    pub match_path_templates: bool,
    pub models: Vec<ModelConfig>,
    /// Collection file name to model name.
    pub collections: BTreeMap<String, String>,
    pub capability_rules: Vec<CapabilityRule>,
    /// Headers every extracted endpoint declares.
    pub headers: Vec<HeaderSpec>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
            docs_path: PathBuf::from("scripts/docs-data.json"),
            collections_dir: PathBuf::from("collections"),
            script_mode: ScriptMode::default(),
            match_path_templates: false,
            models: sync_core::baseline_models()
                .into_iter()
                .map(ModelConfig::from)
                .collect(),
            collections: default_collections(),
            capability_rules: default_rules(),
            headers: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Reads `path` as TOML, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn declared_models(&self) -> Vec<Model> {
        self.models.iter().cloned().map(Model::from).collect()
    }

    pub fn model_for(&self, collection_file: &str) -> Option<&str> {
        self.collections.get(collection_file).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl From<Model> for ModelConfig {
    fn from(model: Model) -> Self {
        Self {
            name: model.name,
            description: model.description,
            max_tokens: model.max_tokens,
            capabilities: model.capabilities.into_iter().collect(),
        }
    }
}

impl From<ModelConfig> for Model {
    fn from(config: ModelConfig) -> Self {
        Self {
            name: config.name,
            description: config.description,
            max_tokens: config.max_tokens,
            capabilities: config.capabilities.into_iter().collect(),
            endpoints: Vec::new(),
        }
    }
}

fn default_collections() -> BTreeMap<String, String> {
    [
        ("Gemini Chat.postman_collection.json", "gemini-2.0-flash-lite-001"),
        ("Gemini Code Generation.postman_collection.json", "gemini-2.0-flash-001"),
        ("Gemini Text Generation.postman_collection.json", "gemini-2.0-pro-exp"),
        ("Gemini Image Understanding.postman_collection.json", "gemini-1.5-pro-latest"),
        (
            "Gemini Image Generation.postman_collection.json",
            "gemini-2.0-flash-exp-image-generation",
        ),
    ]
    .into_iter()
    .map(|(file, model)| (file.to_string(), model.to_string()))
    .collect()
}
