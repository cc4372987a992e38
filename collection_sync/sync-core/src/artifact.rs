//! The API docs artifact: discovery metadata plus the declared models, each
//! carrying the endpoints tagged onto it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::discovery::{DiscoveryDocument, Extractor};
use crate::error::{Error, Result};
use crate::tagger::{tag_endpoints, CapabilityRule};
use crate::{HeaderSpec, Model};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDocs {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    pub models: Vec<Model>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Map<String, Value>>,
}

impl ApiDocs {
    /// The document used when the discovery document cannot be fetched: the
    /// declared models, none of them with endpoints.
    pub fn fallback(mut models: Vec<Model>) -> Self {
        for model in &mut models {
            model.endpoints.clear();
        }
        Self {
            title: "Gemini API".to_string(),
            version: "v1beta".to_string(),
            description: "Gemini API for language and multimodal models".to_string(),
            base_path: "/v1beta".to_string(),
            doc_link: None,
            models,
            schemas: None,
        }
    }

    pub fn model(&self, name: &str) -> Result<&Model> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn endpoint_count(&self) -> usize {
        self.models.iter().map(|m| m.endpoints.len()).sum()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The three models every run declares unless configured otherwise.
pub fn baseline_models() -> Vec<Model> {
    vec![
        Model::new(
            "gemini-1.5-pro-latest",
            "Latest version of Gemini 1.5 Pro",
            8192,
            &["text", "code", "chat", "function-calling"],
        ),
        Model::new(
            "gemini-1.5-flash-latest",
            "Latest version of Gemini 1.5 Flash",
            8192,
            &["text", "code", "chat", "function-calling"],
        ),
        Model::new(
            "gemini-2.0-flash-exp-image-generation",
            "Experimental Gemini 2.0 Flash model for image generation",
            4096,
            &["text", "image-generation"],
        ),
    ]
}

/// Extracts every endpoint of `doc` and tags them onto `models`.
pub fn build_api_docs(
    doc: &DiscoveryDocument,
    mut models: Vec<Model>,
    rules: &[CapabilityRule],
    headers: &[HeaderSpec],
) -> ApiDocs {
    let endpoints = Extractor::new(doc.base_path())
        .schemas(doc.schemas.as_ref())
        .headers(headers)
        .extract(&doc.resources);
    tag_endpoints(&endpoints, &mut models, rules);

    ApiDocs {
        title: doc.title.clone().unwrap_or_default(),
        version: doc.version.clone().unwrap_or_default(),
        description: doc.description.clone().unwrap_or_default(),
        base_path: doc.base_path().to_string(),
        doc_link: doc.documentation_link.clone(),
        models,
        schemas: doc.schemas.clone(),
    }
}
