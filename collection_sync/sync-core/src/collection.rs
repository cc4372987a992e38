//! Typed Postman collection tree.
//!
//! Only the fields the reconciler reads or writes are modelled. Every other key
//! is captured in an `extra` map at its level and written back untouched.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub info: CollectionInfo,
    #[serde(default)]
    pub item: Vec<CollectionItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Collection {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// A node of the item tree: a folder XOR a request leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionItem {
    Folder(Folder),
    Request(RequestItem),
}

impl CollectionItem {
    pub fn name(&self) -> &str {
        let name = match self {
            Self::Folder(folder) => &folder.name,
            Self::Request(leaf) => &leaf.name,
        };
        name.as_deref().unwrap_or("")
    }
}

impl<'de> Deserialize<'de> for CollectionItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(map) = &value else {
            return Err(de::Error::custom("collection item must be a JSON object"));
        };

        if map.contains_key("item") {
            serde_json::from_value(value)
                .map(Self::Folder)
                .map_err(de::Error::custom)
        } else if map.contains_key("request") {
            serde_json::from_value(value)
                .map(Self::Request)
                .map_err(de::Error::custom)
        } else {
            let name = map.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
            Err(de::Error::custom(format!(
                "collection item `{name}` has neither `item` nor `request`"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub item: Vec<CollectionItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Vec<Event>>,
    pub request: RequestEntry,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Postman accepts a request either as an object or as a bare URL string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestEntry {
    Detailed(Request),
    Url(String),
}

impl RequestEntry {
    pub fn raw_url(&self) -> &str {
        match self {
            Self::Detailed(request) => request.raw_url(),
            Self::Url(url) => url,
        }
    }

    pub fn detailed(&self) -> Option<&Request> {
        match self {
            Self::Detailed(request) => Some(request),
            Self::Url(_) => None,
        }
    }
}

impl Default for RequestEntry {
    fn default() -> Self {
        Self::Detailed(Request::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<Header>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    /// A plain string or a `{content, type}` object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Request {
    pub fn raw_url(&self) -> &str {
        self.url.as_ref().and_then(Url::raw).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Body {
    /// `mode: raw` with `options.raw.language: json`.
    pub fn is_raw_json(&self) -> bool {
        let language = self
            .options
            .as_ref()
            .and_then(|o| o.pointer("/raw/language"))
            .and_then(Value::as_str);
        self.mode.as_deref() == Some("raw") && language == Some("json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Url {
    Raw(String),
    Detailed(UrlParts),
}

impl Url {
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Raw(raw) => Some(raw),
            Self::Detailed(parts) => parts.raw.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlParts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub listen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<Exec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Postman accepts a script body either as lines or as one string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exec {
    Lines(Vec<String>),
    Text(String),
}

impl Exec {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Lines(lines) => lines.clone(),
            Self::Text(text) => text.lines().map(str::to_string).collect(),
        }
    }
}
