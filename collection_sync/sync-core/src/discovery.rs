//! Discovery document → flat endpoint list
//!
//! A discovery document nests `methods` inside `resources`, to any depth. The
//! [`Extractor`] walks that tree depth-first and emits one
//! [`EndpointDescriptor`] per method that declares a path.
//!
//! Extraction never fails. Fields with an unexpected shape are read as absent
//! and fall back to their defaults.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::{EndpointDescriptor, HeaderSpec, ParamLocation, Parameter, ResponseSpec};

const DEFAULT_TYPE: &str = "string";
const DEFAULT_HTTP_METHOD: &str = "POST";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub base_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub documentation_link: Option<String>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub resources: IndexMap<String, Resource>,
    #[serde(default, deserialize_with = "lenient")]
    pub schemas: Option<Map<String, Value>>,
}

impl DiscoveryDocument {
    pub fn base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resource {
    #[serde(default, deserialize_with = "lenient_entries")]
    pub methods: IndexMap<String, Method>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub resources: IndexMap<String, Resource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    #[serde(default, deserialize_with = "lenient")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub http_method: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub parameters: IndexMap<String, MethodParameter>,
    /// Request body schema, inline or as a `$ref` into the document's schemas.
    #[serde(default)]
    pub request: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodParameter {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub type_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub required: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

/// Reads a field, treating a value of the wrong shape as missing.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Reads a map entry by entry, dropping only the entries of the wrong shape.
/// A value that is not an object reads as an empty map.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(IndexMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| Some((key, serde_json::from_value(value).ok()?)))
        .collect())
}

/// Flattens a resource tree into endpoint descriptors.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    base_path: &'a str,
    schemas: Option<&'a Map<String, Value>>,
    headers: &'a [HeaderSpec],
}

impl<'a> Extractor<'a> {
    pub fn new(base_path: &'a str) -> Self {
        Self {
            base_path,
            schemas: None,
            headers: &[],
        }
    }

    /// Resolve `{"$ref": "Name"}` request and response schemas against this table.
    pub fn schemas(mut self, schemas: Option<&'a Map<String, Value>>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Headers declared on every extracted endpoint.
    pub fn headers(mut self, headers: &'a [HeaderSpec]) -> Self {
        self.headers = headers;
        self
    }

    pub fn extract(&self, resources: &IndexMap<String, Resource>) -> Vec<EndpointDescriptor> {
        let mut endpoints = Vec::new();
        self.collect(resources, &mut endpoints);
        endpoints
    }

    fn collect(&self, resources: &IndexMap<String, Resource>, out: &mut Vec<EndpointDescriptor>) {
        for resource in resources.values() {
            out.extend(
                resource
                    .methods
                    .iter()
                    .filter_map(|(name, method)| self.endpoint(name, method)),
            );
            self.collect(&resource.resources, out);
        }
    }

    fn endpoint(&self, name: &str, method: &Method) -> Option<EndpointDescriptor> {
        let path = method.path.as_deref().filter(|p| !p.is_empty())?;

        let mut parameters: Vec<Parameter> = method
            .parameters
            .iter()
            .map(|(param_name, param)| Parameter {
                name: param_name.clone(),
                type_name: param.type_name.clone().unwrap_or_else(|| DEFAULT_TYPE.to_string()),
                description: param.description.clone().unwrap_or_default(),
                required: param.required.unwrap_or(false),
                location: parse_location(param.location.as_deref()),
                default: param.default.as_ref().map(default_to_string),
            })
            .collect();

        let request = method.request.as_ref().map(|schema| self.resolve(schema));
        if let Some(body) = request {
            parameters.extend(body_parameters(body));
        }

        let responses = method
            .response
            .as_ref()
            .map(|schema| ResponseSpec {
                status: 200,
                description: "Successful response".to_string(),
                schema: self.resolve(schema).clone(),
            })
            .into_iter()
            .collect();

        Some(EndpointDescriptor {
            name: name.to_string(),
            path: format!("{}{}", self.base_path, path),
            description: method.description.clone().unwrap_or_default(),
            http_method: method
                .http_method
                .clone()
                .unwrap_or_else(|| DEFAULT_HTTP_METHOD.to_string()),
            parameters,
            responses,
            headers: self.declared_headers(request.is_some()),
        })
    }

    fn declared_headers(&self, has_body: bool) -> Vec<HeaderSpec> {
        let mut headers = Vec::new();
        if has_body {
            headers.push(HeaderSpec {
                key: "Content-Type".to_string(),
                value: "application/json".to_string(),
                description: "The request body is JSON.".to_string(),
            });
        }
        for header in self.headers {
            match headers
                .iter_mut()
                .find(|h| h.key.eq_ignore_ascii_case(&header.key))
            {
                Some(existing) => *existing = header.clone(),
                None => headers.push(header.clone()),
            }
        }
        headers
    }

    /// Follows a single `$ref` level; unknown references are returned unchanged.
    fn resolve<'v>(&'v self, schema: &'v Value) -> &'v Value {
        schema
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|name| self.schemas?.get(name))
            .unwrap_or(schema)
    }
}

/// Extract every endpoint under `resources`, prefixing paths with `base_path`.
pub fn extract_endpoints(
    resources: &IndexMap<String, Resource>,
    base_path: &str,
) -> Vec<EndpointDescriptor> {
    Extractor::new(base_path).extract(resources)
}

fn body_parameters(schema: &Value) -> Vec<Parameter> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| Parameter {
            name: name.clone(),
            type_name: prop
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_TYPE)
                .to_string(),
            description: prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            required: required.contains(&name.as_str()),
            location: ParamLocation::Body,
            default: prop.get("default").map(default_to_string),
        })
        .collect()
}

fn parse_location(location: Option<&str>) -> ParamLocation {
    match location {
        Some("path") => ParamLocation::Path,
        Some("body") => ParamLocation::Body,
        _ => ParamLocation::Query,
    }
}

fn default_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
