//! Collection reconciler
//!
//! Walks a collection's item tree and, for every request leaf that matches one
//! of the model's endpoints, merges the endpoint's documentation, headers and
//! required body fields into it. Folder structure, unmatched leaves and any
//! field the merge does not name are left exactly as they were.
//!
//! # Matching
//!
//! A leaf matches an endpoint when its name contains the endpoint name, or its
//! raw URL contains the endpoint path (both case-insensitive). With
//! [`ReconcileOptions::match_path_templates`] set, path placeholders such as
//! `{+model}` match any text. When several endpoints match, the best one is
//! chosen by, in order:
//!
//! 1. match kind: name equal > name contained > path contained in URL,
//! 2. length of the matched text, longest first,
//! 3. position in the endpoint list, earliest first.

use std::cmp::Reverse;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::collection::{Body, Collection, CollectionItem, Header, Request, RequestEntry, RequestItem};
use crate::script::{self, ScriptMode};
use crate::{EndpointDescriptor, HeaderSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub script_mode: ScriptMode,
    /// Treat `{...}` segments of endpoint paths as wildcards when matching URLs.
    pub match_path_templates: bool,
}

/// A request whose JSON body could not be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyWarning {
    pub request: String,
    pub message: String,
}

impl fmt::Display for BodyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse JSON body for {}: {}", self.request, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Request leaves visited.
    pub requests: usize,
    pub matched: usize,
    pub scripts_updated: usize,
    pub warnings: Vec<BodyWarning>,
}

/// Stamps `info.lastUpdated` with `updated_at`, then reconciles every request
/// in the collection against `endpoints`.
pub fn reconcile_collection(
    collection: &mut Collection,
    endpoints: &[EndpointDescriptor],
    model_name: &str,
    updated_at: DateTime<Utc>,
    options: ReconcileOptions,
) -> ReconcileReport {
    collection.info.last_updated = Some(updated_at.to_rfc3339_opts(SecondsFormat::Millis, true));
    reconcile_items(&mut collection.item, endpoints, model_name, options)
}

/// Reconciles an item list in place, recursing into folders.
pub fn reconcile_items(
    items: &mut [CollectionItem],
    endpoints: &[EndpointDescriptor],
    model_name: &str,
    options: ReconcileOptions,
) -> ReconcileReport {
    let reconciler = Reconciler {
        endpoints,
        model_name,
        options,
    };
    let mut report = ReconcileReport::default();
    reconciler.walk(items, &mut report);
    report
}

struct Reconciler<'a> {
    endpoints: &'a [EndpointDescriptor],
    model_name: &'a str,
    options: ReconcileOptions,
}

impl Reconciler<'_> {
    fn walk(&self, items: &mut [CollectionItem], report: &mut ReconcileReport) {
        for item in items {
            match item {
                CollectionItem::Folder(folder) => self.walk(&mut folder.item, report),
                CollectionItem::Request(leaf) => self.reconcile_leaf(leaf, report),
            }
        }
    }

    fn reconcile_leaf(&self, leaf: &mut RequestItem, report: &mut ReconcileReport) {
        report.requests += 1;

        let name = leaf.name.as_deref().unwrap_or("");
        let Some(endpoint) = find_endpoint(
            name,
            leaf.request.raw_url(),
            self.endpoints,
            self.options.match_path_templates,
        ) else {
            return;
        };
        report.matched += 1;

        // A bare URL string has nothing to merge into; only the script applies.
        if let RequestEntry::Detailed(request) = &mut leaf.request {
            if let Err(message) = merge_request(request, endpoint, self.model_name) {
                report.warnings.push(BodyWarning {
                    request: leaf.name.clone().unwrap_or_default(),
                    message,
                });
            }
        }

        if script::update_test_script(leaf, endpoint, self.options.script_mode) {
            report.scripts_updated += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchKind {
    UrlPath,
    NameContains,
    NameExact,
}

/// Overwrites the description, merges headers and, for raw JSON bodies, the body.
/// Only a body that cannot be merged produces an error.
fn merge_request(
    request: &mut Request,
    endpoint: &EndpointDescriptor,
    model_name: &str,
) -> Result<(), String> {
    if !endpoint.description.is_empty() {
        request.description = Some(Value::String(endpoint.description.clone()));
    }
    merge_headers(request, &endpoint.headers);

    match request.body.as_mut().filter(|b| b.is_raw_json()) {
        Some(body) => merge_body(body, endpoint, model_name),
        None => Ok(()),
    }
}

/// Picks the endpoint a request implements, see the module docs for the ranking.
pub fn find_endpoint<'e>(
    name: &str,
    raw_url: &str,
    endpoints: &'e [EndpointDescriptor],
    path_templates: bool,
) -> Option<&'e EndpointDescriptor> {
    let name = name.to_lowercase();
    let url = raw_url.to_lowercase();

    endpoints
        .iter()
        .enumerate()
        .filter_map(|(index, endpoint)| {
            rank(&name, &url, endpoint, path_templates)
                .map(|(kind, len)| ((kind, len, Reverse(index)), endpoint))
        })
        .max_by_key(|(key, _)| *key)
        .map(|(_, endpoint)| endpoint)
}

fn rank(
    name: &str,
    url: &str,
    endpoint: &EndpointDescriptor,
    path_templates: bool,
) -> Option<(MatchKind, usize)> {
    let endpoint_name = endpoint.name.to_lowercase();
    if !endpoint_name.is_empty() {
        if name == endpoint_name {
            return Some((MatchKind::NameExact, endpoint_name.len()));
        }
        if name.contains(&endpoint_name) {
            return Some((MatchKind::NameContains, endpoint_name.len()));
        }
    }

    let path = endpoint.path.to_lowercase();
    if path_templates {
        contains_in_order(url, &path_literals(&path)).map(|len| (MatchKind::UrlPath, len))
    } else {
        (!path.is_empty() && url.contains(&path)).then(|| (MatchKind::UrlPath, path.len()))
    }
}

/// Literal fragments of a path template, e.g. `/v1/{+model}:embed` gives
/// `["/v1/", ":embed"]`.
fn path_literals(path: &str) -> Vec<&str> {
    let mut literals = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        literals.push(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    literals.push(rest);
    literals.retain(|l| !l.is_empty());
    literals
}

/// Total matched length when every literal occurs in `haystack`, in order.
fn contains_in_order(haystack: &str, literals: &[&str]) -> Option<usize> {
    if literals.is_empty() {
        return None;
    }
    let mut pos = 0;
    for literal in literals {
        pos += haystack[pos..].find(literal)? + literal.len();
    }
    Some(literals.iter().map(|l| l.len()).sum())
}

fn merge_headers(request: &mut Request, declared: &[HeaderSpec]) {
    if declared.is_empty() {
        return;
    }
    let headers = request.header.get_or_insert_with(Vec::new);
    for header in declared {
        let description = Some(Value::String(header.description.clone()));
        match headers.iter_mut().find(|h| h.key.eq_ignore_ascii_case(&header.key)) {
            Some(existing) => {
                existing.value = header.value.clone();
                existing.description = description;
            }
            None => {
                let mut extra = Map::new();
                extra.insert("type".to_string(), Value::String("text".to_string()));
                headers.push(Header {
                    key: header.key.clone(),
                    value: header.value.clone(),
                    description,
                    extra,
                });
            }
        }
    }
}

/// Adds missing required parameters, sets `model` and re-serializes the body.
fn merge_body(body: &mut Body, endpoint: &EndpointDescriptor, model_name: &str) -> Result<(), String> {
    let mut parsed: Value =
        serde_json::from_str(body.raw.as_deref().unwrap_or("")).map_err(|e| e.to_string())?;
    let Some(fields) = parsed.as_object_mut() else {
        return Err("body is not a JSON object".to_string());
    };

    for param in endpoint.parameters.iter().filter(|p| p.required) {
        if !fields.contains_key(&param.name) {
            let default = param.default.clone().unwrap_or_default();
            fields.insert(param.name.clone(), Value::String(default));
        }
    }
    // After injection, so an injected `model` is already the mapped one.
    if let Some(model) = fields.get_mut("model") {
        *model = Value::String(model_name.to_string());
    }

    body.raw = Some(serde_json::to_string_pretty(&parsed).map_err(|e| e.to_string())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParamLocation, Parameter, ResponseSpec};
    use chrono::TimeZone;
    use serde_json::json;

    fn endpoint(name: &str, path: &str) -> EndpointDescriptor {
        EndpointDescriptor {
            name: name.to_string(),
            path: path.to_string(),
            description: String::new(),
            http_method: "POST".to_string(),
            parameters: Vec::new(),
            responses: Vec::new(),
            headers: Vec::new(),
        }
    }

    fn required_body_param(name: &str, default: Option<&str>) -> Parameter {
        Parameter {
            name: name.to_string(),
            type_name: "array".to_string(),
            description: String::new(),
            required: true,
            location: ParamLocation::Body,
            default: default.map(str::to_string),
        }
    }

    fn generate_content() -> EndpointDescriptor {
        let mut ep = endpoint("generateContent", "/v1beta/{+model}:generateContent");
        ep.description = "Generates a model response.".to_string();
        ep.parameters.push(required_body_param("contents", None));
        ep.responses.push(ResponseSpec {
            status: 200,
            description: "Successful response".to_string(),
            schema: json!({ "properties": { "candidates": {} } }),
        });
        ep.headers.push(HeaderSpec {
            key: "Content-Type".to_string(),
            value: "application/json".to_string(),
            description: "The request body is JSON.".to_string(),
        });
        ep
    }

    fn collection(body: &str) -> Collection {
        serde_json::from_value(json!({
            "info": { "name": "Gemini Chat" },
            "item": [{
                "name": "Folder",
                "item": [{
                    "name": "Ask a question (generateContent)",
                    "event": [{
                        "listen": "test",
                        "script": { "exec": ["pm.test(\"old\", function () {});"], "type": "text/javascript" }
                    }],
                    "request": {
                        "method": "POST",
                        "header": [
                            { "key": "content-type", "value": "text/plain", "type": "text" },
                            { "key": "X-Custom", "value": "keep-me", "type": "text" }
                        ],
                        "body": {
                            "mode": "raw",
                            "raw": body,
                            "options": { "raw": { "language": "json" } }
                        },
                        "url": { "raw": "{{baseUrl}}/v1beta/models/gemini-pro:generateContent?key={{key}}" }
                    }
                }]
            }, {
                "name": "Unrelated",
                "request": { "method": "GET", "url": "{{baseUrl}}/v1beta/files", "description": "manual" }
            }]
        }))
        .unwrap()
    }

    fn leaf(collection: &Collection, path: &[usize]) -> RequestItem {
        let mut items = &collection.item;
        for (depth, index) in path.iter().enumerate() {
            match &items[*index] {
                CollectionItem::Folder(folder) => items = &folder.item,
                CollectionItem::Request(leaf) if depth == path.len() - 1 => return leaf.clone(),
                CollectionItem::Request(_) => panic!("unexpected leaf"),
            }
        }
        panic!("path does not end at a leaf")
    }

    fn request_of(leaf: RequestItem) -> Request {
        match leaf.request {
            RequestEntry::Detailed(request) => request,
            RequestEntry::Url(url) => panic!("bare url request {url}"),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    fn body_of(leaf: &RequestItem) -> Value {
        let body = leaf.request.detailed().unwrap().body.as_ref().unwrap();
        serde_json::from_str(body.raw.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn stamps_last_updated_once() {
        let mut c = collection("{}");
        reconcile_collection(&mut c, &[], "m", now(), ReconcileOptions::default());
        assert_eq!(c.info.last_updated.as_deref(), Some("2026-10-19T08:30:00.000Z"));
    }

    #[test]
    fn body_model_is_replaced_and_missing_required_fields_added() {
        let mut c = collection(r#"{"model":"old-model"}"#);
        let report = reconcile_collection(
            &mut c,
            &[generate_content()],
            "gemini-1.5-pro-latest",
            now(),
            ReconcileOptions::default(),
        );

        assert_eq!(report.requests, 2);
        assert_eq!(report.matched, 1);
        assert!(report.warnings.is_empty());

        let updated = leaf(&c, &[0, 0]);
        assert_eq!(
            body_of(&updated),
            json!({ "model": "gemini-1.5-pro-latest", "contents": "" })
        );
        let raw = request_of(updated).body.unwrap().raw.unwrap();
        assert!(raw.find("\"model\"").unwrap() < raw.find("\"contents\"").unwrap());
    }

    #[test]
    fn existing_required_field_is_never_overwritten() {
        let mut ep = generate_content();
        ep.parameters[0].default = Some("fallback".to_string());
        let mut c = collection(r#"{"contents":[{"parts":[{"text":"hi"}]}]}"#);

        reconcile_collection(&mut c, &[ep], "m", now(), ReconcileOptions::default());

        let body = body_of(&leaf(&c, &[0, 0]));
        assert_eq!(body, json!({ "contents": [{ "parts": [{ "text": "hi" }] }] }));
    }

    #[test]
    fn missing_required_field_uses_declared_default() {
        let mut ep = generate_content();
        ep.parameters[0].default = Some("fallback".to_string());
        let mut c = collection("{}");

        reconcile_collection(&mut c, &[ep], "m", now(), ReconcileOptions::default());

        assert_eq!(body_of(&leaf(&c, &[0, 0])), json!({ "contents": "fallback" }));
    }

    #[test]
    fn body_without_model_field_does_not_gain_one() {
        let mut c = collection(r#"{"contents":[]}"#);
        reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());
        assert!(body_of(&leaf(&c, &[0, 0])).get("model").is_none());
    }

    #[test]
    fn invalid_body_is_reported_and_left_alone() {
        let mut c = collection("{ not json");
        let report =
            reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].request, "Ask a question (generateContent)");
        assert!(report.warnings[0]
            .to_string()
            .starts_with("Could not parse JSON body for Ask a question (generateContent)"));

        let untouched = request_of(leaf(&c, &[0, 0]));
        assert_eq!(untouched.body.unwrap().raw.as_deref(), Some("{ not json"));
        // the rest of the merge still applies
        assert_eq!(
            untouched.description,
            Some(json!("Generates a model response."))
        );
        assert_eq!(report.scripts_updated, 1);
    }

    #[test]
    fn non_object_body_is_reported() {
        let mut c = collection("[1, 2]");
        let report =
            reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());
        assert_eq!(report.warnings[0].message, "body is not a JSON object");
    }

    #[test]
    fn headers_are_overwritten_by_key_and_custom_ones_survive() {
        let mut c = collection("{}");
        reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());

        let headers = request_of(leaf(&c, &[0, 0])).header.unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].key, "content-type");
        assert_eq!(headers[0].value, "application/json");
        assert_eq!(headers[0].description, Some(json!("The request body is JSON.")));
        assert_eq!(headers[1].key, "X-Custom");
        assert_eq!(headers[1].value, "keep-me");
    }

    #[test]
    fn missing_headers_are_appended() {
        let mut ep = generate_content();
        ep.headers.push(HeaderSpec {
            key: "x-goog-api-key".to_string(),
            value: "{{GEMINI_API_KEY}}".to_string(),
            description: String::new(),
        });
        let mut c = collection("{}");
        reconcile_collection(&mut c, &[ep], "m", now(), ReconcileOptions::default());

        let headers = request_of(leaf(&c, &[0, 0])).header.unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[2].key, "x-goog-api-key");
        assert_eq!(headers[2].description, Some(json!("")));
        assert_eq!(headers[2].extra.get("type"), Some(&json!("text")));
    }

    #[test]
    fn unmatched_leaf_is_untouched() {
        let mut c = collection("{}");
        let before = leaf(&c, &[1]);
        reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());
        assert_eq!(leaf(&c, &[1]), before);
    }

    #[test]
    fn test_script_is_regenerated_from_response_schema() {
        let mut c = collection("{}");
        reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());

        let updated = leaf(&c, &[0, 0]);
        let exec = updated.event.unwrap()[0].script.clone().unwrap().exec.unwrap().lines();
        assert_eq!(exec, script::generate_assertions(&generate_content()));
        assert!(exec.iter().any(|l| l.contains("to.have.property(\"candidates\")")));
    }

    #[test]
    fn second_pass_is_identical_except_timestamp() {
        let mut c = collection(r#"{"model":"old-model","generationConfig":{"temperature":0.2}}"#);
        let endpoints = [generate_content()];
        reconcile_collection(&mut c, &endpoints, "m", now(), ReconcileOptions::default());
        let first = c.to_json().unwrap();

        reconcile_collection(&mut c, &endpoints, "m", now(), ReconcileOptions::default());
        assert_eq!(c.to_json().unwrap(), first);
    }

    #[test]
    fn second_pass_is_identical_with_required_model_path_parameter() {
        let mut ep = generate_content();
        ep.parameters.insert(
            0,
            Parameter {
                name: "model".to_string(),
                type_name: "string".to_string(),
                description: String::new(),
                required: true,
                location: ParamLocation::Path,
                default: None,
            },
        );
        let endpoints = [ep];
        let mut c = collection(r#"{"contents":[]}"#);

        reconcile_collection(&mut c, &endpoints, "gemini-1.5-pro-latest", now(), ReconcileOptions::default());
        let first = c.to_json().unwrap();
        assert_eq!(
            body_of(&leaf(&c, &[0, 0])),
            json!({ "contents": [], "model": "gemini-1.5-pro-latest" })
        );

        reconcile_collection(&mut c, &endpoints, "gemini-1.5-pro-latest", now(), ReconcileOptions::default());
        assert_eq!(c.to_json().unwrap(), first);
    }

    #[test]
    fn templated_path_matches_only_when_enabled() {
        let mut c = collection(r#"{"model":"old"}"#);
        let CollectionItem::Folder(folder) = &mut c.item[0] else {
            panic!("expected folder");
        };
        let CollectionItem::Request(ask) = &mut folder.item[0] else {
            panic!("expected request");
        };
        ask.name = Some("Ask a question".to_string());
        let before = c.clone();

        let report = reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());
        assert_eq!(report.matched, 0);
        assert_eq!(c.item, before.item);

        let options = ReconcileOptions {
            match_path_templates: true,
            ..ReconcileOptions::default()
        };
        let report = reconcile_collection(&mut c, &[generate_content()], "m", now(), options);
        assert_eq!(report.matched, 1);
        assert_eq!(body_of(&leaf(&c, &[0, 0])), json!({ "model": "m", "contents": "" }));
    }

    #[test]
    fn bare_url_request_gets_script_but_no_request_merge() {
        let mut c: Collection = serde_json::from_value(json!({
            "info": { "name": "Short" },
            "item": [{
                "name": "generateContent",
                "event": [{ "listen": "test", "script": { "exec": ["old"] } }],
                "request": "{{baseUrl}}/v1beta/models/x:generateContent"
            }]
        }))
        .unwrap();

        let report = reconcile_collection(&mut c, &[generate_content()], "m", now(), ReconcileOptions::default());
        assert_eq!(report.matched, 1);
        assert_eq!(report.scripts_updated, 1);

        let updated = leaf(&c, &[0]);
        assert_eq!(
            updated.request,
            RequestEntry::Url("{{baseUrl}}/v1beta/models/x:generateContent".to_string())
        );
    }

    #[test]
    fn find_prefers_exact_name_over_substring_and_url() {
        let endpoints = [
            endpoint("get", "/v1beta/{+name}"),
            endpoint("list", "/v1beta/models"),
            endpoint("models", "/v1beta/other"),
        ];
        let found = find_endpoint("Models", "{{baseUrl}}/v1beta/models", &endpoints, false).unwrap();
        assert_eq!(found.name, "models");
    }

    #[test]
    fn find_prefers_longer_name_among_substring_matches() {
        let endpoints = [
            endpoint("generate", "/a"),
            endpoint("streamGenerateContent", "/b"),
            endpoint("generateContent", "/c"),
        ];
        let found = find_endpoint("streamGenerateContent with tools", "", &endpoints, false).unwrap();
        assert_eq!(found.name, "streamGenerateContent");
    }

    #[test]
    fn find_prefers_longest_path_among_url_matches() {
        let endpoints = [
            endpoint("get", "/v1beta/{+name}"),
            endpoint("generateContent", "/v1beta/{+model}:generateContent"),
        ];
        let found = find_endpoint(
            "Ask",
            "{{baseUrl}}/v1beta/models/gemini-pro:generateContent",
            &endpoints,
            true,
        )
        .unwrap();
        assert_eq!(found.name, "generateContent");
    }

    #[test]
    fn find_uses_literal_path_containment_by_default() {
        let endpoints = [
            endpoint("generateContent", "/v1beta/{+model}:generateContent"),
            endpoint("list", "/v1beta/models"),
        ];
        let url = "{{baseUrl}}/v1beta/models/gemini-pro:generateContent";

        let found = find_endpoint("Ask", url, &endpoints, false).unwrap();
        assert_eq!(found.name, "list");

        let templated = [endpoint("generateContent", "/v1beta/{+model}:generateContent")];
        assert!(find_endpoint("Ask", url, &templated, false).is_none());
        assert!(find_endpoint("Ask", url, &templated, true).is_some());
    }

    #[test]
    fn find_breaks_remaining_ties_by_list_order() {
        let mut first = endpoint("generateContent", "/x");
        first.description = "first".to_string();
        let mut second = endpoint("generateContent", "/y");
        second.description = "second".to_string();

        let endpoints = [first, second];
        let found = find_endpoint("generateContent", "", &endpoints, false).unwrap();
        assert_eq!(found.description, "first");
    }

    #[test]
    fn find_returns_none_without_candidates() {
        let endpoints = [endpoint("embedContent", "/v1beta/{+model}:embedContent")];
        let url = "{{baseUrl}}/v1beta/files";
        assert!(find_endpoint("List files", url, &endpoints, false).is_none());
        assert!(find_endpoint("List files", url, &endpoints, true).is_none());
    }

    #[test]
    fn path_literals_split_on_placeholders() {
        assert_eq!(path_literals("/v1/{+model}:embed"), ["/v1/", ":embed"]);
        assert_eq!(path_literals("/v1/models"), ["/v1/models"]);
        assert!(path_literals("{name}").is_empty());
        assert_eq!(path_literals("/v1/{broken"), ["/v1/{broken"]);
    }
}
