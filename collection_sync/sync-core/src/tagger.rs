//! Assigns endpoints to the declared models.
//!
//! The assignment is a path heuristic: an endpoint belongs to a model when its
//! path contains a rule's marker and the model declares the rule's capability.
//! It over- and under-matches by nature; callers treat it as an approximation.

use serde::{Deserialize, Serialize};

use crate::{EndpointDescriptor, Model};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRule {
    /// Substring looked for in the endpoint path.
    pub marker: String,
    pub capability: String,
}

impl CapabilityRule {
    pub fn new(marker: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            capability: capability.into(),
        }
    }

    pub fn matches(&self, endpoint: &EndpointDescriptor, model: &Model) -> bool {
        endpoint.path.contains(&self.marker) && model.has_capability(&self.capability)
    }
}

pub fn default_rules() -> Vec<CapabilityRule> {
    vec![
        CapabilityRule::new("generateContent", "text"),
        CapabilityRule::new("generateImage", "image-generation"),
        CapabilityRule::new("chat", "chat"),
        CapabilityRule::new("embedContent", "text"),
    ]
}

/// Rebuilds every model's endpoint list from scratch.
///
/// Lists are cleared first, so tagging the same input twice gives the same result.
pub fn tag_endpoints(
    endpoints: &[EndpointDescriptor],
    models: &mut [Model],
    rules: &[CapabilityRule],
) {
    for model in models.iter_mut() {
        model.endpoints.clear();
    }

    for endpoint in endpoints {
        for model in models.iter_mut() {
            if rules.iter().any(|rule| rule.matches(endpoint, model)) {
                model.endpoints.push(endpoint.clone());
            }
        }
    }
}
