//! Regenerates the `test` script of a matched request from its endpoint's
//! declared success response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::{Exec, RequestItem};
use crate::EndpointDescriptor;

pub const BLOCK_BEGIN: &str = "// collection-sync:begin";
pub const BLOCK_END: &str = "// collection-sync:end";

/// How a regenerated script treats the lines already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptMode {
    /// The script becomes exactly the generated assertions.
    #[default]
    Replace,
    /// Only the block between [`BLOCK_BEGIN`] and [`BLOCK_END`] is rewritten.
    Merge,
}

/// Assertions for `endpoint`: status 200, a JSON object body, then one
/// `to.have.property` check per property of the 200 response schema.
pub fn generate_assertions(endpoint: &EndpointDescriptor) -> Vec<String> {
    let mut lines: Vec<String> = [
        "pm.test(\"Status code is 200\", function () {",
        "    pm.response.to.have.status(200);",
        "});",
        "pm.test(\"Response is valid JSON\", function () {",
        "    var jsonData = pm.response.json();",
        "    pm.expect(jsonData).to.be.an(\"object\");",
        "});",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect();

    let properties = endpoint
        .success_response()
        .and_then(|r| r.schema.get("properties"))
        .and_then(Value::as_object);

    for property in properties.into_iter().flat_map(|p| p.keys()) {
        lines.push(format!(
            "pm.test({}, function () {{",
            js_string(&format!("Response contains {property}"))
        ));
        lines.push("    var jsonData = pm.response.json();".to_string());
        lines.push(format!(
            "    pm.expect(jsonData).to.have.property({});",
            js_string(property)
        ));
        lines.push("});".to_string());
    }

    lines
}

/// Rewrites the first `test` event's script. Leaves without a test script
/// are left alone and `false` is returned.
pub fn update_test_script(
    leaf: &mut RequestItem,
    endpoint: &EndpointDescriptor,
    mode: ScriptMode,
) -> bool {
    let Some(script) = leaf
        .event
        .as_mut()
        .and_then(|events| events.iter_mut().find(|e| e.listen == "test"))
        .and_then(|event| event.script.as_mut())
    else {
        return false;
    };
    let Some(exec) = script.exec.as_ref() else {
        return false;
    };

    let generated = generate_assertions(endpoint);
    let lines = match mode {
        ScriptMode::Replace => generated,
        ScriptMode::Merge => merge_block(&exec.lines(), generated),
    };
    script.exec = Some(Exec::Lines(lines));
    true
}

fn merge_block(existing: &[String], generated: Vec<String>) -> Vec<String> {
    let mut block = Vec::with_capacity(generated.len() + 2);
    block.push(BLOCK_BEGIN.to_string());
    block.extend(generated);
    block.push(BLOCK_END.to_string());

    let begin = existing.iter().position(|l| l.trim() == BLOCK_BEGIN);
    let end = begin.and_then(|b| {
        existing[b..]
            .iter()
            .position(|l| l.trim() == BLOCK_END)
            .map(|offset| b + offset)
    });

    match (begin, end) {
        (Some(b), Some(e)) => existing[..b]
            .iter()
            .cloned()
            .chain(block)
            .chain(existing[e + 1..].iter().cloned())
            .collect(),
        _ => block.into_iter().chain(existing.iter().cloned()).collect(),
    }
}

fn js_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
