/// Downstream chunk construction.
///
/// Pure helpers that take a rebased template chunk (see
/// [`StreamChunk::rebase`]) and produce the encoded JSON payload for each
/// emission kind. Suppression of empty content/argument emissions is the
/// caller's responsibility; header emissions are never suppressed because
/// they establish the call id and name.
use super::chunk::{StreamChunk, ToolCallDelta, ToolCallFunction};

/// `delta = { content: <text> }`
#[must_use]
pub fn content_chunk(template: &StreamChunk, text: &str) -> String {
    let mut chunk = template.clone();
    chunk.choices[0].delta.content = Some(text.to_string());
    chunk.encode()
}

/// `delta = { tool_calls: [ { id, type: "function", index, function: { name, arguments: "" } } ] }`
#[must_use]
pub fn tool_call_header(template: &StreamChunk, id: &str, index: u32, name: &str) -> String {
    let mut chunk = template.clone();
    chunk.choices[0].delta.tool_calls = Some(vec![ToolCallDelta {
        id: Some(id.to_string()),
        kind: Some("function".to_string()),
        index,
        function: ToolCallFunction {
            name: Some(name.to_string()),
            arguments: Some(String::new()),
        },
    }]);
    chunk.encode()
}

/// `delta = { tool_calls: [ { index, function: { arguments } } ] }`
#[must_use]
pub fn arguments_delta(template: &StreamChunk, index: u32, arguments: &str) -> String {
    let mut chunk = template.clone();
    chunk.choices[0].delta.tool_calls = Some(vec![ToolCallDelta {
        id: None,
        kind: None,
        index,
        function: ToolCallFunction {
            name: None,
            arguments: Some(arguments.to_string()),
        },
    }]);
    chunk.encode()
}

/// Empty delta with `finish_reason` set on the choice.
#[must_use]
pub fn finish_chunk(template: &StreamChunk, reason: &str) -> String {
    let mut chunk = template.clone();
    chunk.choices[0].finish_reason = Some(reason.to_string());
    chunk.encode()
}
