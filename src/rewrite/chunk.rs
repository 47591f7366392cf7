/// Wire model for one streamed chat-completion chunk.
///
/// Only the fields the rewriter inspects are modeled; everything else is
/// preserved through `#[serde(flatten)]` maps so a decoded-then-re-encoded
/// chunk loses nothing the proxy does not understand.
use serde::{Deserialize, Serialize};

/// One decoded SSE `data` payload from the upstream completion stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single choice within a chunk. The rewriter only operates on index 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The incremental payload of a choice.
///
/// `reasoning` and `reasoning_content` carry identical text when both are
/// present; some upstreams also misplace `finish_reason` here instead of on
/// the choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of `delta.tool_calls`.
///
/// A header carries `id`, `type` and the function name; argument deltas
/// carry only `index` and `function.arguments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl StreamChunk {
    /// Lenient decode of a raw SSE data payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error; callers treat a failure as
    /// an opaque passthrough payload.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Shallow copy carrying the identification fields and a single empty
    /// choice ready to receive a rewritten delta.
    ///
    /// `id`, `object`, `model`, `created`, `usage` and unmodeled top-level
    /// fields are kept; the choice keeps its index and finish reason.
    #[must_use]
    pub fn rebase(&self) -> Self {
        let choice = self.choices.first();
        Self {
            id: self.id.clone(),
            object: self.object.clone(),
            model: self.model.clone(),
            created: self.created,
            choices: vec![StreamChoice {
                index: choice.map_or(0, |c| c.index),
                delta: StreamDelta::default(),
                finish_reason: choice.and_then(|c| c.finish_reason.clone()),
                extra: serde_json::Map::new(),
            }],
            usage: self.usage.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Deterministic JSON emission. Optional fields that are unset are
    /// suppressed so downstream clients see clean deltas.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
