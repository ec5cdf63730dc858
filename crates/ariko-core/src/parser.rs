//! Tool Call Parsing
//!
//! Interprets free-form model output as a tool call. Parsing is lenient:
//! anything that is not a well-formed call to a registered tool is treated
//! as a plain answer, never as an error.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tool::{ToolCall, ToolRegistry};

#[derive(Deserialize)]
struct RawToolCall {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default, alias = "toolName", alias = "tool")]
    tool_name: Option<String>,
    #[serde(default, alias = "arguments")]
    parameters: Option<Map<String, Value>>,
}

/// Bodies of all fenced code blocks, in order of appearance
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let Some(line_end) = after_fence.find('\n') else {
            break;
        };
        let body = &after_fence[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(body[..close].trim());
        rest = &body[close + 3..];
    }

    blocks
}

/// Candidate JSON text: the first fenced block holding an object, else the
/// whole response
fn json_candidate(text: &str) -> &str {
    fenced_blocks(text)
        .into_iter()
        .find(|block| block.starts_with('{'))
        .unwrap_or_else(|| text.trim())
}

/// Parse `text` as a call to a tool in `registry`.
///
/// Returns `None` when the text is not JSON, has no tool name, or names a
/// tool that is not registered.
pub fn parse_tool_call(text: &str, registry: &ToolRegistry) -> Option<ToolCall> {
    let raw: RawToolCall = serde_json::from_str(json_candidate(text)).ok()?;

    let tool_name = raw.tool_name?.trim().to_string();
    if tool_name.is_empty() {
        return None;
    }
    if !registry.contains(&tool_name) {
        tracing::warn!(tool = %tool_name, "Model proposed an unknown tool, treating output as text");
        return None;
    }

    Some(ToolCall {
        thought: raw.thought.unwrap_or_default(),
        tool_name,
        parameters: raw.parameters.unwrap_or_default(),
    })
}
