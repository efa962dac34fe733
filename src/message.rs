//! Conversation data model shared by the Conversation Store, Context
//! Manager, and Task Engine: the tagged `user | assistant | tool_result`
//! message sum of spec §3, with the tool-call/tool-result pairing that
//! every downstream invariant (compaction, resume, cancellation) must
//! preserve.

use crate::tools::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
    /// Synthetic role used only for compaction's dropped-span summary
    /// message (spec §4.F step 3). Never persisted by the Conversation
    /// Store — it exists solely in the view handed to the model adapter.
    System,
}

/// A tool call issued by an assistant message, with its result attached
/// once the coordinator has dispatched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Seconds since epoch, fractional.
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AssistantToolCall>,
    /// For `tool_result` messages: the `call_id` this responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            timestamp: now_secs(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            call_id: None,
        }
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<AssistantToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            timestamp: now_secs(),
            content,
            tool_calls,
            call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, result: &ToolResult) -> Self {
        Self {
            role: Role::ToolResult,
            timestamp: now_secs(),
            content: Some(render_tool_result(result)),
            tool_calls: Vec::new(),
            call_id: Some(call_id.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            timestamp: now_secs(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            call_id: None,
        }
    }

    /// True for `assistant` messages that carry at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// Render a `ToolResult` as the text a tool-result message carries in
/// history — results must be representable as text (spec §3).
pub fn render_tool_result(result: &ToolResult) -> String {
    if result.success {
        match &result.data {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    } else {
        result.error.clone().unwrap_or_else(|| "tool failed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json() {
        let msg = Message::assistant(
            Some("let me check".to_string()),
            vec![AssistantToolCall {
                call_id: "1".to_string(),
                tool_name: "read_file".to_string(),
                parameters: json!({"file_path": "README.md"}),
                result: Some(ToolResult::ok(json!({"content": "hi"}))),
            }],
        );
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.tool_calls.len(), 1);
        assert_eq!(decoded.tool_calls[0].call_id, "1");
    }

    #[test]
    fn tool_result_message_carries_call_id() {
        let result = ToolResult::ok(json!({"content": "hi"}));
        let msg = Message::tool_result("42", &result);
        assert_eq!(msg.call_id.as_deref(), Some("42"));
        assert_eq!(msg.role, Role::ToolResult);
    }
}
