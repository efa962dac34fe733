//! Tool handlers: per-tool logic for the code/filesystem/git operations the
//! agent may invoke. Each handler exposes a [`ToolSpec`] (for inclusion in
//! model prompts) and an `execute` method; the [`crate::coordinator`] module
//! owns the registry and dispatch.

pub mod cache;
pub mod git_ops;
pub mod list_code_definitions;
pub mod list_files;
pub mod read_file;
pub mod replace_in_file;
pub mod search_files;
pub mod write_to_file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Semantic type tag for a tool parameter, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn new(name: &str, param_type: ParamType, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required,
        }
    }
}

/// Static description of a tool. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, parameters: Vec<ToolParameter>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Validate `args` against this spec's parameters: every required
    /// parameter must be present, and present values must match the
    /// declared type tag.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let obj = args
            .as_object()
            .ok_or_else(|| "arguments must be a JSON object".to_string())?;

        for param in &self.parameters {
            match obj.get(&param.name) {
                None => {
                    if param.required {
                        return Err(format!("missing required parameter '{}'", param.name));
                    }
                }
                Some(value) => {
                    let type_ok = match param.param_type {
                        ParamType::String => value.is_string(),
                        ParamType::Integer => value.is_i64() || value.is_u64(),
                        ParamType::Boolean => value.is_boolean(),
                        ParamType::Object => value.is_object() || value.is_array(),
                    };
                    if !type_ok {
                        return Err(format!(
                            "parameter '{}' has wrong type, expected {:?}",
                            param.name, param.param_type
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Result of a tool execution. Must be representable as text for the
/// conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    pub fn ok_with_metadata(data: Value, metadata: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: Some(metadata),
        }
    }

    pub fn err(kind: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(format!("{kind}: {}", message.into())),
            metadata: None,
        }
    }
}

/// Per-call context handed to a handler's `execute`.
pub struct ToolContext<'a> {
    pub repo_root: &'a Path,
}

/// A registered tool: a spec plus the logic to run it.
///
/// Handlers declare whether they are safe to run concurrently with other
/// side-effect-free handlers in the same `execute_many` batch via
/// [`ToolHandler::side_effect_free`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    fn side_effect_free(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult;
}
