//! Tool Coordinator — the registry and execution surface for every tool
//! handler. Generalizes the teacher's `ToolRuntime` choke-point (enabled
//! check → validate → execute → log) to in-process handlers: there is no
//! longer a remote HTTP call to circuit-break or replay fixtures against,
//! so this keeps only what still applies — registration, validation,
//! dispatch, and concurrent execution of declared-safe batches.

use crate::tools::{ToolContext, ToolHandler, ToolResult, ToolSpec};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A model-issued tool invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub parameters: Value,
}

pub struct ToolCoordinator {
    handlers: RwLock<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolCoordinator {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Build a coordinator pre-registered with the required tool set of
    /// spec §4.B.
    pub fn with_default_tools() -> Self {
        let coordinator = Self::new();
        coordinator.register(Arc::new(crate::tools::read_file::ReadFileHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::list_files::ListFilesHandler::new())).unwrap();
        coordinator.register(Arc::new(crate::tools::search_files::SearchFilesHandler::new())).unwrap();
        coordinator.register(Arc::new(crate::tools::write_to_file::WriteToFileHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::replace_in_file::ReplaceInFileHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::list_code_definitions::ListCodeDefinitionsHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::git_ops::GitStatusHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::git_ops::GitDiffHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::git_ops::GitLogHandler)).unwrap();
        coordinator.register(Arc::new(crate::tools::git_ops::GitBranchHandler)).unwrap();
        coordinator
    }

    /// Register a handler under its spec's name. Re-registering an
    /// already-present name fails.
    pub fn register(&self, handler: Arc<dyn ToolHandler>) -> Result<(), String> {
        let name = handler.spec().name.clone();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&name) {
            return Err(format!("tool '{name}' already registered"));
        }
        handlers.insert(name, handler);
        Ok(())
    }

    pub fn unregister(&self, name: &str) {
        self.handlers.write().remove(name);
    }

    /// Stable ordering (by name) for inclusion in model prompts.
    pub fn list_specs(&self) -> Vec<ToolSpec> {
        let handlers = self.handlers.read();
        let mut specs: Vec<ToolSpec> = handlers.values().map(|h| h.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Look up `call.tool_name`, validate parameters, and invoke the
    /// handler. Never panics or propagates — unknown tools and validation
    /// failures become a failed `ToolResult`.
    pub async fn execute(&self, call: &ToolCall, repo_root: &Path) -> ToolResult {
        let handler = {
            let handlers = self.handlers.read();
            handlers.get(&call.tool_name).cloned()
        };
        let Some(handler) = handler else {
            tracing::warn!("unknown tool requested: {}", call.tool_name);
            return ToolResult::err("UnknownTool", format!("unknown tool '{}'", call.tool_name));
        };

        let spec = handler.spec();
        if let Err(msg) = spec.validate(&call.parameters) {
            tracing::debug!("rejected call to {}: {}", call.tool_name, msg);
            return ToolResult::err("InvalidParameters", msg);
        }

        tracing::debug!("dispatching {} (call_id={})", call.tool_name, call.call_id);

        let ctx = ToolContext { repo_root };
        handler.execute(call.parameters.clone(), &ctx).await
    }

    /// Execute `calls` in request order. Runs independent calls
    /// concurrently if every participating handler is side-effect-free;
    /// otherwise runs sequentially. Result ordering always matches call
    /// ordering.
    pub async fn execute_many(&self, calls: &[ToolCall], repo_root: &Path) -> Vec<ToolResult> {
        let all_safe = {
            let handlers = self.handlers.read();
            calls.iter().all(|c| {
                handlers
                    .get(&c.tool_name)
                    .map(|h| h.side_effect_free())
                    .unwrap_or(true) // unknown tool: resolved as a failure either way, no exclusivity needed
            })
        };

        if !all_safe {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(call, repo_root).await);
            }
            return results;
        }

        let mut set = tokio::task::JoinSet::new();
        for (index, call) in calls.iter().cloned().enumerate() {
            let handlers = self.handlers.read();
            let handler = handlers.get(&call.tool_name).cloned();
            drop(handlers);
            let repo_root = repo_root.to_path_buf();
            set.spawn(async move {
                let result = match handler {
                    None => ToolResult::err("UnknownTool", format!("unknown tool '{}'", call.tool_name)),
                    Some(handler) => {
                        let spec = handler.spec();
                        if let Err(msg) = spec.validate(&call.parameters) {
                            ToolResult::err("InvalidParameters", msg)
                        } else {
                            let ctx = ToolContext { repo_root: &repo_root };
                            handler.execute(call.parameters, &ctx).await
                        }
                    }
                };
                (index, result)
            });
        }

        let mut ordered: Vec<Option<ToolResult>> = (0..calls.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            if let Ok((index, result)) = joined {
                ordered[index] = Some(result);
            }
        }
        ordered
            .into_iter()
            .map(|r| r.unwrap_or_else(|| ToolResult::err("IOError", "tool task panicked")))
            .collect()
    }
}

impl Default for ToolCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCall {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_tool_is_a_failed_result_not_an_error() {
        let coordinator = ToolCoordinator::with_default_tools();
        let dir = tempfile::tempdir().unwrap();
        let call = ToolCall::new("1", "does_not_exist", json!({}));
        let result = coordinator.execute(&call, dir.path()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn execute_many_preserves_order() {
        let coordinator = ToolCoordinator::with_default_tools();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let calls = vec![
            ToolCall::new("1", "read_file", json!({"file_path": "a.txt"})),
            ToolCall::new("2", "read_file", json!({"file_path": "b.txt"})),
        ];
        let results = coordinator.execute_many(&calls, dir.path()).await;
        assert_eq!(results[0].data.as_ref().unwrap()["content"], "a");
        assert_eq!(results[1].data.as_ref().unwrap()["content"], "b");
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let coordinator = ToolCoordinator::new();
        coordinator.register(Arc::new(crate::tools::read_file::ReadFileHandler)).unwrap();
        let err = coordinator
            .register(Arc::new(crate::tools::read_file::ReadFileHandler))
            .unwrap_err();
        assert!(err.contains("already registered"));
    }
}
