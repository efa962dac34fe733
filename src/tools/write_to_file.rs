//! `write_to_file` — create or overwrite a file atomically (write-to-temp,
//! then rename), creating missing parent directories.

use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use crate::path_guard;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;

pub struct WriteToFileHandler;

#[async_trait]
impl ToolHandler for WriteToFileHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "write_to_file",
            "Write content to a file, creating parent directories as needed.",
            vec![
                ToolParameter::new("file_path", ParamType::String, "Path relative to the repo root", true),
                ToolParameter::new("content", ParamType::String, "Full file content", true),
            ],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let Some(file_path) = args.get("file_path").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'file_path'");
        };
        let Some(content) = args.get("content").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'content'");
        };

        let resolved = match path_guard::resolve(ctx.repo_root, file_path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err("InvalidPath", e.to_string()),
        };

        let overwrote = resolved.exists();

        if let Some(parent) = resolved.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return ToolResult::err("IOError", e.to_string());
            }
        }

        let tmp_path = resolved.with_extension(format!(
            "{}.tmp-{}",
            resolved.extension().and_then(|e| e.to_str()).unwrap_or(""),
            std::process::id()
        ));
        if let Err(e) = fs::write(&tmp_path, content) {
            return ToolResult::err("IOError", e.to_string());
        }
        if let Err(e) = fs::rename(&tmp_path, &resolved) {
            let _ = fs::remove_file(&tmp_path);
            return ToolResult::err("IOError", e.to_string());
        }

        ToolResult::ok(json!({
            "bytes_written": content.len(),
            "overwrote": overwrote,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx(root: &PathBuf) -> ToolContext<'_> {
        ToolContext { repo_root: root }
    }

    #[tokio::test]
    async fn creates_new_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let result = WriteToFileHandler
            .execute(json!({"file_path": "a/b/c.txt", "content": "hi"}), &ctx(&root))
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["overwrote"], false);
        assert_eq!(fs::read_to_string(root.join("a/b/c.txt")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn reports_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("a.txt"), "old").unwrap();
        let result = WriteToFileHandler
            .execute(json!({"file_path": "a.txt", "content": "new"}), &ctx(&root))
            .await;
        assert_eq!(result.data.unwrap()["overwrote"], true);
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "new");
    }
}
