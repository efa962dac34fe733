//! `read_file` — read a file inside the repo root, bounded by `max_size`.

use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use crate::path_guard;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;

const DEFAULT_MAX_SIZE: u64 = 100 * 1024;

pub struct ReadFileHandler;

#[async_trait]
impl ToolHandler for ReadFileHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "read_file",
            "Read a file's contents, truncated to max_size bytes if larger.",
            vec![
                ToolParameter::new("file_path", ParamType::String, "Path relative to the repo root", true),
                ToolParameter::new(
                    "max_size",
                    ParamType::Integer,
                    "Maximum bytes to read (default 100KB)",
                    false,
                ),
            ],
        )
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let Some(file_path) = args.get("file_path").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'file_path'");
        };
        let max_size = args
            .get("max_size")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_SIZE);

        let resolved = match path_guard::resolve(ctx.repo_root, file_path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err("InvalidPath", e.to_string()),
        };

        let metadata = match fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) => return ToolResult::err("NotFound", e.to_string()),
        };
        let size = metadata.len();

        let bytes = match fs::read(&resolved) {
            Ok(b) => b,
            Err(e) => return ToolResult::err("IOError", e.to_string()),
        };

        let truncated = bytes.len() as u64 > max_size;
        let slice = if truncated {
            &bytes[..max_size as usize]
        } else {
            &bytes[..]
        };

        let content = match std::str::from_utf8(slice) {
            Ok(s) => s.to_string(),
            Err(_) => slice.iter().map(|&b| b as char).collect(),
        };

        ToolResult::ok(json!({
            "content": content,
            "size": size,
            "truncated": truncated,
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
    async fn reads_small_file_whole() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "hello").unwrap();
        let root = dir.path().to_path_buf();
        let result = ReadFileHandler
            .execute(json!({"file_path": "README.md"}), &ctx(&root))
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["content"], "hello");
    }

    #[tokio::test]
    async fn truncates_large_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(200)).unwrap();
        let root = dir.path().to_path_buf();
        let result = ReadFileHandler
            .execute(json!({"file_path": "big.txt", "max_size": 100}), &ctx(&root))
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["truncated"], true);
        assert_eq!(data["content"].as_str().unwrap().len(), 100);
        assert_eq!(data["size"], 200);
    }

    #[tokio::test]
    async fn rejects_escaping_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let result = ReadFileHandler
            .execute(json!({"file_path": "../../etc/passwd"}), &ctx(&root))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("InvalidPath"));
    }
}
