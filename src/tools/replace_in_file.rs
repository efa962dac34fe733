//! `replace_in_file` — literal search-and-replace. Fails if `search` is
//! absent; replaces every occurrence and warns if there was more than one.

use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use crate::path_guard;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;

pub struct ReplaceInFileHandler;

#[async_trait]
impl ToolHandler for ReplaceInFileHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "replace_in_file",
            "Replace a literal substring in a file with another string.",
            vec![
                ToolParameter::new("file_path", ParamType::String, "Path relative to the repo root", true),
                ToolParameter::new("search", ParamType::String, "Literal text to find", true),
                ToolParameter::new("replace", ParamType::String, "Replacement text", true),
            ],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let Some(file_path) = args.get("file_path").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'file_path'");
        };
        let Some(search) = args.get("search").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'search'");
        };
        let Some(replace) = args.get("replace").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'replace'");
        };

        let resolved = match path_guard::resolve(ctx.repo_root, file_path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err("InvalidPath", e.to_string()),
        };

        let original = match fs::read_to_string(&resolved) {
            Ok(s) => s,
            Err(e) => return ToolResult::err("NotFound", e.to_string()),
        };

        let occurrences = original.matches(search).count();
        if occurrences == 0 {
            return ToolResult::err("NotFound", format!("'{search}' not found in {file_path}"));
        }

        let updated = original.replace(search, replace);
        let size_delta = updated.len() as i64 - original.len() as i64;

        let tmp_path = resolved.with_extension(format!("tmp-{}", std::process::id()));
        if let Err(e) = fs::write(&tmp_path, &updated) {
            return ToolResult::err("IOError", e.to_string());
        }
        if let Err(e) = fs::rename(&tmp_path, &resolved) {
            let _ = fs::remove_file(&tmp_path);
            return ToolResult::err("IOError", e.to_string());
        }

        let mut result = ToolResult::ok(json!({
            "occurrences": occurrences,
            "size_delta": size_delta,
        }));
        if occurrences > 1 {
            result.metadata = Some(json!({
                "warning": format!("'{search}' occurred {occurrences} times; all were replaced"),
            }));
        }
        result
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
    async fn replaces_single_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("a.txt"), "hello world").unwrap();
        let result = ReplaceInFileHandler
            .execute(json!({"file_path": "a.txt", "search": "world", "replace": "rust"}), &ctx(&root))
            .await;
        assert!(result.success);
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "hello rust");
        assert_eq!(result.data.unwrap()["occurrences"], 1);
    }

    #[tokio::test]
    async fn fails_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("a.txt"), "hello").unwrap();
        let result = ReplaceInFileHandler
            .execute(json!({"file_path": "a.txt", "search": "missing", "replace": "x"}), &ctx(&root))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("NotFound"));
    }

    #[tokio::test]
    async fn warns_on_multiple_occurrences() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("a.txt"), "aa aa").unwrap();
        let result = ReplaceInFileHandler
            .execute(json!({"file_path": "a.txt", "search": "aa", "replace": "bb"}), &ctx(&root))
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["occurrences"], 2);
        assert!(result.metadata.unwrap()["warning"].as_str().unwrap().contains("2 times"));
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "bb bb");
    }
}
