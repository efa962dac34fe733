//! `list_files` — enumerate entries under a path, with recursion limits,
//! result caps, and a fixed ignore set.

use super::cache::TtlCache;
use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use crate::path_guard;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

const IGNORED: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    ".vscode",
    ".idea",
];

/// Cache capacity and TTL per spec §4.B: "the coordinator may memoize
/// `(path, recursive, max_depth)` for 3 minutes with an LRU of 50 entries."
const CACHE_CAPACITY: usize = 50;
const CACHE_TTL: Duration = Duration::from_secs(3 * 60);

/// Cache key intentionally omits `max_results`, matching the parameter
/// tuple the spec names; a walk cached under one `max_results` is reused
/// verbatim (including its truncation) by a later call differing only in
/// that field.
type CacheKey = (String, bool, usize);

pub struct ListFilesHandler {
    cache: TtlCache<CacheKey, Value>,
}

impl ListFilesHandler {
    pub fn new() -> Self {
        Self {
            cache: TtlCache::new(CACHE_CAPACITY, CACHE_TTL),
        }
    }
}

impl Default for ListFilesHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for ListFilesHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "list_files",
            "List files and directories under a path.",
            vec![
                ToolParameter::new("path", ParamType::String, "Path relative to the repo root", true),
                ToolParameter::new("recursive", ParamType::Boolean, "Recurse into subdirectories (default false)", false),
                ToolParameter::new("max_depth", ParamType::Integer, "Max recursion depth (default 10)", false),
                ToolParameter::new("max_results", ParamType::Integer, "Cap on returned entries (default 1000)", false),
            ],
        )
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let recursive = args.get("recursive").and_then(Value::as_bool).unwrap_or(false);
        let max_depth = args.get("max_depth").and_then(Value::as_u64).unwrap_or(10) as usize;
        let max_results = args.get("max_results").and_then(Value::as_u64).unwrap_or(1000) as usize;

        let cache_key: CacheKey = (path.to_string(), recursive, max_depth);
        if let Some(cached) = self.cache.get(&cache_key) {
            return result_from_cached(cached);
        }

        let root = match path_guard::resolve(ctx.repo_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err("InvalidPath", e.to_string()),
        };

        let mut walker = Walker {
            base: &root,
            recursive,
            max_depth,
            max_results,
            entries: Vec::new(),
            truncated: false,
        };
        walker.walk(&root, 0);

        let count = walker.entries.len();
        let cached = json!({
            "entries": walker.entries,
            "truncated": walker.truncated,
            "count": count,
        });
        self.cache.put(cache_key, cached.clone());
        result_from_cached(cached)
    }
}

fn result_from_cached(cached: Value) -> ToolResult {
    let truncated = cached.get("truncated").cloned().unwrap_or(json!(false));
    let count = cached.get("count").cloned().unwrap_or(json!(0));
    let entries = cached.get("entries").cloned().unwrap_or(json!([]));
    ToolResult::ok_with_metadata(
        json!({ "entries": entries }),
        json!({ "truncated": truncated, "count": count }),
    )
}

struct Walker<'a> {
    base: &'a Path,
    recursive: bool,
    max_depth: usize,
    max_results: usize,
    entries: Vec<Value>,
    truncated: bool,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, dir: &Path, depth: usize) {
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return;
        };
        let mut names: Vec<_> = read_dir.filter_map(|e| e.ok()).collect();
        names.sort_by_key(|e| e.file_name());

        for entry in names {
            if self.entries.len() >= self.max_results {
                self.truncated = true;
                return;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if IGNORED.contains(&name.as_str()) {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let rel = path.strip_prefix(self.base).unwrap_or(&path);
            let kind = if file_type.is_dir() { "directory" } else { "file" };
            self.entries.push(json!({
                "path": rel.to_string_lossy(),
                "kind": kind,
            }));

            if self.recursive && file_type.is_dir() && depth + 1 <= self.max_depth {
                self.walk(&path, depth + 1);
            }
        }
    }
}
