//! `search_files` — regex search across files under a path, bounded by file
//! count, file size, and result count, using a small worker pool.

use super::cache::TtlCache;
use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use crate::path_guard;
use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MAX_FILE_SIZE: u64 = 1024 * 1024;
const MAX_FILES_SCANNED: usize = 100;
const WORKER_COUNT: usize = 4;

/// Cache capacity and TTL per spec §4.B: "Cacheable: 5-minute LRU of 100
/// entries keyed by the full parameter tuple."
const CACHE_CAPACITY: usize = 100;
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

type CacheKey = (String, String, Option<String>, bool, usize);

pub struct SearchFilesHandler {
    cache: TtlCache<CacheKey, Value>,
}

impl SearchFilesHandler {
    pub fn new() -> Self {
        Self {
            cache: TtlCache::new(CACHE_CAPACITY, CACHE_TTL),
        }
    }
}

impl Default for SearchFilesHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for SearchFilesHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "search_files",
            "Search files under a path for a regular expression.",
            vec![
                ToolParameter::new("pattern", ParamType::String, "Regular expression to search for", true),
                ToolParameter::new("path", ParamType::String, "Path relative to the repo root (default root)", false),
                ToolParameter::new("file_pattern", ParamType::String, "Glob filter for file names, e.g. '*.rs'", false),
                ToolParameter::new("case_sensitive", ParamType::Boolean, "Default false", false),
                ToolParameter::new("max_results", ParamType::Integer, "Cap on matches returned (default 50)", false),
            ],
        )
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let Some(pattern) = args.get("pattern").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'pattern'");
        };
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let file_pattern = args.get("file_pattern").and_then(Value::as_str).map(str::to_string);
        let case_sensitive = args.get("case_sensitive").and_then(Value::as_bool).unwrap_or(false);
        let max_results = args.get("max_results").and_then(Value::as_u64).unwrap_or(50) as usize;

        let cache_key: CacheKey = (
            pattern.to_string(),
            path.to_string(),
            file_pattern.clone(),
            case_sensitive,
            max_results,
        );
        if let Some(cached) = self.cache.get(&cache_key) {
            return ToolResult::ok_with_metadata(
                cached.get("data").cloned().unwrap_or(json!({"matches": []})),
                cached.get("metadata").cloned().unwrap_or(json!({})),
            );
        }

        let root = match path_guard::resolve(ctx.repo_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err("InvalidPath", e.to_string()),
        };

        let regex = match RegexBuilder::new(pattern).case_insensitive(!case_sensitive).build() {
            Ok(r) => r,
            Err(e) => return ToolResult::err("InvalidParameters", format!("bad pattern: {e}")),
        };

        let mut candidates = Vec::new();
        collect_files(&root, file_pattern.as_deref(), &mut candidates);
        let files_total = candidates.len();
        candidates.truncate(MAX_FILES_SCANNED);
        let files_scanned = candidates.len();

        let matches = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let matches_count = Arc::new(AtomicUsize::new(0));
        let chunks = split_into_chunks(candidates, WORKER_COUNT);

        let mut tasks = Vec::new();
        for chunk in chunks {
            let regex = regex.clone();
            let matches = Arc::clone(&matches);
            let matches_count = Arc::clone(&matches_count);
            tasks.push(tokio::task::spawn_blocking(move || {
                scan_chunk(chunk, &regex, max_results, &matches, &matches_count);
            }));
        }
        for task in tasks {
            let _ = task.await;
        }

        let mut results = Arc::try_unwrap(matches).unwrap().into_inner();
        results.truncate(max_results);

        let data = json!({ "matches": results });
        let metadata = json!({
            "files_total": files_total,
            "files_scanned": files_scanned,
            "truncated": matches_count.load(Ordering::Relaxed) > max_results || files_total > files_scanned,
        });
        self.cache.put(cache_key, json!({ "data": data, "metadata": metadata }));

        ToolResult::ok_with_metadata(data, metadata)
    }
}

fn collect_files(dir: &Path, file_pattern: Option<&str>, out: &mut Vec<PathBuf>) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if matches!(name.as_str(), ".git" | "node_modules" | "__pycache__" | ".venv" | "dist" | "build") {
            continue;
        }
        let Ok(file_type) = entry.file_type() else { continue };
        if file_type.is_dir() {
            collect_files(&path, file_pattern, out);
        } else if file_type.is_file() {
            if let Some(glob) = file_pattern {
                if !glob_match(glob, &name) {
                    continue;
                }
            }
            if let Ok(meta) = entry.metadata() {
                if meta.len() <= MAX_FILE_SIZE {
                    out.push(path);
                }
            }
        }
    }
}

/// Minimal glob matcher supporting a single leading `*` wildcard, enough
/// for `*.ext` style filters.
fn glob_match(glob: &str, name: &str) -> bool {
    if let Some(suffix) = glob.strip_prefix('*') {
        name.ends_with(suffix)
    } else {
        glob == name
    }
}

fn split_into_chunks(files: Vec<PathBuf>, n: usize) -> Vec<Vec<PathBuf>> {
    let mut chunks: Vec<Vec<PathBuf>> = (0..n).map(|_| Vec::new()).collect();
    for (i, f) in files.into_iter().enumerate() {
        chunks[i % n].push(f);
    }
    chunks
}

fn scan_chunk(
    files: Vec<PathBuf>,
    regex: &regex::Regex,
    max_results: usize,
    matches: &Arc<parking_lot::Mutex<Vec<Value>>>,
    matches_count: &Arc<AtomicUsize>,
) {
    for path in files {
        if matches_count.load(Ordering::Relaxed) >= max_results {
            return;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if regex.is_match(line) {
                let before = if i > 0 { Some(lines[i - 1]) } else { None };
                let after = lines.get(i + 1).copied();
                matches.lock().push(json!({
                    "file": path.to_string_lossy(),
                    "line_number": i + 1,
                    "line": line,
                    "context_before": before,
                    "context_after": after,
                }));
                if matches_count.fetch_add(1, Ordering::Relaxed) + 1 >= max_results {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ctx(root: &PathBuf) -> ToolContext<'_> {
        ToolContext { repo_root: root }
    }

    #[tokio::test]
    async fn finds_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}\nlet needle = 1;\n").unwrap();
        let root = dir.path().to_path_buf();
        let result = SearchFilesHandler::new()
            .execute(json!({"pattern": "needle"}), &ctx(&root))
            .await;
        assert!(result.success);
        let matches = result.data.unwrap()["matches"].as_array().unwrap().clone();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["line_number"], 2);
    }

    #[tokio::test]
    async fn respects_file_pattern() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "needle").unwrap();
        fs::write(dir.path().join("a.txt"), "needle").unwrap();
        let root = dir.path().to_path_buf();
        let result = SearchFilesHandler::new()
            .execute(json!({"pattern": "needle", "file_pattern": "*.rs"}), &ctx(&root))
            .await;
        let matches = result.data.unwrap()["matches"].as_array().unwrap().clone();
        assert_eq!(matches.len(), 1);
        assert!(matches[0]["file"].as_str().unwrap().ends_with("a.rs"));
    }
}
