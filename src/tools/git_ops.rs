//! `git_status` / `git_diff` / `git_log` / `git_branch` — read-only wrappers
//! around the repository's version-control metadata. None of these mutate
//! the working tree or index; they shell out to the `git` binary the way
//! other tool handlers in this crate shell out to external programs.

use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Command;

fn run_git(repo_root: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(args)
        .output()
        .map_err(|e| format!("failed to spawn git: {e}"))?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub struct GitStatusHandler;

#[async_trait]
impl ToolHandler for GitStatusHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("git_status", "Show working tree status (porcelain format).", vec![])
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        match run_git(ctx.repo_root, &["status", "--porcelain=v1", "--branch"]) {
            Ok(out) => {
                let entries: Vec<Value> = out
                    .lines()
                    .filter(|l| !l.starts_with("##"))
                    .map(|l| {
                        let (status, path) = l.split_at(2.min(l.len()));
                        json!({ "status": status.trim(), "path": path.trim() })
                    })
                    .collect();
                ToolResult::ok(json!({ "entries": entries }))
            }
            Err(e) => ToolResult::err("IOError", e),
        }
    }
}

pub struct GitDiffHandler;

#[async_trait]
impl ToolHandler for GitDiffHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "git_diff",
            "Show unstaged (or staged, if requested) diff.",
            vec![ToolParameter::new("staged", ParamType::Boolean, "Show staged diff instead of working tree diff", false)],
        )
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let staged = args.get("staged").and_then(Value::as_bool).unwrap_or(false);
        let git_args: &[&str] = if staged { &["diff", "--cached"] } else { &["diff"] };
        match run_git(ctx.repo_root, git_args) {
            Ok(out) => ToolResult::ok(json!({ "diff": out })),
            Err(e) => ToolResult::err("IOError", e),
        }
    }
}

pub struct GitLogHandler;

#[async_trait]
impl ToolHandler for GitLogHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "git_log",
            "Show recent commit history.",
            vec![ToolParameter::new("max_count", ParamType::Integer, "Max commits to return (default 20)", false)],
        )
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let max_count = args.get("max_count").and_then(Value::as_u64).unwrap_or(20);
        let max_count_arg = format!("-{max_count}");
        match run_git(
            ctx.repo_root,
            &["log", &max_count_arg, "--pretty=format:%H%x1f%an%x1f%ad%x1f%s", "--date=iso-strict"],
        ) {
            Ok(out) => {
                let commits: Vec<Value> = out
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(|l| {
                        let mut parts = l.splitn(4, '\u{1f}');
                        json!({
                            "hash": parts.next().unwrap_or(""),
                            "author": parts.next().unwrap_or(""),
                            "date": parts.next().unwrap_or(""),
                            "subject": parts.next().unwrap_or(""),
                        })
                    })
                    .collect();
                ToolResult::ok(json!({ "commits": commits }))
            }
            Err(e) => ToolResult::err("IOError", e),
        }
    }
}

pub struct GitBranchHandler;

#[async_trait]
impl ToolHandler for GitBranchHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("git_branch", "List local branches and the current branch.", vec![])
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        match run_git(ctx.repo_root, &["branch", "--list"]) {
            Ok(out) => {
                let mut current = None;
                let branches: Vec<Value> = out
                    .lines()
                    .filter_map(|l| {
                        let is_current = l.starts_with('*');
                        let name = l.trim_start_matches('*').trim();
                        if name.is_empty() {
                            return None;
                        }
                        if is_current {
                            current = Some(name.to_string());
                        }
                        Some(json!({ "name": name, "current": is_current }))
                    })
                    .collect();
                ToolResult::ok(json!({ "branches": branches, "current": current }))
            }
            Err(e) => ToolResult::err("IOError", e),
        }
    }
}
