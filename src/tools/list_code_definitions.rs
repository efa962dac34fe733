//! `list_code_definitions` — extract top-level class/function/method names
//! for {Python, JavaScript, TypeScript, Java, C, C++, Go} by language-aware
//! matching: literal-prefix matching where a language keyword makes the
//! line unambiguous (`def `, `func `, `class `, …), and `regex`-driven
//! patterns for C/C++/Java signatures, which have no such keyword.

use super::{ParamType, ToolContext, ToolHandler, ToolParameter, ToolResult, ToolSpec};
use crate::path_guard;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::fs;
use std::sync::OnceLock;

pub struct ListCodeDefinitionsHandler;

#[async_trait]
impl ToolHandler for ListCodeDefinitionsHandler {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "list_code_definitions",
            "List top-level class/function/method definitions in a file.",
            vec![ToolParameter::new("file_path", ParamType::String, "Path relative to the repo root", true)],
        )
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
        let Some(file_path) = args.get("file_path").and_then(Value::as_str) else {
            return ToolResult::err("InvalidParameters", "missing 'file_path'");
        };

        let resolved = match path_guard::resolve(ctx.repo_root, file_path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err("InvalidPath", e.to_string()),
        };

        let content = match fs::read_to_string(&resolved) {
            Ok(s) => s,
            Err(e) => return ToolResult::err("NotFound", e.to_string()),
        };

        let definitions: Vec<Value> = content
            .lines()
            .enumerate()
            .filter_map(|(i, line)| classify(line.trim()).map(|(kind, name)| json!({
                "kind": kind,
                "name": name,
                "line": i + 1,
            })))
            .collect();

        ToolResult::ok(json!({ "definitions": definitions }))
    }
}

/// Returns `(kind, name)` for a trimmed line matching a top-level
/// definition in Python, JavaScript/TypeScript, Java, C/C++, or Go.
fn classify(line: &str) -> Option<(&'static str, String)> {
    if line.is_empty() || line.starts_with("//") || line.starts_with('#') || line.starts_with('*') {
        return None;
    }

    const FUNCTION_PREFIXES: &[&str] = &[
        "pub async fn ", "pub fn ", "async fn ", "fn ",
        "def ", "async def ",
        "func ",
        "export default function ", "export async function ", "export function ", "function ",
    ];
    for prefix in FUNCTION_PREFIXES {
        if let Some(rest) = line.strip_prefix(prefix) {
            if let Some(name) = extract_identifier(rest) {
                return Some(("function", name));
            }
        }
    }

    const CLASS_PREFIXES: &[&str] = &[
        "pub struct ", "struct ", "pub enum ", "enum ", "pub trait ", "trait ",
        "class ", "export class ", "export default class ",
        "interface ", "export interface ",
        "public class ", "class final ", "public interface ", "public enum ",
    ];
    for prefix in CLASS_PREFIXES {
        if let Some(rest) = line.strip_prefix(prefix) {
            if let Some(name) = extract_identifier(rest) {
                return Some(("class", name));
            }
        }
    }

    // C, C++, and Java function/method signatures carry no distinguishing
    // leading keyword the way `fn `/`def `/`func ` do, so they're matched
    // structurally instead of by prefix.
    for regex in signature_regexes() {
        if let Some(caps) = regex.captures(line) {
            if let Some(name) = caps.name("name") {
                return Some(("function", name.as_str().to_string()));
            }
        }
    }

    None
}

/// Lazily-built, process-wide regex set for the signature shapes
/// [`classify`] can't tell apart from a literal prefix.
fn signature_regexes() -> &'static [Regex] {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        vec![
            // C/C++ free function or `Class::method` definition, e.g.
            // `int main() {` or `void Foo::bar() {`. Requires at least one
            // return-type token before the name and a `{` (not `;`) at
            // the end, so declarations and control-flow statements
            // (`if (x) {`, `for (...; ...; ...) {`) don't qualify.
            Regex::new(
                r"^(?:[A-Za-z_]\w*(?:::\w+)*[\s\*&]+)+(?:[A-Za-z_]\w*::)?(?P<name>[A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:const\s*)?\{\s*$",
            )
            .unwrap(),
            // Java method, e.g. `public void doThing() {` or
            // `private static List<String> names() {`.
            Regex::new(
                r"^(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?(?:synchronized\s+)?(?:abstract\s+)?(?:[\w.\[\]]+(?:<[^>]*>)?\s+)+(?P<name>[A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:throws\s+[\w.,\s]+)?\s*\{\s*$",
            )
            .unwrap(),
        ]
    })
}

fn extract_identifier(rest: &str) -> Option<String> {
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
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
    async fn finds_rust_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(
            root.join("a.rs"),
            "pub struct Foo;\n\npub fn bar() {}\n",
        )
        .unwrap();
        let result = ListCodeDefinitionsHandler
            .execute(json!({"file_path": "a.rs"}), &ctx(&root))
            .await;
        let defs = result.data.unwrap()["definitions"].as_array().unwrap().clone();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0]["name"], "Foo");
        assert_eq!(defs[1]["name"], "bar");
    }

    #[tokio::test]
    async fn finds_python_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("a.py"), "class Foo:\n    def bar(self):\n        pass\n").unwrap();
        let result = ListCodeDefinitionsHandler
            .execute(json!({"file_path": "a.py"}), &ctx(&root))
            .await;
        let defs = result.data.unwrap()["definitions"].as_array().unwrap().clone();
        assert_eq!(defs.len(), 2);
    }

    #[tokio::test]
    async fn finds_c_free_function() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("a.c"), "int main() {\n    return 0;\n}\n").unwrap();
        let result = ListCodeDefinitionsHandler
            .execute(json!({"file_path": "a.c"}), &ctx(&root))
            .await;
        let defs = result.data.unwrap()["definitions"].as_array().unwrap().clone();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], "main");
        assert_eq!(defs[0]["kind"], "function");
    }

    #[tokio::test]
    async fn finds_cpp_scoped_method() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(
            root.join("a.cpp"),
            "void Foo::bar() {\n    do_thing();\n}\n",
        )
        .unwrap();
        let result = ListCodeDefinitionsHandler
            .execute(json!({"file_path": "a.cpp"}), &ctx(&root))
            .await;
        let defs = result.data.unwrap()["definitions"].as_array().unwrap().clone();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], "bar");
    }

    #[tokio::test]
    async fn finds_java_method() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(
            root.join("A.java"),
            "public class A {\n    public void doThing() {\n        run();\n    }\n}\n",
        )
        .unwrap();
        let result = ListCodeDefinitionsHandler
            .execute(json!({"file_path": "A.java"}), &ctx(&root))
            .await;
        let defs = result.data.unwrap()["definitions"].as_array().unwrap().clone();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0]["name"], "A");
        assert_eq!(defs[0]["kind"], "class");
        assert_eq!(defs[1]["name"], "doThing");
        assert_eq!(defs[1]["kind"], "function");
    }

    #[test]
    fn control_flow_lines_are_not_misclassified_as_functions() {
        assert!(classify("if (x > 0) {").is_none());
        assert!(classify("for (int i = 0; i < n; i++) {").is_none());
        assert!(classify("while (running) {").is_none());
        assert!(classify("switch (value) {").is_none());
    }
}
