//! Context Manager (spec §4.F) — keeps the message list sent to the model
//! under a configured token budget.
//!
//! Grounded on no direct teacher equivalent; built following the corpus's
//! threshold-driven config idiom (`tool_runtime/config.rs`'s
//! `GlobalRuntimeConfig`) and the tool-call/tool-result pairing invariant
//! `conversation_history/parser.rs`'s `pending_tool_results` mechanism
//! already establishes for this corpus's message model.

use crate::adapter::ModelAdapter;
use crate::message::{Message, Role};

const PLACEHOLDER: &str = "[Previous file content shown above]";
/// Tool results older than the most recent N are eligible for truncation.
const RECENT_RESULT_WINDOW: usize = 5;
const TRUNCATE_HEAD_TAIL: usize = 200;
/// Messages kept verbatim at the tail once middle-dropping triggers.
const KEEP_TAIL_MESSAGES: usize = 10;

/// Character-based token estimate: ~1 token per 4 ASCII characters, ~1
/// per 2 non-ASCII characters. Implementations may substitute a precise
/// tokenizer; this is the contractual floor.
pub fn estimate_tokens_str(s: &str) -> usize {
    let mut ascii = 0usize;
    let mut non_ascii = 0usize;
    for c in s.chars() {
        if c.is_ascii() {
            ascii += 1;
        } else {
            non_ascii += 1;
        }
    }
    ascii / 4 + non_ascii / 2
}

fn estimate_message_tokens(message: &Message) -> usize {
    let mut total = message.content.as_deref().map(estimate_tokens_str).unwrap_or(0);
    for call in &message.tool_calls {
        total += estimate_tokens_str(&call.parameters.to_string());
        if let Some(result) = &call.result {
            total += estimate_tokens_str(&serde_json::to_string(result).unwrap_or_default());
        }
    }
    total
}

pub fn estimate_total(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[derive(Debug, Clone, Copy)]
pub struct ContextManager {
    pub max_context_tokens: usize,
    pub soft_threshold_pct: f64,
    pub hard_threshold_pct: f64,
}

impl ContextManager {
    pub fn new(max_context_tokens: usize, soft_threshold_pct: f64, hard_threshold_pct: f64) -> Self {
        Self {
            max_context_tokens,
            soft_threshold_pct,
            hard_threshold_pct,
        }
    }

    pub fn soft_budget(&self) -> usize {
        (self.max_context_tokens as f64 * self.soft_threshold_pct) as usize
    }

    pub fn hard_budget(&self) -> usize {
        (self.max_context_tokens as f64 * self.hard_threshold_pct) as usize
    }

    pub fn over_soft(&self, messages: &[Message]) -> bool {
        estimate_total(messages) > self.soft_budget()
    }

    pub fn over_hard(&self, messages: &[Message]) -> bool {
        estimate_total(messages) > self.hard_budget()
    }

    /// Apply the compaction policy of spec §4.F, stopping as soon as the
    /// result is under the soft budget. `summarizer`, if given, is asked
    /// to produce the middle-drop summary (step 3); absent an adapter, a
    /// deterministic header is used instead. Never reorders messages and
    /// never splits a tool-call/tool-result pair.
    pub async fn compact(
        &self,
        messages: &[Message],
        summarizer: Option<&dyn ModelAdapter>,
    ) -> Vec<Message> {
        let mut working = messages.to_vec();
        if estimate_total(&working) <= self.soft_budget() {
            return working;
        }

        working = collapse_duplicate_reads(working);
        if estimate_total(&working) <= self.soft_budget() {
            return working;
        }

        working = truncate_old_tool_results(working);
        if estimate_total(&working) <= self.soft_budget() {
            return working;
        }

        drop_middle_messages(working, summarizer).await
    }
}

/// Step 1: if `read_file(path=X)` occurs more than once, keep only the
/// most recent result verbatim and replace earlier ones with the
/// standard placeholder.
fn collapse_duplicate_reads(mut messages: Vec<Message>) -> Vec<Message> {
    use std::collections::HashMap;

    // Find, per file path, the index of the *last* assistant message
    // whose tool_calls include a read_file for that path.
    let mut last_seen: HashMap<String, usize> = HashMap::new();
    for (idx, message) in messages.iter().enumerate() {
        for call in &message.tool_calls {
            if call.tool_name == "read_file" {
                if let Some(path) = call.parameters.get("file_path").and_then(|v| v.as_str()) {
                    last_seen.insert(path.to_string(), idx);
                }
            }
        }
    }

    for (idx, message) in messages.iter_mut().enumerate() {
        for call in &mut message.tool_calls {
            if call.tool_name != "read_file" {
                continue;
            }
            let Some(path) = call.parameters.get("file_path").and_then(|v| v.as_str()).map(str::to_string) else {
                continue;
            };
            if last_seen.get(&path) == Some(&idx) {
                continue; // most recent: keep verbatim
            }
            if let Some(result) = &mut call.result {
                result.data = Some(serde_json::json!({ "content": PLACEHOLDER }));
            }
        }
    }

    // The tool_result messages that echo these calls' content also need
    // replacing, since they carry the rendered text the compacted history
    // actually sends to the model.
    let mut placeholder_call_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
    for message in &messages {
        for call in &message.tool_calls {
            if call.tool_name == "read_file" {
                if let Some(data) = call.result.as_ref().and_then(|r| r.data.as_ref()) {
                    if data.get("content").and_then(|v| v.as_str()) == Some(PLACEHOLDER) {
                        placeholder_call_ids.insert(call.call_id.clone());
                    }
                }
            }
        }
    }
    for message in messages.iter_mut() {
        if message.role == Role::ToolResult {
            if let Some(call_id) = &message.call_id {
                if placeholder_call_ids.contains(call_id) {
                    message.content = Some(PLACEHOLDER.to_string());
                }
            }
        }
    }

    messages
}

/// Step 2: tool-result messages older than the most recent
/// [`RECENT_RESULT_WINDOW`] are truncated to their first and last
/// [`TRUNCATE_HEAD_TAIL`] characters.
fn truncate_old_tool_results(mut messages: Vec<Message>) -> Vec<Message> {
    let result_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::ToolResult)
        .map(|(i, _)| i)
        .collect();

    if result_indices.len() <= RECENT_RESULT_WINDOW {
        return messages;
    }

    let cutoff = result_indices.len() - RECENT_RESULT_WINDOW;
    for &idx in &result_indices[..cutoff] {
        if let Some(content) = &messages[idx].content {
            if content.chars().count() > TRUNCATE_HEAD_TAIL * 2 {
                let head: String = content.chars().take(TRUNCATE_HEAD_TAIL).collect();
                let tail: String = content
                    .chars()
                    .rev()
                    .take(TRUNCATE_HEAD_TAIL)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                messages[idx].content = Some(format!("{head}…(truncated)…{tail}"));
            }
        }
    }
    messages
}

/// Step 3: keep the first user message (the task seed) and the last
/// [`KEEP_TAIL_MESSAGES`], replacing the dropped span with a single
/// system-tagged summary. Widens the cutoff backward rather than ever
/// splitting a tool-call/tool-result pair.
async fn drop_middle_messages(
    messages: Vec<Message>,
    summarizer: Option<&dyn ModelAdapter>,
) -> Vec<Message> {
    if messages.len() <= KEEP_TAIL_MESSAGES + 1 {
        return messages;
    }

    let mut cutoff = messages.len() - KEEP_TAIL_MESSAGES;
    while cutoff > 1 && splits_pair(&messages, cutoff) {
        cutoff -= 1;
    }

    let dropped_count = cutoff.saturating_sub(1);
    if dropped_count == 0 {
        return messages;
    }

    let dropped_span = &messages[1..cutoff];
    let summary_text = match summarizer {
        Some(adapter) => adapter
            .summarize(dropped_span)
            .await
            .unwrap_or_else(|_| deterministic_summary(dropped_count)),
        None => deterministic_summary(dropped_count),
    };

    let mut result = Vec::with_capacity(messages.len() - dropped_count + 1);
    result.push(messages[0].clone());
    result.push(Message::system(summary_text));
    result.extend_from_slice(&messages[cutoff..]);
    result
}

fn deterministic_summary(dropped_count: usize) -> String {
    format!("[{dropped_count} earlier turns omitted to stay under the context budget]")
}

/// True if dropping everything before `cutoff` would separate an
/// assistant message's tool call from its tool-result (or vice versa).
fn splits_pair(messages: &[Message], cutoff: usize) -> bool {
    if let Some(call_id) = &messages[cutoff].call_id {
        if messages[..cutoff]
            .iter()
            .any(|m| m.tool_calls.iter().any(|tc| &tc.call_id == call_id))
        {
            return true;
        }
    }
    for call in &messages[cutoff].tool_calls {
        if messages[..cutoff]
            .iter()
            .any(|m| m.call_id.as_deref() == Some(call.call_id.as_str()))
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AssistantToolCall;
    use crate::tools::ToolResult;
    use serde_json::json;

    fn read_call(id: &str, path: &str, content: &str) -> AssistantToolCall {
        AssistantToolCall {
            call_id: id.to_string(),
            tool_name: "read_file".to_string(),
            parameters: json!({ "file_path": path }),
            result: Some(ToolResult::ok(json!({ "content": content }))),
        }
    }

    #[test]
    fn estimate_counts_ascii_and_non_ascii() {
        assert_eq!(estimate_tokens_str("abcd"), 1);
        assert_eq!(estimate_tokens_str("日本"), 1);
    }

    #[tokio::test]
    async fn under_budget_is_untouched() {
        let manager = ContextManager::new(1_000_000, 0.8, 0.95);
        let messages = vec![Message::user("hi")];
        let result = manager.compact(&messages, None).await;
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_reads_collapse_to_one_verbatim_copy() {
        let big_content = "x".repeat(2000);
        let mut messages = Vec::new();
        for i in 0..20 {
            messages.push(Message::assistant(
                None,
                vec![read_call(&i.to_string(), "same.txt", &big_content)],
            ));
            messages.push(Message::tool_result(
                i.to_string(),
                &ToolResult::ok(json!({ "content": big_content })),
            ));
        }

        let manager = ContextManager::new(1000, 0.8, 0.95);
        let compacted = manager.compact(&messages, None).await;

        let verbatim_count = compacted
            .iter()
            .filter(|m| m.role == Role::ToolResult)
            .filter(|m| m.content.as_deref() != Some(PLACEHOLDER))
            .count();
        assert_eq!(verbatim_count, 1);
    }

    #[tokio::test]
    async fn never_splits_a_tool_call_pair() {
        let mut messages = vec![Message::user("seed")];
        for i in 0..30 {
            messages.push(Message::assistant(
                None,
                vec![read_call(&i.to_string(), "f.txt", "hello")],
            ));
            messages.push(Message::tool_result(
                i.to_string(),
                &ToolResult::ok(json!({ "content": "hello" })),
            ));
        }

        let manager = ContextManager::new(10, 0.8, 0.95);
        let compacted = manager.compact(&messages, None).await;

        for message in &compacted {
            if let Some(call_id) = &message.call_id {
                let has_pair = compacted
                    .iter()
                    .any(|m| m.tool_calls.iter().any(|tc| &tc.call_id == call_id));
                assert!(has_pair, "tool_result {call_id} has no matching tool_call in compacted view");
            }
        }
    }
}
