//! Task Engine (spec §4.G) — the iterative "request model → detect tool
//! calls → execute tools → append results → repeat" agent loop.
//!
//! Grounded on `agent/gemini/provider.rs::GeminiProvider::run`: the
//! per-iteration structure (call adapter → check tool calls → dispatch →
//! append → repeat → break) is carried over almost exactly, generalized
//! away from Gemini-specific content types to the generic
//! `Message`/`AdapterEvent` vocabulary of spec §3/§4.H, and extended with
//! streaming partial-text events, a bounded mpsc event channel, and
//! cooperative cancellation (none of which the teacher's single-shot
//! `run()` needed).

use crate::adapter::{AdapterEvent, AiConfig, ModelAdapter};
use crate::cancel::CancellationToken;
use crate::context::ContextManager;
use crate::conversation::{ConversationStore, TaskIndex, TaskUpdate};
use crate::conversation::types::truncate_chars;
use crate::coordinator::{ToolCall, ToolCoordinator};
use crate::error::{CoreError, CoreResult};
use crate::message::{AssistantToolCall, Message};
use crate::tools::ToolResult;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Tool name the engine treats as the completion sentinel (spec §4.G
/// step 3g), if the caller has registered a handler under this name.
pub const ATTEMPT_COMPLETION_TOOL: &str = "attempt_completion";

/// Bounded channel capacity between engine and stream consumer (spec §5):
/// a slow consumer exerts backpressure, never drops events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

const DESCRIPTION_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    TaskStarted { task_id: String, is_new: bool },
    ApiRequestStarted { iteration: u32, message_count: usize },
    ApiResponse { content: String, iteration: u32 },
    ToolCallsDetected { tool_calls: Vec<ToolCall>, iteration: u32 },
    ToolExecutionStarted { tool_name: String },
    ToolExecutionCompleted { tool_name: String, result: ToolResult },
    Completion { content: String, iteration: u32 },
    Error { message: String },
}

pub struct RunRequest {
    pub user_input: String,
    pub repo_root: PathBuf,
    pub task_id: Option<String>,
    pub ai_config: AiConfig,
}

/// One engine instance serves one active conversation at a time per
/// `repo_root`, but a single process may host many. Concurrent runs
/// against the *same* `task_id` are rejected with `Busy` (spec §9 open
/// question, resolved that way).
pub struct TaskEngine {
    coordinator: Arc<ToolCoordinator>,
    store: Arc<ConversationStore>,
    index: Arc<TaskIndex>,
    adapter: Arc<dyn ModelAdapter>,
    running: Mutex<HashSet<String>>,
    engine_config: crate::config::EngineConfig,
}

impl TaskEngine {
    pub fn new(
        coordinator: Arc<ToolCoordinator>,
        store: Arc<ConversationStore>,
        index: Arc<TaskIndex>,
        adapter: Arc<dyn ModelAdapter>,
    ) -> Self {
        Self::with_config(coordinator, store, index, adapter, crate::config::EngineConfig::default())
    }

    /// Like [`TaskEngine::new`], but with the soft/hard compaction
    /// thresholds (and other engine defaults) taken from `engine_config`
    /// rather than its `Default` impl.
    pub fn with_config(
        coordinator: Arc<ToolCoordinator>,
        store: Arc<ConversationStore>,
        index: Arc<TaskIndex>,
        adapter: Arc<dyn ModelAdapter>,
        engine_config: crate::config::EngineConfig,
    ) -> Self {
        Self {
            coordinator,
            store,
            index,
            adapter,
            running: Mutex::new(HashSet::new()),
            engine_config,
        }
    }

    /// Start (or resume) a run. Returns the resolved `task_id`, a
    /// cancellation handle the caller may invoke, and the receiving end
    /// of the event stream; the loop itself runs on a spawned task.
    pub fn run(
        self: &Arc<Self>,
        req: RunRequest,
    ) -> CoreResult<(String, CancellationToken, mpsc::Receiver<EngineEvent>)> {
        let is_new = req.task_id.is_none() || self.index.get(req.task_id.as_deref().unwrap_or_default()).is_none();
        let task_id = req.task_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        {
            let mut running = self.running.lock();
            if running.contains(&task_id) {
                tracing::warn!("rejecting run for task {}: already in progress", task_id);
                return Err(CoreError::Busy(task_id));
            }
            running.insert(task_id.clone());
        }

        tracing::debug!("starting run for task {} (new={})", task_id, is_new);

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let engine = Arc::clone(self);
        let task_id_for_task = task_id.clone();
        let cancel_for_task = cancel.clone();
        tokio::spawn(async move {
            engine
                .drive(task_id_for_task.clone(), is_new, req, tx, cancel_for_task)
                .await;
            engine.running.lock().remove(&task_id_for_task);
        });

        Ok((task_id, cancel, rx))
    }

    async fn drive(
        &self,
        task_id: String,
        is_new: bool,
        req: RunRequest,
        tx: mpsc::Sender<EngineEvent>,
        cancel: CancellationToken,
    ) {
        if send(&tx, EngineEvent::TaskStarted { task_id: task_id.clone(), is_new }).await.is_err() {
            return;
        }

        let mut history = match self.store.load(&task_id).await {
            Ok(h) => h,
            Err(e) => {
                let _ = send(&tx, EngineEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        if is_new {
            self.index.upsert(
                &task_id,
                TaskUpdate {
                    description: Some(truncate_chars(&req.user_input, DESCRIPTION_MAX_CHARS)),
                    provider: Some(req.ai_config.provider.clone()),
                    model: Some(req.ai_config.model.clone()),
                    repo_root: Some(req.repo_root.display().to_string()),
                    ..Default::default()
                },
            );
        }

        let user_message = Message::user(req.user_input.clone());
        history.push(user_message.clone());
        self.store.append(&task_id, user_message).await;

        let context = ContextManager::new(
            req.ai_config
                .max_context_tokens
                .unwrap_or(self.engine_config.max_context_tokens) as usize,
            self.engine_config.soft_threshold_pct,
            self.engine_config.hard_threshold_pct,
        );

        let max_iterations = req.ai_config.max_iterations;
        let tool_specs = self.coordinator.list_specs();

        let mut last_text = String::new();
        let mut iteration: u32 = 0;
        let mut outcome: Option<CoreError> = None;

        loop {
            iteration += 1;
            if max_iterations > 0 && iteration > max_iterations {
                outcome = Some(CoreError::BudgetExhausted);
                break;
            }

            if cancel.is_cancelled() {
                outcome = Some(CoreError::Cancelled);
                break;
            }

            let compacted = context.compact(&history, Some(self.adapter.as_ref())).await;

            if send(
                &tx,
                EngineEvent::ApiRequestStarted {
                    iteration,
                    message_count: compacted.len(),
                },
            )
            .await
            .is_err()
            {
                return;
            }

            let stream_result = self.adapter.send(&compacted, &tool_specs, &req.ai_config).await;
            let mut stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    outcome = Some(e);
                    break;
                }
            };

            let mut text_parts: Vec<String> = Vec::new();
            let mut tool_calls: Vec<AssistantToolCall> = Vec::new();
            let mut usage = None;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        outcome = Some(CoreError::Cancelled);
                        break;
                    }
                    next = stream.next() => {
                        match next {
                            Some(AdapterEvent::TextFragment(fragment)) => {
                                if send(&tx, EngineEvent::ApiResponse { content: fragment.clone(), iteration }).await.is_err() {
                                    return;
                                }
                                text_parts.push(fragment);
                            }
                            Some(AdapterEvent::ToolCall { name, params, id }) => {
                                tool_calls.push(AssistantToolCall { call_id: id, tool_name: name, parameters: params, result: None });
                            }
                            Some(AdapterEvent::Done(u)) => {
                                usage = Some(u);
                            }
                            None => break,
                        }
                    }
                }
            }
            if outcome.is_some() {
                break;
            }

            let assistant_text = if text_parts.is_empty() { None } else { Some(text_parts.concat()) };
            last_text = assistant_text.clone().unwrap_or_default();

            let assistant_message = Message::assistant(assistant_text.clone(), tool_calls.clone());
            history.push(assistant_message.clone());
            self.store.append(&task_id, assistant_message).await;

            if let Some(usage) = usage {
                self.index.upsert(
                    &task_id,
                    TaskUpdate {
                        tokens_in: Some(usage.tokens_in),
                        tokens_out: Some(usage.tokens_out),
                        total_cost: Some(usage.cost),
                        ..Default::default()
                    },
                );
            }

            if tool_calls.is_empty() {
                break;
            }

            let calls: Vec<ToolCall> = tool_calls
                .iter()
                .map(|tc| ToolCall::new(tc.call_id.clone(), tc.tool_name.clone(), tc.parameters.clone()))
                .collect();

            if send(&tx, EngineEvent::ToolCallsDetected { tool_calls: calls.clone(), iteration }).await.is_err() {
                return;
            }

            let mut saw_completion = false;
            for call in &calls {
                if cancel.is_cancelled() {
                    outcome = Some(CoreError::Cancelled);
                    break;
                }

                if send(&tx, EngineEvent::ToolExecutionStarted { tool_name: call.tool_name.clone() }).await.is_err() {
                    return;
                }

                let result = self.coordinator.execute(call, &req.repo_root).await;
                if result.success {
                    tracing::debug!("tool {} completed for task {}", call.tool_name, task_id);
                } else {
                    tracing::warn!(
                        "tool {} failed for task {}: {:?}",
                        call.tool_name,
                        task_id,
                        result.error
                    );
                }

                if send(
                    &tx,
                    EngineEvent::ToolExecutionCompleted {
                        tool_name: call.tool_name.clone(),
                        result: result.clone(),
                    },
                )
                .await
                .is_err()
                {
                    return;
                }

                let tool_result_message = Message::tool_result(call.call_id.clone(), &result);
                history.push(tool_result_message.clone());
                self.store.append(&task_id, tool_result_message).await;

                if call.tool_name == ATTEMPT_COMPLETION_TOOL {
                    saw_completion = true;
                }
            }
            if outcome.is_some() {
                break;
            }
            if saw_completion {
                break;
            }
        }

        let size_bytes = self.store.disk_size_bytes(&task_id).await;
        self.index.upsert(
            &task_id,
            TaskUpdate {
                size_bytes: Some(size_bytes),
                ..Default::default()
            },
        );

        let persisted = match self.index.get(&task_id) {
            Some(metadata) => self.store.save(&task_id, &metadata).await,
            None => Ok(()),
        };
        let _ = self.index.save();

        if let Err(e) = persisted {
            let _ = send(&tx, EngineEvent::Error { message: e.to_string() }).await;
            return;
        }

        match outcome {
            Some(CoreError::Cancelled) => {
                tracing::info!("task {} cancelled after {} iterations", task_id, iteration);
                let _ = send(&tx, EngineEvent::Error { message: "cancelled".to_string() }).await;
            }
            Some(e) => {
                tracing::warn!("task {} ended in error after {} iterations: {}", task_id, iteration, e);
                let _ = send(&tx, EngineEvent::Error { message: e.to_string() }).await;
            }
            None => {
                tracing::debug!("task {} completed after {} iterations", task_id, iteration);
                let _ = send(&tx, EngineEvent::Completion { content: last_text, iteration }).await;
            }
        }
    }
}

async fn send(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) -> Result<(), ()> {
    tx.send(event).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::stub::{StubAdapter, StubTurn};
    use serde_json::json;

    fn engine_with(
        adapter: StubAdapter,
        repo: &std::path::Path,
    ) -> (Arc<TaskEngine>, Arc<TaskIndex>) {
        let coordinator = Arc::new(ToolCoordinator::with_default_tools());
        let store = Arc::new(ConversationStore::new(repo));
        let index = Arc::new(TaskIndex::load(repo).unwrap());
        (
            Arc::new(TaskEngine::new(coordinator, store, index.clone(), Arc::new(adapter))),
            index,
        )
    }

    fn default_ai_config() -> AiConfig {
        AiConfig {
            provider: "stub".to_string(),
            model: "stub-1".to_string(),
            temperature: 1.0,
            max_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_iterations: 10,
            max_context_tokens: Some(128_000),
        }
    }

    #[tokio::test]
    async fn fresh_task_one_tool_cycle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();

        let adapter = StubAdapter::new(vec![
            StubTurn::ToolCall { name: "read_file".to_string(), params: json!({ "file_path": "README.md" }) },
            StubTurn::Text("It says hello.".to_string()),
        ]);
        let (engine, index) = engine_with(adapter, dir.path());

        let (task_id, _cancel, mut rx) = engine
            .run(RunRequest {
                user_input: "show me the readme".to_string(),
                repo_root: dir.path().to_path_buf(),
                task_id: None,
                ai_config: default_ai_config(),
            })
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], EngineEvent::TaskStarted { is_new: true, .. }));
        assert!(matches!(events.last().unwrap(), EngineEvent::Completion { .. }));
        assert!(events.iter().any(|e| matches!(e, EngineEvent::ToolCallsDetected { .. })));

        let records = index.search(None, false, crate::conversation::SortBy::Newest, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task_id, task_id);
        assert_eq!(records[0].description, "show me the readme");
    }

    #[tokio::test]
    async fn path_guard_failure_is_a_tool_result_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = StubAdapter::new(vec![
            StubTurn::ToolCall { name: "read_file".to_string(), params: json!({ "file_path": "../../etc/passwd" }) },
            StubTurn::Text("couldn't read that.".to_string()),
        ]);
        let (engine, _index) = engine_with(adapter, dir.path());

        let (_task_id, _cancel, mut rx) = engine
            .run(RunRequest {
                user_input: "read a forbidden path".to_string(),
                repo_root: dir.path().to_path_buf(),
                task_id: None,
                ai_config: default_ai_config(),
            })
            .unwrap();

        let mut saw_failed_tool = false;
        while let Some(event) = rx.recv().await {
            if let EngineEvent::ToolExecutionCompleted { result, .. } = event {
                if !result.success {
                    saw_failed_tool = true;
                    assert!(result.error.unwrap().contains("InvalidPath"));
                }
            }
        }
        assert!(saw_failed_tool);
    }

    #[tokio::test]
    async fn concurrent_same_task_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = StubAdapter::new(vec![StubTurn::Text("done".to_string())]);
        let (engine, _index) = engine_with(adapter, dir.path());

        let (task_id, _cancel, _rx) = engine
            .run(RunRequest {
                user_input: "first".to_string(),
                repo_root: dir.path().to_path_buf(),
                task_id: None,
                ai_config: default_ai_config(),
            })
            .unwrap();

        let err = engine.run(RunRequest {
            user_input: "second".to_string(),
            repo_root: dir.path().to_path_buf(),
            task_id: Some(task_id),
            ai_config: default_ai_config(),
        });
        assert!(matches!(err, Err(CoreError::Busy(_))));
    }
}
