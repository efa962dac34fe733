//! Model Adapter interface (spec §4.H) — the only contract the Task
//! Engine depends on. Concrete providers (Anthropic, OpenAI, Gemini, ...)
//! are external collaborators; this crate only defines the seam.
//!
//! Grounded on `agent/provider.rs::AgentProvider`, slimmed from a trait
//! that owned the whole reasoning loop down to the single `send`
//! capability spec §4.H names — the Task Engine now owns the loop.

use crate::error::CoreError;
use crate::message::Message;
use crate::tools::ToolSpec;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Per-request generation parameters (spec §6 configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    /// 0 means unbounded.
    #[serde(default)]
    pub max_iterations: u32,
    #[serde(default)]
    pub max_context_tokens: Option<u64>,
}

fn default_temperature() -> f32 {
    1.0
}

/// One event in the stream a [`ModelAdapter::send`] call produces.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    TextFragment(String),
    ToolCall {
        name: String,
        params: serde_json::Value,
        id: String,
    },
    Done(Usage),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
}

/// The consumed capability: turn `(messages, tool_specs)` into a stream
/// of adapter events. Implementations are external; the core treats the
/// adapter as fallible and cancellable (the engine simply stops polling
/// the stream on cancellation — no special support is required here).
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn send(
        &self,
        messages: &[Message],
        tool_specs: &[ToolSpec],
        ai_config: &AiConfig,
    ) -> Result<BoxStream<'static, AdapterEvent>, CoreError>;

    /// Ask the adapter to summarize a dropped span of messages for
    /// Context Manager compaction step 3 (spec §4.F). Optional: the
    /// Context Manager falls back to a deterministic header when this
    /// returns an error or isn't meaningfully implemented.
    async fn summarize(&self, _messages: &[Message]) -> Result<String, CoreError> {
        Err(CoreError::ModelFailure("summarization not supported by this adapter".to_string()))
    }
}

/// A `ModelAdapter` that always fails with `ModelFailure`, used as the
/// default injected into [`crate::state::AppState`] until a real provider
/// client (Anthropic, OpenAI, Gemini, ...) is wired in by the embedding
/// application. Model-provider clients are an external collaborator per
/// spec §1; this is the seam, not an implementation of one.
pub struct UnconfiguredAdapter;

#[async_trait]
impl ModelAdapter for UnconfiguredAdapter {
    async fn send(
        &self,
        _messages: &[Message],
        _tool_specs: &[ToolSpec],
        ai_config: &AiConfig,
    ) -> Result<BoxStream<'static, AdapterEvent>, CoreError> {
        Err(CoreError::ModelFailure(format!(
            "no model adapter configured for provider '{}'",
            ai_config.provider
        )))
    }
}

#[cfg(test)]
pub mod stub {
    //! A deterministic in-memory adapter used by engine tests (spec §8
    //! scenarios S1/S2/S3/S5): a scripted sequence of turns, each either
    //! a single tool call or a final text response.
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum StubTurn {
        ToolCall { name: String, params: serde_json::Value },
        Text(String),
    }

    pub struct StubAdapter {
        turns: Vec<StubTurn>,
        cursor: AtomicUsize,
    }

    impl StubAdapter {
        pub fn new(turns: Vec<StubTurn>) -> Self {
            Self {
                turns,
                cursor: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelAdapter for StubAdapter {
        async fn send(
            &self,
            _messages: &[Message],
            _tool_specs: &[ToolSpec],
            _ai_config: &AiConfig,
        ) -> Result<BoxStream<'static, AdapterEvent>, CoreError> {
            let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
            let turn = self
                .turns
                .get(idx)
                .ok_or_else(|| CoreError::ModelFailure("stub adapter exhausted".to_string()))?;

            let events = match turn {
                StubTurn::ToolCall { name, params } => vec![
                    AdapterEvent::ToolCall {
                        name: name.clone(),
                        params: params.clone(),
                        id: idx.to_string(),
                    },
                    AdapterEvent::Done(Usage::default()),
                ],
                StubTurn::Text(text) => vec![
                    AdapterEvent::TextFragment(text.clone()),
                    AdapterEvent::Done(Usage::default()),
                ],
            };
            Ok(Box::pin(stream::iter(events)))
        }
    }
}
