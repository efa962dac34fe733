//! The five contractual endpoints of spec §6, plus `/health`. Thin
//! pass-through handlers: all decision logic lives in the Task Engine,
//! Tool Coordinator, and stores (SPEC_FULL.md §A.6) — grounded on the
//! teacher's `health_handler`/`access_logs_handler` shape, generalized
//! from Jira/Gemini-specific bodies to the session/chat contract here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use crate::adapter::AiConfig;
use crate::conversation::{SortBy, TaskMetadata};
use crate::engine::RunRequest;
use crate::error::CoreError;
use crate::message::Message;
use crate::state::AppState;

// ============ Shared response types ============

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: CoreError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        CoreError::InvalidPath(_) | CoreError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Busy(_) => StatusCode::CONFLICT,
        CoreError::Corrupt(_) | CoreError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

// ============ POST /chat/smart-chat-v2 ============

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub repository_path: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub max_context_tokens: Option<u64>,
}

/// Run (or resume) a task and stream its events back as SSE, per spec §6
/// `POST /chat/smart-chat-v2`.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorResponse>)> {
    let repo_root = PathBuf::from(&request.repository_path);
    let context = state.repo_context(&repo_root).map_err(error_response)?;

    let engine_config = state.engine_config();
    let ai_config = AiConfig {
        provider: request.provider.unwrap_or_else(|| "unconfigured".to_string()),
        model: request.model.unwrap_or_else(|| "unconfigured".to_string()),
        temperature: request.temperature.unwrap_or(1.0),
        max_tokens: request.max_tokens,
        top_p: request.top_p,
        frequency_penalty: request.frequency_penalty,
        presence_penalty: request.presence_penalty,
        max_iterations: request.max_iterations.unwrap_or(engine_config.max_iterations),
        max_context_tokens: Some(request.max_context_tokens.unwrap_or(engine_config.max_context_tokens)),
    };

    let (_task_id, _cancel, rx) = context
        .engine
        .run(RunRequest {
            user_input: request.message,
            repo_root,
            task_id: request.task_id,
            ai_config,
        })
        .map_err(error_response)?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(payload))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ============ GET /sessions/list ============

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub repository_path: String,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub favorites_only: Option<bool>,
    #[serde(default)]
    pub sort_by: Option<SortBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub tasks: Vec<TaskMetadata>,
    pub total_count: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo_root = PathBuf::from(&query.repository_path);
    let context = state.repo_context(&repo_root).map_err(error_response)?;

    let tasks = context.index.search(
        query.search_query.as_deref(),
        query.favorites_only.unwrap_or(false),
        query.sort_by.unwrap_or(SortBy::Newest),
        query.limit.unwrap_or(100),
    );
    let stats = context.index.stats();

    Ok(Json(ListResponse {
        tasks,
        total_count: stats.total_count,
        total_tokens: stats.total_tokens,
        total_cost: stats.total_cost,
    }))
}

// ============ GET /sessions/load/{task_id} ============

#[derive(Debug, Deserialize)]
pub struct RepoPathQuery {
    pub repository_path: String,
}

#[derive(Serialize)]
pub struct LoadResponse {
    pub task_id: String,
    pub task: String,
    pub created_at: f64,
    pub last_updated: f64,
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub message_count: usize,
}

pub async fn load_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Query(query): Query<RepoPathQuery>,
) -> Result<Json<LoadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo_root = PathBuf::from(&query.repository_path);
    let context = state.repo_context(&repo_root).map_err(error_response)?;

    let metadata = context
        .index
        .get(&task_id)
        .ok_or_else(|| error_response(CoreError::NotFound(format!("task '{task_id}'"))))?;
    let messages = context.store.load(&task_id).await.map_err(error_response)?;

    Ok(Json(LoadResponse {
        task_id: metadata.task_id,
        task: metadata.description,
        created_at: metadata.created_at,
        last_updated: metadata.last_updated,
        provider: metadata.provider,
        model: metadata.model,
        message_count: messages.len(),
        messages,
    }))
}

// ============ POST /sessions/toggle-favorite/{task_id} ============

#[derive(Debug, Deserialize)]
pub struct RepoBody {
    pub repository_path: String,
}

#[derive(Serialize)]
pub struct ToggleFavoriteResponse {
    pub success: bool,
    pub is_favorited: bool,
}

pub async fn toggle_favorite_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(body): Json<RepoBody>,
) -> Result<Json<ToggleFavoriteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo_root = PathBuf::from(&body.repository_path);
    let context = state.repo_context(&repo_root).map_err(error_response)?;

    let is_favorited = context.index.toggle_favorite(&task_id).map_err(error_response)?;
    context.index.save().map_err(error_response)?;

    Ok(Json(ToggleFavoriteResponse { success: true, is_favorited }))
}

// ============ POST /sessions/delete/{task_id} ============

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Json(body): Json<RepoBody>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo_root = PathBuf::from(&body.repository_path);
    let context = state.repo_context(&repo_root).map_err(error_response)?;

    // Index and store deletion are always issued as a pair (spec §4.E):
    // delete the index row first so a reader can't observe a row pointing
    // at a directory that's mid-removal, then remove the directory itself.
    context.index.delete(&task_id);
    let index_saved = context.index.save();
    let store_deleted = context.store.delete(&task_id).await;

    match (index_saved, store_deleted) {
        (Ok(()), Ok(())) => Ok(Json(DeleteResponse {
            success: true,
            message: format!("task '{task_id}' deleted"),
        })),
        (Err(e), _) | (_, Err(e)) => Err(error_response(e)),
    }
}
