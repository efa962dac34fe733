//! Thin Axum router over the core (SPEC_FULL.md §A.6): exactly the five
//! endpoints of spec §6 plus `/health`. Grounded on the teacher's
//! `create_router` (route grouping, CORS, access-log middleware
//! layering) — the auth/Bearer-token layer and the admin/tools/
//! changes/latest/jira route groups have no counterpart here and are
//! dropped.

use crate::api::{handlers, middleware::access_log_middleware};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/chat/smart-chat-v2", post(handlers::chat_handler))
        .route("/sessions/list", get(handlers::list_handler))
        .route("/sessions/load/:task_id", get(handlers::load_handler))
        .route("/sessions/toggle-favorite/:task_id", post(handlers::toggle_favorite_handler))
        .route("/sessions/delete/:task_id", post(handlers::delete_handler))
        .layer(middleware::from_fn_with_state(state.clone(), access_log_middleware))
        .layer(cors)
        .with_state(state)
}
