//! Access logging middleware, grounded on the teacher's
//! `access_log_middleware`: records method/path/status/duration for every
//! request into `AppState`'s bounded ring buffer (SPEC_FULL.md §B).

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

pub async fn access_log_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status_code = response.status().as_u16();

    log::info!("{} {} {} {}ms", method, path, status_code, duration.as_millis());
    state.add_access_log(method, path, status_code, duration.as_millis() as u64, client_ip);

    response
}
