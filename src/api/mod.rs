//! 对外 HTTP 接口

pub mod quiz;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::orchestrator::AppState;

/// 构建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(quiz::receive_quiz))
        .route("/health", get(quiz::health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}
