//! 题目接收接口

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::orchestrator::{AppState, Identity};

/// 触发一条链路的请求体
#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

/// `POST /`
pub async fn receive_quiz(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("⚠️ 请求体不合法: {}", rejection.body_text());
            return detail(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    if request.secret != state.config.student_secret {
        warn!("⚠️ 密钥错误: {}", request.email);
        return detail(StatusCode::FORBIDDEN, "Invalid secret");
    }

    let url = request.url.trim().to_string();
    if url.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Missing quiz URL");
    }

    info!("📥 收到题目: {} ({})", url, request.email);
    let identity = Identity {
        email: request.email,
        secret: request.secret,
    };
    state.spawn_chain(identity, url.clone());

    (
        StatusCode::OK,
        Json(json!({
            "status": "received",
            "message": "Quiz processing started",
            "url": url,
        })),
    )
        .into_response()
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "llm-analysis-quiz",
    }))
}
