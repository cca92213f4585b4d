mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::*;
use quiz_chain_solver::api;
use quiz_chain_solver::orchestrator::AppState;
use quiz_chain_solver::{Config, StepPolicy, Verdict};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        student_secret: "s3cret".to_string(),
        ..Config::default()
    }
}

fn test_state(fetcher: Arc<ScriptedFetcher>) -> Arc<AppState> {
    let runner = runner(
        fetcher,
        ScriptedBackend::new(),
        ScriptedSubmitter::with_verdicts(vec![Verdict::correct(None)]),
        StepPolicy::default(),
    );
    Arc::new(AppState::new(test_config(), Arc::new(runner)))
}

fn post_json(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = api::router(test_state(ScriptedFetcher::new()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({"status": "healthy", "service": "llm-analysis-quiz"})
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = api::router(test_state(ScriptedFetcher::new()));

    let response = app.oneshot(post_json("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        json!({"detail": "Invalid JSON payload"})
    );
}

#[tokio::test]
async fn test_missing_fields_is_bad_request() {
    let app = api::router(test_state(ScriptedFetcher::new()));

    let response = app
        .oneshot(post_json(json!({"email": "a@b.c"}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_secret_is_forbidden() {
    let fetcher = ScriptedFetcher::new();
    let app = api::router(test_state(fetcher.clone()));

    let body = json!({"email": "a@b.c", "secret": "nope", "url": U1});
    let response = app.oneshot(post_json(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await, json!({"detail": "Invalid secret"}));
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_empty_url_is_bad_request() {
    let app = api::router(test_state(ScriptedFetcher::new()));

    let body = json!({"email": "a@b.c", "secret": "s3cret", "url": "  "});
    let response = app.oneshot(post_json(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_accepted_request_starts_chain() {
    let fetcher = ScriptedFetcher::new();
    let app = api::router(test_state(fetcher.clone()));

    let body = json!({"email": "a@b.c", "secret": "s3cret", "url": U1});
    let response = app.oneshot(post_json(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({"status": "received", "message": "Quiz processing started", "url": U1})
    );

    // 链路在后台运行
    for _ in 0..100 {
        if !fetcher.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fetcher.calls(), vec![U1]);
}

#[tokio::test]
async fn test_spawned_chain_reports_status() {
    let state = test_state(ScriptedFetcher::new());

    let handle = state.spawn_chain(identity(), U1.to_string());
    let report = handle.await.unwrap().unwrap();

    assert_eq!(report.status, quiz_chain_solver::FinalStatus::Solved);
    assert_eq!(report.submissions, 1);
}
