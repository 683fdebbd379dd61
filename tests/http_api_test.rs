//! HTTP 接口测试（tower oneshot，不监听端口）

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use orion::agents::AgentTree;
use orion::config::GenerationSection;
use orion::llm::ScriptedLlmClient;
use orion::react::LlmRuntime;
use orion::server::{router, AppState};
use orion::session::{MemorySessionStore, SessionKey, SessionStore};
use orion::tools::{ToolExecutor, ToolRegistry};

async fn app(llm: Arc<ScriptedLlmClient>, session_id: &str) -> Router {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
    store
        .get_or_create(SessionKey::new("orion", "user_1", "session_001"))
        .await;
    let runtime = LlmRuntime::new(
        "orion",
        store,
        AgentTree::builtin(),
        llm,
        Arc::new(ToolExecutor::new(ToolRegistry::new(), 5)),
        GenerationSection::default(),
    );
    router(Arc::new(AppState {
        runtime: Arc::new(runtime),
        user_id: "user_1".to_string(),
        session_id: session_id.to_string(),
        port: 8000,
        query_timeout: Duration::from_secs(10),
    }))
}

fn query(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/agent/query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_reports_port() {
    let app = app(Arc::new(ScriptedLlmClient::default()), "session_001").await;
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Server is running at port: 8000!");
}

#[tokio::test]
async fn test_query_success() {
    let llm = Arc::new(ScriptedLlmClient::new(["Hi! What page would you like?"]));
    let app = app(llm, "session_001").await;
    let resp = app.oneshot(query(r#"{"prompt": "hello"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["response"], "Hi! What page would you like?");
}

#[tokio::test]
async fn test_runtime_failure_is_500_with_detail() {
    let llm = Arc::new(ScriptedLlmClient::default());
    llm.push_error("quota exceeded");
    let app = app(llm, "session_001").await;
    let resp = app.oneshot(query(r#"{"prompt": "hello"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["detail"], "LLM error: quota exceeded");
}

#[tokio::test]
async fn test_unknown_session_is_500() {
    let app = app(Arc::new(ScriptedLlmClient::default()), "missing").await;
    let resp = app.oneshot(query(r#"{"prompt": "hello"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Session not found"));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = app(Arc::new(ScriptedLlmClient::default()), "session_001").await;
    let resp = app.oneshot(query(r#"{"text": 1}"#)).await.unwrap();
    assert!(resp.status().is_client_error());
}
