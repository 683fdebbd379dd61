//! HTTP 接口
//!
//! - `GET /`：存活检查，返回监听端口
//! - `POST /agent/query`：`{prompt}` 交给默认会话，返回 `{status: "success", response}`；失败为 500 `{detail}`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::core::AgentError;
use crate::gateway::ask_with_timeout;
use crate::react::AgentRuntime;

/// 路由共享状态
pub struct AppState {
    pub runtime: Arc<dyn AgentRuntime>,
    pub user_id: String,
    pub session_id: String,
    pub port: u16,
    pub query_timeout: Duration,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub status: &'static str,
    pub response: String,
}

/// 处理查询时的失败，统一映射为 500 `{detail}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "detail": self.to_string(),
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(root))
        .route("/agent/query", post(agent_query))
        .layer(cors)
        .with_state(state)
}

async fn root(State(state): State<Arc<AppState>>) -> Json<StatusMessage> {
    Json(StatusMessage {
        message: format!("Server is running at port: {}!", state.port),
    })
}

async fn agent_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = ask_with_timeout(
        &req.prompt,
        state.runtime.as_ref(),
        &state.user_id,
        &state.session_id,
        state.query_timeout,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "agent query failed");
        e
    })?;
    Ok(Json(QueryResponse {
        status: "success",
        response,
    }))
}
