//! 查询网关：把一条文本查询交给运行时，消费事件流直到终止事件并取出回复文本
//!
//! 只读到第一个终止事件为止，不排空事件流；运行时错误原样向上传播，网关自身不重试。

use std::time::Duration;

use futures_util::StreamExt;

use crate::core::AgentError;
use crate::react::{AgentRuntime, Content, Event};

/// 终止事件既无文本也无上报标记时的回复
pub const NO_FINAL_RESPONSE: &str = "Agent did not produce a final response.";

/// 上报事件未携带错误信息时使用
const NO_ESCALATION_MESSAGE: &str = "No specific message.";

/// 日志中事件内容预览的最大字符数
const EVENT_PREVIEW_CHARS: usize = 200;

/// 把查询文本包装为运行时输入：user 角色、单个文本片段
pub fn format_query(text: &str) -> Content {
    Content::user_text(text)
}

/// 从终止事件取回复：首个文本片段 > 上报信息 > 固定兜底
pub fn final_response_text(event: &Event) -> String {
    if let Some(text) = event.content.as_ref().and_then(|c| c.first_text()) {
        return text.to_string();
    }
    if event.actions.escalate {
        return format!(
            "Agent escalated: {}",
            event.error_message.as_deref().unwrap_or(NO_ESCALATION_MESSAGE)
        );
    }
    NO_FINAL_RESPONSE.to_string()
}

/// 发送查询并等待终止事件
pub async fn ask(
    query: &str,
    runtime: &dyn AgentRuntime,
    user_id: &str,
    session_id: &str,
) -> Result<String, AgentError> {
    tracing::info!(user_id, session_id, query = %query, "User query");
    let mut events = runtime.run(user_id, session_id, format_query(query)).await?;

    while let Some(event) = events.next().await {
        let event = event?;
        tracing::info!(
            author = %event.author,
            is_final = event.is_final_response(),
            content = %event.preview(EVENT_PREVIEW_CHARS),
            "Event"
        );
        if event.is_final_response() {
            let response = final_response_text(&event);
            tracing::info!(response = %response, "Agent response");
            return Ok(response);
        }
    }
    tracing::warn!(session_id, "event stream ended without a final event");
    Ok(NO_FINAL_RESPONSE.to_string())
}

/// 带总超时的 ask；超时返回 QueryTimeout
pub async fn ask_with_timeout(
    query: &str,
    runtime: &dyn AgentRuntime,
    user_id: &str,
    session_id: &str,
    limit: Duration,
) -> Result<String, AgentError> {
    tokio::time::timeout(limit, ask(query, runtime, user_id, session_id))
        .await
        .map_err(|_| AgentError::QueryTimeout(limit))?
}
