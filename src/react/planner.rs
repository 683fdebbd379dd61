//! Planner：调用模型并解析 Tool Call
//!
//! 模型回复要么是直接回复文本，要么是 JSON Tool Call；parse_llm_output 从文本中提取 JSON 并区分两者。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::session::Message;

/// 模型返回的 Tool Call（{"tool": "update_problem_config_tool", "args": {...}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Planner 输出
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    /// 文本回复
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 提取 ```json 围栏内或首个 `{` 到末个 `}` 之间的 JSON 文本
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 解析模型输出：以 JSON 对象开头（或为 ```json 围栏）且含非空 tool 字段时为 ToolCall，否则为文本回复。
/// 文本中间夹带的花括号（例如 HTML/CSS）不视为 Tool Call。
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();
    let looks_like_call = trimmed.starts_with('{') || trimmed.starts_with("```json");
    if !looks_like_call {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    }
    let Some(json_str) = extract_json_block(trimmed) else {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    };

    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;
    if value.get("tool").is_none() {
        // 纯 JSON 数据（例如 section_plan 输出），按文本处理
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    }
    let parsed: ToolCall = serde_json::from_value(value)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    if parsed.tool.is_empty() {
        Ok(PlannerOutput::Response(trimmed.to_string()))
    } else {
        Ok(PlannerOutput::ToolCall(parsed))
    }
}

/// Planner：持有 LLM，拼接 system + messages 后调用
pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn plan_with_system(
        &self,
        messages: &[Message],
        system: &str,
    ) -> Result<String, AgentError> {
        let mut full_messages = vec![Message::system(system.to_string())];
        full_messages.extend(messages.iter().cloned());
        tracing::debug!(messages = full_messages.len(), "planner request");
        let reply = self
            .llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::LlmError)?;
        tracing::debug!(reply = %reply, "planner reply");
        Ok(reply)
    }
}
