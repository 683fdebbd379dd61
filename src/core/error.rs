//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt（把提示喂回模型）或 Abort。

use std::time::Duration;

use thiserror::Error;

/// 运行过程中跨模块传播的错误（模型、解析、工具、会话、生成循环等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// 生成/校验循环超过迭代上限（PRODUCE/VALIDATE 往返次数）
    #[error("Generation loop exceeded {0} iterations without completing")]
    MaxIterationsExceeded(usize),

    /// 单次查询内模型调用步数超过上限
    #[error("Agent exceeded {0} steps in a single query")]
    MaxStepsExceeded(usize),

    #[error("Query timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    /// 生成循环层面的致命条件：运行时将其转为终止性 escalation 事件，而非传输错误
    pub fn is_loop_fatal(&self) -> bool {
        matches!(self, AgentError::MaxIterationsExceeded(_))
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让模型重试（如 JSON 格式错误、调用了不存在的工具）
    RetryWithPrompt(String),
    /// 终止当前查询
    Abort,
}
