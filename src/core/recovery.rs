//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供运行时决定是把提示喂回模型重试，还是终止本次查询。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将模型可自行纠正的错误映射为重试提示，其余一律终止
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous tool call was not valid JSON: {raw}. \
                 To call a tool, output exactly one JSON object and nothing else, \
                 shaped as {{\"tool\": \"<name>\", \"args\": {{...}}}}."
            )),
            AgentError::HallucinatedTool(name) => RecoveryAction::RetryWithPrompt(format!(
                "Tool '{name}' is not available to you. Use only the tools listed in your instructions, \
                 or answer in plain text."
            )),
            AgentError::UnknownAgent(name) => RecoveryAction::RetryWithPrompt(format!(
                "Agent '{name}' is not a valid transfer target. Transfer only to the agents listed in your instructions."
            )),
            AgentError::ToolExecutionFailed(msg) => {
                RecoveryAction::RetryWithPrompt(format!("The tool call failed: {msg}"))
            }
            AgentError::ToolTimeout(tool) => RecoveryAction::RetryWithPrompt(format!(
                "Tool '{tool}' timed out. Continue without it or try a simpler request."
            )),
            _ => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_json_parse_error() {
        let engine = RecoveryEngine::new();
        let err = AgentError::JsonParseError("invalid json".to_string());
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => {
                assert!(msg.contains("JSON"));
                assert!(msg.contains("invalid json"));
            }
            _ => panic!("Expected RetryWithPrompt"),
        }
    }

    #[test]
    fn test_recovery_hallucinated_tool() {
        let engine = RecoveryEngine::new();
        let err = AgentError::HallucinatedTool("fake_tool".to_string());
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => assert!(msg.contains("fake_tool")),
            _ => panic!("Expected RetryWithPrompt"),
        }
    }

    #[test]
    fn test_recovery_tool_timeout() {
        let engine = RecoveryEngine::new();
        let err = AgentError::ToolTimeout("web_search".to_string());
        assert!(matches!(engine.handle(&err), RecoveryAction::RetryWithPrompt(_)));
    }

    #[test]
    fn test_recovery_llm_error_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::LlmError("quota exceeded".to_string());
        assert!(matches!(engine.handle(&err), RecoveryAction::Abort));
    }

    #[test]
    fn test_recovery_loop_fatal_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::MaxIterationsExceeded(20);
        assert!(err.is_loop_fatal());
        assert!(matches!(engine.handle(&err), RecoveryAction::Abort));
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::new();
        assert!(matches!(engine.handle(&AgentError::Cancelled), RecoveryAction::Abort));
    }
}
