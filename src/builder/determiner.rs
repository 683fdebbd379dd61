//! Determiner：由模型驱动的校验者
//!
//! 模型调用 exit_loop 视为完成；回复文本即下一条指令；格式错误或空回复交给协调器补默认指令。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{render_instruction, DETERMINER_AGENT};
use crate::builder::coordinator::{Validator, Verdict};
use crate::builder::html::pending_sections;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::react::events::EventActions;
use crate::react::planner::{parse_llm_output, Planner, PlannerOutput};
use crate::session::{Message, StateRecord};
use crate::tools::{ToolContext, ToolExecutor, EXIT_LOOP_TOOL_NAME};

pub struct DeterminerValidator {
    planner: Planner,
    instruction: String,
    tools: Arc<ToolExecutor>,
}

impl DeterminerValidator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        instruction: impl Into<String>,
        tools: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            planner: Planner::new(llm),
            instruction: instruction.into(),
            tools,
        }
    }

    fn no_instruction() -> Verdict {
        Verdict::Continue {
            instruct: String::new(),
        }
    }
}

#[async_trait]
impl Validator for DeterminerValidator {
    async fn validate(&self, state: &mut StateRecord) -> Result<Verdict, AgentError> {
        let pending = pending_sections(
            state.generated_code.as_deref().unwrap_or(""),
            &state.section_plan,
        );
        let system = render_instruction(&self.instruction, state);
        let prompt = if pending.is_empty() {
            "Every planned section has content. Check the document and decide.".to_string()
        } else {
            format!(
                "Sections still empty: {}. Check the document and decide.",
                pending.join(", ")
            )
        };
        let reply = self
            .planner
            .plan_with_system(&[Message::user(prompt)], &system)
            .await?;

        match parse_llm_output(&reply) {
            Ok(PlannerOutput::Response(text)) => Ok(Verdict::Continue { instruct: text }),
            Ok(PlannerOutput::ToolCall(call)) if call.tool == EXIT_LOOP_TOOL_NAME => {
                let mut actions = EventActions::default();
                let mut ctx = ToolContext::new(DETERMINER_AGENT, state, &mut actions);
                self.tools.execute(&call.tool, call.args, &mut ctx).await?;
                if actions.escalate {
                    Ok(Verdict::Complete)
                } else {
                    Ok(Self::no_instruction())
                }
            }
            Ok(PlannerOutput::ToolCall(call)) => {
                tracing::warn!(tool = %call.tool, "Determiner called a tool it does not own");
                Ok(Self::no_instruction())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Determiner reply unparsable");
                Ok(Self::no_instruction())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::{ExitLoopTool, ToolRegistry};

    fn tools() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(ExitLoopTool);
        Arc::new(ToolExecutor::new(registry, 5))
    }

    fn state() -> StateRecord {
        let mut state = StateRecord::default();
        state.section_plan = [("hero", "Banner"), ("footer", "Contact")]
            .into_iter()
            .collect();
        state.generated_code = Some("<section data-section=\"hero\"></section>".into());
        state
    }

    #[tokio::test]
    async fn test_exit_loop_call_completes() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"tool": "exit_loop", "args": {}}"#]));
        let determiner = DeterminerValidator::new(llm, "{section_plan}", tools());
        let verdict = determiner.validate(&mut state()).await.unwrap();
        assert_eq!(verdict, Verdict::Complete);
    }

    #[tokio::test]
    async fn test_text_is_next_instruction() {
        let llm = Arc::new(ScriptedLlmClient::new(["Add the 'hero' section with a banner."]));
        let determiner = DeterminerValidator::new(llm.clone(), "{section_plan}", tools());
        let verdict = determiner.validate(&mut state()).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Continue {
                instruct: "Add the 'hero' section with a banner.".into()
            }
        );
        let prompt = &llm.requests()[0][1].content;
        assert!(prompt.contains("hero, footer"));
    }

    #[tokio::test]
    async fn test_foreign_tool_and_garbage_yield_empty_instruction() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "update_problem_config_tool", "args": {"key": "Page Title", "value": "x"}}"#,
            r#"{"tool": "exit_loop", "args": {}"#,
        ]));
        let determiner = DeterminerValidator::new(llm, "x", tools());
        let mut st = state();
        assert_eq!(
            determiner.validate(&mut st).await.unwrap(),
            Verdict::Continue {
                instruct: String::new()
            }
        );
        assert!(st.problem_config.page_title.is_none());
        assert_eq!(
            determiner.validate(&mut st).await.unwrap(),
            Verdict::Continue {
                instruct: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_llm_error_propagates() {
        let llm = Arc::new(ScriptedLlmClient::default());
        llm.push_error("quota exceeded");
        let determiner = DeterminerValidator::new(llm, "x", tools());
        let err = determiner.validate(&mut state()).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmError(msg) if msg == "quota exceeded"));
    }
}
