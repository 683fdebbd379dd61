//! Creator：由模型驱动的生产者
//!
//! 空文档直接给出确定性骨架（不调用模型）；有指令时请模型把指令合入文档并取回完整 HTML。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::render_instruction;
use crate::builder::coordinator::Producer;
use crate::builder::html::{extract_html_document, render_skeleton};
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::react::planner::Planner;
use crate::session::{Message, StateRecord};

pub struct CreatorProducer {
    planner: Planner,
    instruction: String,
}

impl CreatorProducer {
    pub fn new(llm: Arc<dyn LlmClient>, instruction: impl Into<String>) -> Self {
        Self {
            planner: Planner::new(llm),
            instruction: instruction.into(),
        }
    }
}

#[async_trait]
impl Producer for CreatorProducer {
    async fn produce(&self, state: &StateRecord) -> Result<String, AgentError> {
        let current = state.generated_code.as_deref().unwrap_or("").trim();
        if current.is_empty() {
            tracing::info!(sections = state.section_plan.len(), "Creator: rendering skeleton");
            return Ok(render_skeleton(state));
        }
        let Some(instruct) = state.instruct.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(current.to_string());
        };

        let system = render_instruction(&self.instruction, state);
        let reply = self
            .planner
            .plan_with_system(&[Message::user(instruct)], &system)
            .await?;
        match extract_html_document(&reply) {
            Some(doc) => Ok(doc),
            None => {
                tracing::warn!(reply_len = reply.len(), "Creator reply had no HTML document, keeping current code");
                Ok(current.to_string())
            }
        }
    }
}
