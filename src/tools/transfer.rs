//! transfer_to_agent：把对话控制权交给另一个智能体
//!
//! 工具本身只记录目标名；合法性（是否为子智能体或父智能体）由运行时在处理事件时校验。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::{Tool, ToolContext};

pub const TRANSFER_TOOL_NAME: &str = "transfer_to_agent";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TransferArgs {
    /// 目标智能体名，例如 "requirement_gatherer"
    pub agent_name: String,
}

pub struct TransferTool;

#[async_trait]
impl Tool for TransferTool {
    fn name(&self) -> &str {
        TRANSFER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Hand the conversation over to another agent. Args: {\"agent_name\": \"<name>\"}."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<TransferArgs>()
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, String> {
        let parsed: TransferArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid transfer args: {e}"))?;
        let target = parsed.agent_name.trim();
        if target.is_empty() {
            return Err("agent_name must not be empty".to_string());
        }
        ctx.actions.transfer_to_agent = Some(target.to_string());
        Ok(serde_json::json!({ "transferred_to": target }))
    }
}
