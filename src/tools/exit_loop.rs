//! exit_loop：完成信号
//!
//! 在当前事件动作上置 escalate，宿主循环据此停止迭代，generated_code 视为最终结果。

use async_trait::async_trait;
use serde_json::Value;

use crate::react::events::EventActions;
use crate::tools::{Tool, ToolContext};

pub const EXIT_LOOP_TOOL_NAME: &str = "exit_loop";

/// 置位 escalate；返回本次调用是否改变了标志（重复调用无额外效果）
pub fn signal_completion(actions: &mut EventActions) -> bool {
    if actions.escalate {
        return false;
    }
    actions.escalate = true;
    true
}

/// 校验者在所有分段都已生成后调用
pub struct ExitLoopTool;

#[async_trait]
impl Tool for ExitLoopTool {
    fn name(&self) -> &str {
        EXIT_LOOP_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Call this ONLY when every planned section is present in the generated code. Stops the build loop. Args: {}."
    }

    async fn execute(&self, _args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, String> {
        let changed = signal_completion(ctx.actions);
        tracing::info!(agent = ctx.agent_name, changed, "exit_loop triggered");
        Ok(serde_json::json!({}))
    }
}
