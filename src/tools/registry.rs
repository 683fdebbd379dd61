//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并统一转 AgentError。
//! 与纯函数式工具不同，这里的工具通过 ToolContext 读写当前会话状态与事件动作（escalate / transfer）。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::react::events::EventActions;
use crate::session::StateRecord;

/// 工具执行上下文：调用方智能体、可变会话状态、本步事件动作
pub struct ToolContext<'a> {
    pub agent_name: &'a str,
    pub state: &'a mut StateRecord,
    pub actions: &'a mut EventActions,
}

impl<'a> ToolContext<'a> {
    pub fn new(
        agent_name: &'a str,
        state: &'a mut StateRecord,
        actions: &'a mut EventActions,
    ) -> Self {
        Self {
            agent_name,
            state,
            actions,
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；返回值作为 function response 回传给模型
    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>（有序，保证 prompt 中工具目录稳定）
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Value, String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args, ctx).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 只取给定名字的工具，生成 prompt 中的工具目录 JSON（name / description / parameters）
    pub fn schema_json_for(&self, names: &[String]) -> String {
        let tools: Vec<Value> = names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
