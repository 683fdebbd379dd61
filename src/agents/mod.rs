//! 智能体定义：具名 prompt 配置组成的树
//!
//! Base_agent 为根，下挂 requirement_gatherer、Section_Planner、Webpage_Builder（生成循环），
//! Web_info 作为 agent-tool 被根智能体调用。

pub mod loader;
pub mod prompts;
pub mod template;

use std::collections::HashMap;
use std::path::Path;

use crate::session::OutputKey;
use crate::tools::{EXIT_LOOP_TOOL_NAME, UPDATE_TOOL_NAME, WEB_SEARCH_TOOL_NAME};

pub use loader::{load_overrides, AgentOverride};
pub use template::render_instruction;

pub const ROOT_AGENT: &str = "Base_agent";
pub const GATHERER_AGENT: &str = "requirement_gatherer";
pub const WEB_INFO_AGENT: &str = "Web_info";
pub const PLANNER_AGENT: &str = "Section_Planner";
pub const BUILDER_AGENT: &str = "Webpage_Builder";
pub const CREATOR_AGENT: &str = "Creator";
pub const DETERMINER_AGENT: &str = "Determiner";

/// 把 Web_info 包装成工具时使用的工具名
pub const WEB_INFO_TOOL: &str = "web_info";

/// 智能体种类
#[derive(Debug, Clone, PartialEq)]
pub enum AgentKind {
    /// 单个模型调用者
    Llm {
        /// 可调用的工具名
        tools: Vec<String>,
        /// 以工具形式暴露的其他智能体：(工具名, 智能体名)
        agent_tools: Vec<(String, String)>,
        /// 文本输出写入的状态槽位
        output_key: Option<OutputKey>,
        /// 写完输出后把控制权交回父智能体
        returns_to_parent: bool,
    },
    /// 生成/校验循环：producer 与 validator 交替执行
    Loop { producer: String, validator: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub kind: AgentKind,
    /// 可通过 transfer_to_agent 转交的子智能体
    pub sub_agents: Vec<String>,
}

impl AgentSpec {
    fn llm(name: &str, description: &str, instruction: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instruction: instruction.to_string(),
            kind: AgentKind::Llm {
                tools: Vec::new(),
                agent_tools: Vec::new(),
                output_key: None,
                returns_to_parent: false,
            },
            sub_agents: Vec::new(),
        }
    }

    fn with_tools(mut self, names: &[&str]) -> Self {
        if let AgentKind::Llm { tools, .. } = &mut self.kind {
            tools.extend(names.iter().map(|n| n.to_string()));
        }
        self
    }

    fn with_agent_tool(mut self, tool: &str, agent: &str) -> Self {
        if let AgentKind::Llm { agent_tools, .. } = &mut self.kind {
            agent_tools.push((tool.to_string(), agent.to_string()));
        }
        self
    }

    fn with_output(mut self, key: OutputKey, back_to_parent: bool) -> Self {
        if let AgentKind::Llm {
            output_key,
            returns_to_parent,
            ..
        } = &mut self.kind
        {
            *output_key = Some(key);
            *returns_to_parent = back_to_parent;
        }
        self
    }

    fn with_sub_agents(mut self, names: &[&str]) -> Self {
        self.sub_agents = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, AgentKind::Loop { .. })
    }
}

/// 智能体树：按名查找，记录父子关系
#[derive(Debug, Clone)]
pub struct AgentTree {
    agents: HashMap<String, AgentSpec>,
    root: String,
}

impl AgentTree {
    /// 内置的网页构建智能体树
    pub fn builtin() -> Self {
        let specs = vec![
            AgentSpec::llm(ROOT_AGENT, prompts::BASE_DESCRIPTION, prompts::BASE_INSTRUCTION)
                .with_agent_tool(WEB_INFO_TOOL, WEB_INFO_AGENT)
                .with_sub_agents(&[GATHERER_AGENT, PLANNER_AGENT, BUILDER_AGENT]),
            AgentSpec::llm(
                GATHERER_AGENT,
                prompts::GATHERER_DESCRIPTION,
                prompts::GATHERER_INSTRUCTION,
            )
            .with_tools(&[UPDATE_TOOL_NAME]),
            AgentSpec::llm(
                WEB_INFO_AGENT,
                prompts::WEB_INFO_DESCRIPTION,
                prompts::WEB_INFO_INSTRUCTION,
            )
            .with_tools(&[WEB_SEARCH_TOOL_NAME])
            .with_output(OutputKey::WebInfoOutput, false),
            AgentSpec::llm(
                PLANNER_AGENT,
                prompts::PLANNER_DESCRIPTION,
                prompts::PLANNER_INSTRUCTION,
            )
            .with_output(OutputKey::SectionPlan, true),
            AgentSpec {
                name: BUILDER_AGENT.to_string(),
                description: prompts::BUILDER_DESCRIPTION.to_string(),
                instruction: String::new(),
                kind: AgentKind::Loop {
                    producer: CREATOR_AGENT.to_string(),
                    validator: DETERMINER_AGENT.to_string(),
                },
                sub_agents: Vec::new(),
            },
            AgentSpec::llm(
                CREATOR_AGENT,
                prompts::CREATOR_DESCRIPTION,
                prompts::CREATOR_INSTRUCTION,
            )
            .with_output(OutputKey::GeneratedCode, false),
            AgentSpec::llm(
                DETERMINER_AGENT,
                prompts::DETERMINER_DESCRIPTION,
                prompts::DETERMINER_INSTRUCTION,
            )
            .with_tools(&[EXIT_LOOP_TOOL_NAME])
            .with_output(OutputKey::Instruct, false),
        ];
        Self {
            agents: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            root: ROOT_AGENT.to_string(),
        }
    }

    /// 内置树 + 目录中的 TOML 覆盖
    pub fn load(dir: &Path) -> Self {
        let mut tree = Self::builtin();
        for ov in load_overrides(dir) {
            tree.apply_override(ov);
        }
        tree
    }

    /// 应用单个覆盖；未知智能体名返回 false
    pub fn apply_override(&mut self, ov: AgentOverride) -> bool {
        let Some(spec) = self.agents.get_mut(&ov.name) else {
            tracing::warn!(agent = %ov.name, "override for unknown agent skipped");
            return false;
        };
        if let Some(description) = ov.description {
            spec.description = description;
        }
        if let Some(instruction) = ov.instruction {
            spec.instruction = instruction;
        }
        tracing::info!(agent = %ov.name, "agent override applied");
        true
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.get(name)
    }

    /// 父智能体：作为子智能体、agent-tool 或循环成员被引用的那一个
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.agents
            .values()
            .find(|spec| {
                spec.sub_agents.iter().any(|s| s == name)
                    || match &spec.kind {
                        AgentKind::Llm { agent_tools, .. } => {
                            agent_tools.iter().any(|(_, a)| a == name)
                        }
                        AgentKind::Loop {
                            producer,
                            validator,
                        } => producer == name || validator == name,
                    }
            })
            .map(|spec| spec.name.as_str())
    }

    /// 允许的转交目标：子智能体与父智能体
    pub fn transfer_targets(&self, name: &str) -> Vec<String> {
        let mut targets = self
            .get(name)
            .map(|s| s.sub_agents.clone())
            .unwrap_or_default();
        if let Some(parent) = self.parent_of(name) {
            targets.push(parent.to_string());
        }
        targets
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tree_shape() {
        let tree = AgentTree::builtin();
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.root(), ROOT_AGENT);
        assert!(tree.get(BUILDER_AGENT).unwrap().is_loop());
        assert_eq!(tree.parent_of(GATHERER_AGENT), Some(ROOT_AGENT));
        assert_eq!(tree.parent_of(WEB_INFO_AGENT), Some(ROOT_AGENT));
        assert_eq!(tree.parent_of(CREATOR_AGENT), Some(BUILDER_AGENT));
        assert_eq!(tree.parent_of(ROOT_AGENT), None);
    }

    #[test]
    fn test_transfer_targets() {
        let tree = AgentTree::builtin();
        assert_eq!(
            tree.transfer_targets(ROOT_AGENT),
            vec![GATHERER_AGENT, PLANNER_AGENT, BUILDER_AGENT]
        );
        assert_eq!(tree.transfer_targets(PLANNER_AGENT), vec![ROOT_AGENT]);
    }

    #[test]
    fn test_output_keys() {
        let tree = AgentTree::builtin();
        let output_of = |name: &str| match &tree.get(name).unwrap().kind {
            AgentKind::Llm { output_key, .. } => *output_key,
            AgentKind::Loop { .. } => None,
        };
        assert_eq!(output_of(PLANNER_AGENT), Some(OutputKey::SectionPlan));
        assert_eq!(output_of(CREATOR_AGENT), Some(OutputKey::GeneratedCode));
        assert_eq!(output_of(DETERMINER_AGENT), Some(OutputKey::Instruct));
        assert_eq!(output_of(ROOT_AGENT), None);
    }

    #[test]
    fn test_override_unknown_agent_skipped() {
        let mut tree = AgentTree::builtin();
        let applied = tree.apply_override(AgentOverride {
            name: "Ghost".into(),
            description: None,
            instruction: Some("boo".into()),
        });
        assert!(!applied);
        let applied = tree.apply_override(AgentOverride {
            name: PLANNER_AGENT.into(),
            description: None,
            instruction: Some("plan {problem_config}".into()),
        });
        assert!(applied);
        assert_eq!(tree.get(PLANNER_AGENT).unwrap().instruction, "plan {problem_config}");
    }
}
