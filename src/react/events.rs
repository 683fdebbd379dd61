//! 运行时事件：智能体运行过程中按顺序产出，查询网关消费到终止事件为止

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// 内容角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRole {
    User,
    Model,
}

/// 内容片段
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

/// 一条消息内容：角色 + 若干片段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// 第一个文本片段
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// 所有文本片段拼接
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// 事件附带的动作
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventActions {
    /// 终止外层循环（生成循环完成或因错误上报）
    pub escalate: bool,
    /// 控制权转交目标
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_to_agent: Option<String>,
    /// 本事件写入的状态槽位
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub state_delta: Map<String, Value>,
}

/// 运行时事件
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    /// "user" 或智能体名
    pub author: String,
    pub content: Option<Content>,
    pub actions: EventActions,
    pub error_message: Option<String>,
    /// 本轮是否到此结束
    pub turn_complete: bool,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            content: None,
            actions: EventActions::default(),
            error_message: None,
            turn_complete: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_actions(mut self, actions: EventActions) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn complete(mut self) -> Self {
        self.turn_complete = true;
        self
    }

    /// 是否为本轮的终止事件
    pub fn is_final_response(&self) -> bool {
        self.turn_complete
    }

    /// 日志用的内容预览
    pub fn preview(&self, max_chars: usize) -> String {
        let raw = match &self.content {
            Some(content) => serde_json::to_string(&content.parts).unwrap_or_default(),
            None => "None".to_string(),
        };
        if raw.chars().count() > max_chars {
            format!("{}...", raw.chars().take(max_chars).collect::<String>())
        } else {
            raw
        }
    }
}
