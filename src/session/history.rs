//! 会话对话历史
//!
//! 以“轮”为单位保存：每轮从一条用户查询开始，之后是该轮内模型输出、Observation、恢复提示等。
//! 一轮内可能有几十条消息（多次工具调用），因此只在新一轮开始时整轮丢弃最旧的轮次，
//! 进行中的那一轮（包括它的用户查询）始终完整保留。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 最近 N 轮查询的完整消息
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    /// 每轮第一条消息在 messages 中的下标
    turn_starts: Vec<usize>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            turn_starts: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// 以用户查询开启新一轮，并丢弃超出 max_turns 的最旧轮次
    pub fn begin_turn(&mut self, query: Message) {
        self.turn_starts.push(self.messages.len());
        self.messages.push(query);
        self.prune();
    }

    /// 追加到当前轮；轮内从不剪枝
    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn turns(&self) -> usize {
        self.turn_starts.len()
    }

    fn prune(&mut self) {
        if self.turn_starts.len() <= self.max_turns {
            return;
        }
        let dropped = self.turn_starts.len() - self.max_turns;
        let cut = self.turn_starts[dropped];
        self.messages.drain(..cut);
        self.turn_starts.drain(..dropped);
        for start in &mut self.turn_starts {
            *start -= cut;
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_drops_whole_turns() {
        let mut memory = ConversationMemory::new(1);
        memory.begin_turn(Message::user("a"));
        memory.push(Message::assistant("b"));
        memory.begin_turn(Message::user("c"));
        assert_eq!(memory.turns(), 1);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.messages()[0].content, "c");
    }

    #[test]
    fn test_long_tool_turn_keeps_its_query() {
        let mut memory = ConversationMemory::new(2);
        memory.begin_turn(Message::user("old query"));
        memory.push(Message::assistant("old answer"));
        memory.begin_turn(Message::user("build my page"));
        for i in 0..24 {
            memory.push(Message::assistant(format!("{{\"tool\": \"web_search\", \"args\": {{\"query\": \"q{i}\"}}}}")));
            memory.push(Message::user(format!("Observation from web_search: {i}")));
        }
        assert_eq!(memory.turns(), 2);
        assert_eq!(memory.messages()[0].content, "old query");
        assert_eq!(memory.len(), 51);
        assert_eq!(memory.messages()[2], Message::user("build my page"));

        // 下一轮开始时才整轮丢弃最旧的一轮
        memory.begin_turn(Message::user("thanks"));
        assert_eq!(memory.turns(), 2);
        assert_eq!(memory.messages()[0].content, "build my page");
        assert_eq!(memory.len(), 50);
    }

    #[test]
    fn test_empty_memory() {
        let memory = ConversationMemory::new(4);
        assert!(memory.is_empty());
        assert_eq!(memory.turns(), 0);
    }
}
