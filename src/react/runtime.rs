//! 智能体运行时：给定会话与新输入，按顺序流式产出事件
//!
//! LlmRuntime 在后台任务中持有会话锁跑完整轮（同一会话的查询串行），事件经有界通道送出。
//! 事件流持有本轮取消令牌的 DropGuard：消费端丢弃事件流（超时、断开）即取消本轮，
//! 进行中的模型调用立即返回，会话锁随之释放。

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentTree;
use crate::config::GenerationSection;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::react::events::{Content, Event};
use crate::react::loop_::TurnRunner;
use crate::session::{SessionKey, SessionStore};
use crate::tools::ToolExecutor;

/// 事件通道缓冲
const EVENT_BUFFER: usize = 64;

/// 按产出顺序排列的运行时事件流
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, AgentError>> + Send>>;

/// 运行时接口：对指定会话处理一条输入并返回事件流
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        content: Content,
    ) -> Result<EventStream, AgentError>;
}

/// 基于模型与智能体树的运行时
pub struct LlmRuntime {
    app_name: String,
    store: Arc<dyn SessionStore>,
    tree: Arc<AgentTree>,
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    generation: GenerationSection,
    cancel: CancellationToken,
}

impl LlmRuntime {
    pub fn new(
        app_name: impl Into<String>,
        store: Arc<dyn SessionStore>,
        tree: AgentTree,
        llm: Arc<dyn LlmClient>,
        executor: Arc<ToolExecutor>,
        generation: GenerationSection,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            store,
            tree: Arc::new(tree),
            llm,
            executor,
            generation,
            cancel: CancellationToken::new(),
        }
    }

    /// 进程关闭时取消全部进行中的查询
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

#[async_trait]
impl AgentRuntime for LlmRuntime {
    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        content: Content,
    ) -> Result<EventStream, AgentError> {
        let key = SessionKey::new(&self.app_name, user_id, session_id);
        let handle = self
            .store
            .get(&key)
            .await
            .ok_or_else(|| AgentError::SessionNotFound(key.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let tree = self.tree.clone();
        let llm = self.llm.clone();
        let executor = self.executor.clone();
        let generation = self.generation.clone();
        let cancel = self.cancel.child_token();
        let guard = cancel.clone().drop_guard();

        tokio::spawn(async move {
            let mut session = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(session = %key, "query abandoned before the session was free");
                    return;
                }
                session = handle.lock() => session,
            };
            let runner = TurnRunner::new(&tree, llm, executor, &generation, &tx).with_cancel(cancel);
            tracing::info!(
                invocation = %runner.invocation_id(),
                session = %session.key,
                history_turns = session.history.turns(),
                agent = session.active_agent.as_deref().unwrap_or(tree.root()),
                "turn started"
            );
            if let Err(e) = runner.run(&mut session, content).await {
                tracing::error!(error = %e, "turn failed");
                let _ = tx.send(Err(e)).await;
            }
        });

        let stream = futures_util::stream::unfold((rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|item| (item, (rx, guard)))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::session::{MemorySessionStore, StateRecord};
    use crate::tools::ToolRegistry;
    use futures_util::StreamExt;

    fn runtime(store: Arc<dyn SessionStore>, llm: Arc<ScriptedLlmClient>) -> LlmRuntime {
        LlmRuntime::new(
            "orion",
            store,
            AgentTree::builtin(),
            llm,
            Arc::new(ToolExecutor::new(ToolRegistry::new(), 5)),
            GenerationSection::default(),
        )
    }

    #[tokio::test]
    async fn test_missing_session() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        let rt = runtime(store, Arc::new(ScriptedLlmClient::default()));
        let err = rt
            .run("user_1", "nope", Content::user_text("hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_streams_final_event() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        store
            .create(
                SessionKey::new("orion", "user_1", "session_001"),
                StateRecord::default(),
            )
            .await;
        let rt = runtime(store, Arc::new(ScriptedLlmClient::new(["Hello there"])));

        let mut stream = rt
            .run("user_1", "session_001", Content::user_text("hi"))
            .await
            .unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert!(event.is_final_response());
        assert_eq!(event.content.unwrap().first_text(), Some("Hello there"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_errors_are_streamed() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        store
            .create(
                SessionKey::new("orion", "user_1", "session_001"),
                StateRecord::default(),
            )
            .await;
        let llm = Arc::new(ScriptedLlmClient::default());
        llm.push_error("quota exceeded");
        let rt = runtime(store, llm);

        let mut stream = rt
            .run("user_1", "session_001", Content::user_text("hi"))
            .await
            .unwrap();
        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(AgentError::LlmError(_))));
    }
}
