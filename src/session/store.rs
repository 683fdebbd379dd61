//! 会话存储
//!
//! 进程级映射：(app_name, user_id, session_id) -> 会话。只有创建与读取，没有删除/过期。
//! 每个会话包在独立的 Mutex 里：同一会话的查询串行执行，不同会话互不阻塞。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::session::history::ConversationMemory;
use crate::session::record::StateRecord;

/// 会话标识三元组
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "App='{}', User='{}', Session='{}'",
            self.app_name, self.user_id, self.session_id
        )
    }
}

/// 单个会话：状态记录 + 对话历史 + 当前接管对话的智能体
pub struct Session {
    pub key: SessionKey,
    pub state: StateRecord,
    pub history: ConversationMemory,
    /// 上一轮结束时掌握对话的智能体；None 表示根智能体
    pub active_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, state: StateRecord, max_context_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            key,
            state,
            history: ConversationMemory::new(max_context_turns),
            active_agent: None,
            created_at: now,
            last_update: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}

/// 会话句柄：持锁期间独占该会话
pub type SessionHandle = Arc<Mutex<Session>>;

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取已有会话
    async fn get(&self, key: &SessionKey) -> Option<SessionHandle>;

    /// 创建会话；已存在时直接返回已有会话，不覆盖其状态
    async fn create(&self, key: SessionKey, state: StateRecord) -> SessionHandle;

    /// 会话数量
    async fn count(&self) -> usize;

    /// 先读取、不存在再以初始状态创建
    async fn get_or_create(&self, key: SessionKey) -> SessionHandle {
        match self.get(&key).await {
            Some(handle) => {
                tracing::info!("Session retrieved: {}", key);
                handle
            }
            None => {
                tracing::info!("Session created: {}", key);
                self.create(key, StateRecord::default()).await
            }
        }
    }
}

/// 内存会话存储
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
    max_context_turns: usize,
}

impl MemorySessionStore {
    pub fn new(max_context_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_context_turns,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(20)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.read().await.get(key).cloned()
    }

    async fn create(&self, key: SessionKey, state: StateRecord) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Session::new(key, state, self.max_context_turns)))
            })
            .clone()
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fields::FieldKey;
    use crate::session::record::FieldValue;

    fn key() -> SessionKey {
        SessionKey::new("orion", "user_1", "session_001")
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemorySessionStore::default();
        assert!(store.get(&key()).await.is_none());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_create_once() {
        let store = MemorySessionStore::default();
        let first = store.create(key(), StateRecord::default()).await;
        first
            .lock()
            .await
            .state
            .assign(FieldKey::PageTitle, FieldValue::Text("Bakery".into()));

        let second = store.create(key(), StateRecord::default()).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            second.lock().await.state.problem_config.page_title.as_deref(),
            Some("Bakery")
        );
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_keys_are_distinct_per_user() {
        let store = MemorySessionStore::default();
        store.get_or_create(key()).await;
        store
            .get_or_create(SessionKey::new("orion", "user_2", "session_001"))
            .await;
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_session_lock_serializes_access() {
        let store = MemorySessionStore::default();
        let handle = store.get_or_create(key()).await;
        let guard = handle.lock().await;
        assert!(handle.try_lock().is_err());
        drop(guard);
        assert!(handle.try_lock().is_ok());
    }
}
