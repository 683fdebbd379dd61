//! 会话层：字段注册表、状态记录、对话历史、会话存储

pub mod fields;
pub mod history;
pub mod record;
pub mod store;

pub use fields::{FieldGroup, FieldKey, FieldKind};
pub use history::{ConversationMemory, Message, Role};
pub use record::{
    ConfigSnapshot, Details, FieldValue, OutputKey, PlannedSection, ProblemConfig, SectionPlan,
    StateRecord,
};
pub use store::{MemorySessionStore, Session, SessionHandle, SessionKey, SessionStore};
