//! 运行时层：事件、Planner、单轮主循环、流式运行时

pub mod events;
pub mod loop_;
pub mod planner;
pub mod runtime;

pub use events::{Content, ContentRole, Event, EventActions, Part};
pub use loop_::{EventSender, TurnRunner};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
pub use runtime::{AgentRuntime, EventStream, LlmRuntime};
