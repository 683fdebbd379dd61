pub mod executor;
pub mod exit_loop;
pub mod registry;
pub mod schema;
pub mod transfer;
pub mod update_config;
pub mod web_search;

pub use executor::ToolExecutor;
pub use exit_loop::{signal_completion, ExitLoopTool, EXIT_LOOP_TOOL_NAME};
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use transfer::{TransferTool, TRANSFER_TOOL_NAME};
pub use update_config::{
    update_field, UpdateOutcome, UpdateProblemConfigTool, UpdateStatus, UPDATE_TOOL_NAME,
};
pub use web_search::{SearchHit, WebSearchTool, WEB_SEARCH_TOOL_NAME};

use crate::config::AppConfig;

/// 注册全部内置工具（状态写入、完成信号、控制权转交、网页检索）
pub fn create_default_registry(cfg: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(UpdateProblemConfigTool);
    registry.register(ExitLoopTool);
    registry.register(TransferTool);
    registry.register(WebSearchTool::new(&cfg.tools.search));
    registry
}
