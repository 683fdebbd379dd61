//! Orion - 多智能体静态网页生成服务
//!
//! 模块划分：
//! - **agents**: 智能体树（根智能体、需求收集、参考检索、分段规划、生成循环）与指令模板
//! - **builder**: 生成/校验循环协调器，HTML 骨架与分段占位符
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与恢复引擎
//! - **gateway**: 查询网关（发送查询，消费事件到终止事件为止）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **observability**: 日志初始化
//! - **react**: Planner、单轮主循环、流式运行时
//! - **server**: HTTP 接口
//! - **session**: 字段注册表、状态记录、会话存储
//! - **tools**: 工具箱（状态写入、完成信号、转交、网页检索）与执行器

pub mod agents;
pub mod builder;
pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod react;
pub mod server;
pub mod session;
pub mod tools;
