//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use gemini::{create_gemini_client, GEMINI_FLASH};
pub use mock::ScriptedLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端（Gemini / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;
    let base_url = cfg.llm.base_url.as_deref();

    if provider == "gemini" && gemini::gemini_api_key().is_some() {
        tracing::info!("Using Gemini LLM ({})", cfg.llm.model);
        Arc::new(create_gemini_client(Some(&cfg.llm.model), base_url).with_request_timeout(timeout))
    } else if provider == "openai" && std::env::var("OPENAI_API_KEY").is_ok() {
        tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
        Arc::new(
            OpenAiClient::new(
                base_url,
                &cfg.llm.model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            )
            .with_request_timeout(timeout),
        )
    } else {
        tracing::warn!(
            provider = %provider,
            "No API key set or provider unknown, using Mock LLM"
        );
        Arc::new(ScriptedLlmClient::default())
    }
}
