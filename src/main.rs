//! Orion HTTP 服务入口
//!
//! 加载配置、初始化日志、创建默认会话与运行时，然后监听 host:port，Ctrl-C 时优雅退出。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use orion::agents::AgentTree;
use orion::config::{load_config, AppConfig};
use orion::llm::create_llm_from_config;
use orion::react::LlmRuntime;
use orion::server::{router, AppState};
use orion::session::{MemorySessionStore, SessionKey, SessionStore};
use orion::tools::{create_default_registry, ToolExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (cfg, config_err) = match load_config(None) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    orion::observability::init(&cfg.log).context("Failed to initialise logging")?;
    if let Some(e) = config_err {
        tracing::warn!(error = %e, "config load failed, using defaults");
    }

    let store: Arc<dyn SessionStore> =
        Arc::new(MemorySessionStore::new(cfg.app.max_context_turns));
    store
        .get_or_create(SessionKey::new(
            &cfg.app.name,
            &cfg.app.user_id,
            &cfg.app.session_id,
        ))
        .await;

    let llm = create_llm_from_config(&cfg);
    let tree = AgentTree::load(&cfg.agents.dir);
    let executor = Arc::new(ToolExecutor::new(
        create_default_registry(&cfg),
        cfg.tools.tool_timeout_secs,
    ));
    let shutdown = CancellationToken::new();
    let runtime = LlmRuntime::new(
        cfg.app.name.clone(),
        store,
        tree,
        llm,
        executor,
        cfg.generation.clone(),
    )
    .with_cancel(shutdown.clone());

    let state = Arc::new(AppState {
        runtime: Arc::new(runtime),
        user_id: cfg.app.user_id.clone(),
        session_id: cfg.app.session_id.clone(),
        port: cfg.app.port,
        query_timeout: Duration::from_secs(cfg.generation.query_timeout_secs),
    });
    let app = router(state);

    let addr = format!("{}:{}", cfg.app.host, cfg.app.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("{} listening on http://{}", cfg.app.name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    Ok(())
}
