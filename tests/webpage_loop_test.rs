//! 端到端：脚本化模型驱动完整的需求收集 -> 分段规划 -> 生成循环

use std::sync::Arc;

use orion::agents::AgentTree;
use orion::config::{AppConfig, GenerationSection};
use orion::gateway::ask;
use orion::llm::ScriptedLlmClient;
use orion::react::LlmRuntime;
use orion::session::{MemorySessionStore, SessionKey, SessionStore};
use orion::tools::{create_default_registry, ToolExecutor};

const HERO_DOC: &str = "<!DOCTYPE html><html><body>\
<section data-section=\"hero\"><h1>Sunrise Bakery</h1></section>\
<section data-section=\"footer\"></section><script></script></body></html>";

const FULL_DOC: &str = "<!DOCTYPE html><html><body>\
<section data-section=\"hero\"><h1>Sunrise Bakery</h1></section>\
<section data-section=\"footer\"><p>Call us</p></section><script></script></body></html>";

fn key() -> SessionKey {
    SessionKey::new("orion", "user_1", "session_001")
}

async fn setup(
    llm: Arc<ScriptedLlmClient>,
    generation: GenerationSection,
) -> (Arc<dyn SessionStore>, LlmRuntime) {
    let cfg = AppConfig::default();
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(100));
    store.get_or_create(key()).await;
    let executor = Arc::new(ToolExecutor::new(create_default_registry(&cfg), 5));
    let runtime = LlmRuntime::new(
        "orion",
        store.clone(),
        AgentTree::builtin(),
        llm,
        executor,
        generation,
    );
    (store, runtime)
}

#[tokio::test]
async fn test_gather_plan_and_build_page() {
    let llm = Arc::new(ScriptedLlmClient::new([
        // 第一轮：根智能体转交需求收集者，写入两个字段后请用户确认
        r#"{"tool": "transfer_to_agent", "args": {"agent_name": "requirement_gatherer"}}"#,
        r#"{"tool": "update_problem_config_tool", "args": {"key": "Page Title", "value": "Sunrise Bakery"}}"#,
        r#"{"tool": "update_problem_config_tool", "args": {"key": "Page Structure", "value": "hero, footer"}}"#,
        "Title and structure saved. Do you approve?",
        // 第二轮：回到根智能体，规划分段，进入生成循环
        r#"{"tool": "transfer_to_agent", "args": {"agent_name": "Base_agent"}}"#,
        r#"{"tool": "transfer_to_agent", "args": {"agent_name": "Section_Planner"}}"#,
        r#"{"hero": "Welcome banner", "footer": "Contact info"}"#,
        r#"{"tool": "transfer_to_agent", "args": {"agent_name": "Webpage_Builder"}}"#,
        "Add the 'hero' section. Content: Welcome banner",
        HERO_DOC,
        "Add the 'footer' section. Content: Contact info",
        FULL_DOC,
        r#"{"tool": "exit_loop", "args": {}}"#,
        "Your page is ready.",
    ]));
    let (store, runtime) = setup(llm.clone(), GenerationSection::default()).await;

    let first = ask("I want a page for my bakery", &runtime, "user_1", "session_001")
        .await
        .unwrap();
    assert_eq!(first, "Title and structure saved. Do you approve?");
    {
        let handle = store.get(&key()).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(
            session.state.problem_config.page_title.as_deref(),
            Some("Sunrise Bakery")
        );
        assert_eq!(
            session.state.problem_config.page_structure,
            Some(vec!["hero".to_string(), "footer".to_string()])
        );
        assert_eq!(session.active_agent.as_deref(), Some("requirement_gatherer"));
    }

    let second = ask("Approved, build it", &runtime, "user_1", "session_001")
        .await
        .unwrap();
    assert_eq!(second, "Your page is ready.");
    assert_eq!(llm.remaining(), 0);

    let handle = store.get(&key()).await.unwrap();
    let session = handle.lock().await;
    assert_eq!(session.state.section_plan.names(), vec!["hero", "footer"]);
    assert_eq!(session.state.generated_code.as_deref(), Some(FULL_DOC));
    assert!(session.state.instruct.is_none());
    assert!(session.active_agent.is_none());

    // 骨架不经模型；Creator 收到的指令就是 Determiner 上一步给出的
    let requests = llm.requests();
    let creator_request = requests
        .iter()
        .find(|r| r.len() == 2 && r[1].content == "Add the 'hero' section. Content: Welcome banner")
        .expect("creator saw the hero instruction");
    assert!(creator_request[0]
        .content
        .contains("<section data-section=\"hero\"></section>"));
    // 根智能体最后一步能看到最终文档
    let last = requests.last().unwrap();
    assert!(last.iter().any(|m| m.content.contains(FULL_DOC)));
}

#[tokio::test]
async fn test_premature_exit_is_rejected() {
    let mut store_state = orion::session::StateRecord::default();
    store_state.section_plan = [("hero", "Welcome banner")].into_iter().collect();

    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"tool": "transfer_to_agent", "args": {"agent_name": "Webpage_Builder"}}"#,
        // 骨架刚生成就宣告完成：被拒绝并替换为 hero 的默认指令
        r#"{"tool": "exit_loop", "args": {}}"#,
        "<!DOCTYPE html><html><body><section data-section=\"hero\">Hi</section></body></html>",
        r#"{"tool": "exit_loop", "args": {}}"#,
        "Done.",
    ]));
    let cfg = AppConfig::default();
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(100));
    store.create(key(), store_state).await;
    let runtime = LlmRuntime::new(
        "orion",
        store.clone(),
        AgentTree::builtin(),
        llm.clone(),
        Arc::new(ToolExecutor::new(create_default_registry(&cfg), 5)),
        GenerationSection::default(),
    );

    let reply = ask("build", &runtime, "user_1", "session_001").await.unwrap();
    assert_eq!(reply, "Done.");
    let requests = llm.requests();
    assert!(requests
        .iter()
        .any(|r| r.len() == 2 && r[1].content == "Add the 'hero' section. Content: Welcome banner"));

    let handle = store.get(&key()).await.unwrap();
    let session = handle.lock().await;
    assert!(session
        .state
        .generated_code
        .as_deref()
        .unwrap()
        .contains("data-section=\"hero\">Hi<"));
}

#[tokio::test]
async fn test_iteration_cap_is_reported_as_escalation() {
    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"tool": "transfer_to_agent", "args": {"agent_name": "Webpage_Builder"}}"#,
        "Add the 'hero' section. Content: Welcome banner",
        // Creator 一直没有给出 HTML，文档不变
        "I cannot do that.",
        "Add the 'hero' section. Content: Welcome banner",
    ]));
    let generation = GenerationSection {
        max_iterations: 2,
        ..Default::default()
    };
    let (store, runtime) = setup(llm, generation).await;
    {
        let handle = store.get(&key()).await.unwrap();
        handle.lock().await.state.section_plan =
            [("hero", "Welcome banner")].into_iter().collect();
    }

    let reply = ask("build", &runtime, "user_1", "session_001").await.unwrap();
    assert_eq!(
        reply,
        "Agent escalated: Generation loop exceeded 2 iterations without completing"
    );
}
