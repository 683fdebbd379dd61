//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ORION__*` 覆盖（双下划线表示嵌套，如 `ORION__LLM__PROVIDER=openai`），
//! 最后是部署环境常用的两个裸变量 `APP_NAME` 与 `PORT`。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub generation: GenerationSection,
    pub tools: ToolsSection,
    pub log: LogSection,
    pub agents: AgentsSection,
}

/// [app] 段：应用名、监听地址、默认会话、对话轮数上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 启动时预建会话使用的用户 id
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// 对话历史保留轮数（短期记忆）
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

fn default_app_name() -> String {
    "orion".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_user_id() -> String {
    "user_1".to_string()
}

fn default_session_id() -> String {
    "session_001".to_string()
}

fn default_max_context_turns() -> usize {
    20
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            host: default_host(),
            port: default_port(),
            user_id: default_user_id(),
            session_id: default_session_id(),
            max_context_turns: default_max_context_turns(),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai；没有对应 API Key 时退回 Mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    crate::llm::GEMINI_FLASH.to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [generation] 段：生成/校验循环与单次查询的上限
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
    /// PRODUCE -> VALIDATE 往返次数上限
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 单次查询内模型调用次数上限（不含生成循环内部）
    #[serde(default = "default_max_agent_steps")]
    pub max_agent_steps: usize,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_max_iterations() -> usize {
    20
}

fn default_max_agent_steps() -> usize {
    24
}

fn default_query_timeout_secs() -> u64 {
    300
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_agent_steps: default_max_agent_steps(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// [tools] 段：工具超时、检索配置
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub search: SearchSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            search: SearchSection::default(),
        }
    }
}

/// [tools.search] 段：检索端点、超时、返回条数
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_results() -> usize {
    5
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

/// [log] 段：可选日志文件（控制台输出始终开启）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogSection {
    pub file: Option<PathBuf>,
}

/// [agents] 段：智能体 prompt 覆盖文件目录
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsSection {
    #[serde(default = "default_agents_dir")]
    pub dir: PathBuf,
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("config/agents")
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            dir: default_agents_dir(),
        }
    }
}

/// 从 config 目录加载配置，环境变量可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 ORION__*（双下划线表示嵌套键）
/// 4. APP_NAME / PORT 覆盖 app.name / app.port
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ORION")
            .separator("__")
            .try_parsing(true),
    );

    if let Ok(name) = std::env::var("APP_NAME") {
        builder = builder.set_override("app.name", name)?;
    }
    if let Ok(port) = std::env::var("PORT") {
        let port: i64 = port
            .trim()
            .parse()
            .map_err(|e| config::ConfigError::Message(format!("invalid PORT '{port}': {e}")))?;
        builder = builder.set_override("app.port", port)?;
    }

    let c = builder.build()?;
    c.try_deserialize()
}
