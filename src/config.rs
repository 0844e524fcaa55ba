//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STEWARD__*` 覆盖（双下划线表示嵌套，如 `STEWARD__LLM__PROVIDER=gemini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub timeouts: TimeoutsSection,
    pub retry: RetrySection,
    pub tools: ToolsSection,
    pub persistence: PersistenceSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 数据目录（日志库、会话快照的默认位置）
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "steward".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// [llm] 段：provider 选择；研究子 Agent 可单独覆盖
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / gemini / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY / GEMINI_API_KEY
    pub api_key: Option<String>,
    pub research: LlmOverrideSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            research: LlmOverrideSection::default(),
        }
    }
}

/// [llm.research] 段：未设置的字段沿用 [llm]
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmOverrideSection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl LlmSection {
    /// 研究子 Agent 实际使用的 LLM 配置
    pub fn for_research(&self) -> LlmSection {
        LlmSection {
            provider: self
                .research
                .provider
                .clone()
                .unwrap_or_else(|| self.provider.clone()),
            model: self.research.model.clone().unwrap_or_else(|| self.model.clone()),
            base_url: self.research.base_url.clone().or_else(|| self.base_url.clone()),
            api_key: self.research.api_key.clone().or_else(|| self.api_key.clone()),
            research: LlmOverrideSection::default(),
        }
    }
}

/// [agent] 段：步数预算与护栏
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub single_shot_max_steps: usize,
    pub chat_max_steps_per_turn: usize,
    pub research_max_steps: usize,
    /// 工具调用次数达到该值且已有缓存结果时触发熔断
    pub tool_budget: usize,
    /// 结果按工具名缓存、可被熔断复用的工具
    pub guarded_tools: Vec<String>,
    pub delegation_tool: String,
    pub delegation_max_chars: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            single_shot_max_steps: 30,
            chat_max_steps_per_turn: 8,
            research_max_steps: 30,
            tool_budget: 3,
            guarded_tools: vec!["get_weather".to_string()],
            delegation_tool: "company_research".to_string(),
            delegation_max_chars: 2000,
        }
    }
}

/// [timeouts] 段（秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    pub decision_secs: u64,
    pub research_decision_secs: u64,
    pub tool_secs: u64,
    pub delegation_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            decision_secs: 60,
            research_decision_secs: 90,
            tool_secs: 30,
            delegation_secs: 900,
        }
    }
}

/// [retry] 段：活动的瞬时错误重试（指数退避）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// [tools] 段：网络工具超时与抓取上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub weather_timeout_secs: u64,
    pub browse_timeout_secs: u64,
    pub browse_max_chars: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            weather_timeout_secs: 5,
            browse_timeout_secs: 10,
            browse_max_chars: 4000,
        }
    }
}

/// [persistence] 段：未设置时落在 app.data_dir 下
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PersistenceSection {
    /// SQLite 活动日志路径；为空则使用内存日志
    pub journal_path: Option<PathBuf>,
    pub session_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn session_dir(&self) -> PathBuf {
        self.persistence
            .session_dir
            .clone()
            .unwrap_or_else(|| self.app.data_dir.join("sessions"))
    }
}

/// 从 config 目录加载配置，环境变量 STEWARD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 STEWARD__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("STEWARD")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("agent.guarded_tools")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_budgets() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.single_shot_max_steps, 30);
        assert_eq!(cfg.agent.chat_max_steps_per_turn, 8);
        assert_eq!(cfg.agent.research_max_steps, 30);
        assert_eq!(cfg.agent.tool_budget, 3);
        assert_eq!(cfg.agent.guarded_tools, vec!["get_weather".to_string()]);
        assert_eq!(cfg.agent.delegation_max_chars, 2000);
        assert_eq!(cfg.timeouts.delegation_secs, 900);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"gemini\"\nmodel = \"gemini-2.0-flash\"\n\n[llm.research]\nmodel = \"gemini-2.5-pro\"\n\n[agent]\nchat_max_steps_per_turn = 4"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.agent.chat_max_steps_per_turn, 4);
        assert_eq!(cfg.agent.single_shot_max_steps, 30);

        let research = cfg.llm.for_research();
        assert_eq!(research.provider, "gemini");
        assert_eq!(research.model, "gemini-2.5-pro");
    }
}
