//! Agent 构建器：从配置统一组装 LLM、工具注册表、子 Agent 委派与活动日志
//!
//! 单次请求、聊天会话、研究命令行共用同一套组件；测试可通过 with_llm 注入脚本化客户端。

use std::sync::Arc;

use crate::agent::{CompanyResearchAgent, SubAgentDelegator};
use crate::config::{AgentSection, AppConfig};
use crate::core::{AgentError, GuardrailPolicy, RecoveryEngine};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::react::ReactSession;
use crate::runtime::{ActivityJournal, ActivityOptions, InMemoryJournal, RetryConfig, SqliteJournal};
use crate::tools::{
    BrowsePageTool, CompanyResearchTool, GenerateReportTool, IdentifyCompetitorsTool,
    IdentifySectorTool, ManageEmailTool, ScheduleEventTool, ToolExecutor, ToolRegistry,
    ValidateCompanyTool, WeatherTool,
};

/// 预构建的主管 Agent 组件，单次请求与聊天会话共享
pub struct AgentComponents {
    pub llm: Arc<dyn LlmClient>,
    pub executor: ToolExecutor,
    pub recovery: RecoveryEngine,
    /// 委派工具的拦截器；None 时委派工具走普通执行器（占位实现）
    pub delegator: Option<SubAgentDelegator>,
    pub agent: AgentSection,
    pub decision: ActivityOptions,
    pub tool: ActivityOptions,
}

impl AgentComponents {
    /// 以给定护栏参数构造一次循环所需的依赖
    pub fn react_session(&self, policy: GuardrailPolicy) -> ReactSession<'_> {
        let session = ReactSession::new(
            self.llm.as_ref(),
            &self.executor,
            &self.recovery,
            policy,
            self.decision.clone(),
            self.tool.clone(),
        );
        match &self.delegator {
            Some(delegator) => session.with_delegator(delegator),
            None => session,
        }
    }
}

pub struct AgentBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    research_llm: Option<Arc<dyn LlmClient>>,
    enable_delegation: bool,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            research_llm: None,
            enable_delegation: true,
        }
    }

    /// 指定主管 LLM（默认按 [llm] 创建）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 指定研究子 Agent 的 LLM（默认按 [llm.research] 覆盖项创建）
    pub fn with_research_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.research_llm = Some(llm);
        self
    }

    /// 关闭委派后 company_research 只返回占位文本
    pub fn with_delegation(mut self, enable: bool) -> Self {
        self.enable_delegation = enable;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_llm(&self) -> Arc<dyn LlmClient> {
        self.llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config.llm))
    }

    pub fn build_research_llm(&self) -> Arc<dyn LlmClient> {
        self.research_llm
            .clone()
            .or_else(|| self.llm.clone())
            .unwrap_or_else(|| create_llm_from_config(&self.config.llm.for_research()))
    }

    fn retry(&self) -> RetryConfig {
        RetryConfig::from(&self.config.retry)
    }

    /// 主管工具：日历、邮件、天气、公司研究（签名）
    pub fn build_supervisor_registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(ScheduleEventTool);
        tools.register(ManageEmailTool);
        tools.register(WeatherTool::new(self.config.tools.weather_timeout_secs));
        tools.register(CompanyResearchTool);
        tools
    }

    /// 研究工具：校验、行业、竞品、网页、报告
    pub fn build_research_registry(&self, llm: Arc<dyn LlmClient>) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(ValidateCompanyTool::new(llm.clone()));
        tools.register(IdentifySectorTool::new(llm.clone()));
        tools.register(IdentifyCompetitorsTool::new(llm.clone()));
        tools.register(BrowsePageTool::new(
            self.config.tools.browse_timeout_secs,
            self.config.tools.browse_max_chars,
        ));
        tools.register(GenerateReportTool::new(llm));
        tools
    }

    pub fn build_research_agent(&self) -> CompanyResearchAgent {
        let llm = self.build_research_llm();
        let registry = self.build_research_registry(llm.clone());
        CompanyResearchAgent::new(
            llm,
            ToolExecutor::new(registry, self.config.timeouts.tool_secs),
            GuardrailPolicy::research(&self.config.agent),
            ActivityOptions::new(self.config.timeouts.research_decision_secs, self.retry()),
            ActivityOptions::untimed(self.retry()),
        )
    }

    pub fn build_delegator(&self) -> SubAgentDelegator {
        SubAgentDelegator::new(
            self.config.agent.delegation_tool.clone(),
            Arc::new(self.build_research_agent()),
            self.config.agent.delegation_max_chars,
            self.config.timeouts.delegation_secs,
        )
    }

    pub fn build_components(&self) -> AgentComponents {
        let delegator = self.enable_delegation.then(|| self.build_delegator());
        AgentComponents {
            llm: self.build_llm(),
            executor: ToolExecutor::new(
                self.build_supervisor_registry(),
                self.config.timeouts.tool_secs,
            ),
            recovery: RecoveryEngine::new(),
            delegator,
            agent: self.config.agent.clone(),
            decision: ActivityOptions::new(self.config.timeouts.decision_secs, self.retry()),
            tool: ActivityOptions::untimed(self.retry()),
        }
    }

    /// 活动日志：配置了 journal_path 则用 SQLite（可跨进程重放），否则进程内
    pub fn build_journal(&self) -> Result<Arc<dyn ActivityJournal>, AgentError> {
        match &self.config.persistence.journal_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| AgentError::Journal(e.to_string()))?;
                }
                tracing::info!(path = %path.display(), "using sqlite activity journal");
                Ok(Arc::new(SqliteJournal::open(path)?))
            }
            None => Ok(Arc::new(InMemoryJournal::new())),
        }
    }
}
