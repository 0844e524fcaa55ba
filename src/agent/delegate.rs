//! 子 Agent 委派
//!
//! 父循环遇到委派工具名时不走 ToolExecutor，而是：取出公司名参数 -> 以独立任务（tokio::spawn）
//! 启动嵌套编排实例（独立历史、独立步数预算、独立 journal 实例 id）-> 等待一次 -> 只把有界摘要带回父历史。
//!
//! 非空报告带 "Company research report (markdown excerpt):" 前缀，前缀不计入 max_chars。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::core::AgentError;
use crate::react::ToolCall;
use crate::runtime::{ActivityContext, ActivityOptions, RetryConfig};

/// 委派工具接受的参数名（按顺序取第一个非空值）
pub const COMPANY_ARG_ALIASES: [&str; 3] = ["company", "company_name", "query"];

/// 子 Agent 没有产出报告时带回父历史的文本
pub const EMPTY_REPORT_TEXT: &str = "The company research agent completed without producing a \
report. No additional details are available.";

/// 非空报告摘要的前缀
pub const REPORT_EXCERPT_PREFIX: &str = "Company research report (markdown excerpt):\n\n";

/// 可被委派的嵌套编排：输入一段任务文本，输出主要文本产物
#[async_trait]
pub trait SubAgent: Send + Sync {
    /// ctx 为子实例自己的活动上下文（与父实例共享 journal）
    async fn run(&self, task: &str, ctx: ActivityContext) -> Result<String, AgentError>;
}

/// 把子 Agent 的输出压到 max_chars 以内：空 -> 固定文本；超长 -> 截断并以 "..." 结尾；
/// 非空时加 REPORT_EXCERPT_PREFIX
pub fn bounded_summary(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return EMPTY_REPORT_TEXT.to_string();
    }
    if text.chars().count() <= max_chars {
        return format!("{REPORT_EXCERPT_PREFIX}{text}");
    }
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{REPORT_EXCERPT_PREFIX}{}...", head.trim_end())
}

/// 超时或父任务被取消时一并终止子任务
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 委派器：拦截一个工具名，转交给子 Agent
pub struct SubAgentDelegator {
    tool_name: String,
    agent: Arc<dyn SubAgent>,
    max_chars: usize,
    options: ActivityOptions,
}

impl SubAgentDelegator {
    pub fn new(
        tool_name: impl Into<String>,
        agent: Arc<dyn SubAgent>,
        max_chars: usize,
        timeout_secs: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            agent,
            max_chars,
            // 子 Agent 内部的活动各自重试；整体只跑一次
            options: ActivityOptions::new(timeout_secs, RetryConfig::none()),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn handles(&self, tool: &str) -> bool {
        self.tool_name == tool
    }

    /// 执行一次委派；返回写入父历史的有界摘要
    pub async fn delegate(
        &self,
        call: &ToolCall,
        ctx: &mut ActivityContext,
    ) -> Result<String, AgentError> {
        let company = call
            .first_str_arg(&COMPANY_ARG_ALIASES)
            .ok_or_else(|| AgentError::DelegationArgumentMissing {
                tool: self.tool_name.clone(),
                argument: COMPANY_ARG_ALIASES[0].to_string(),
            })?
            .to_string();

        let child_id = ctx.child_id(&format!("{}-{}", self.tool_name, ctx.peek_seq()));
        let journal = ctx.journal();
        let max_chars = self.max_chars;
        tracing::info!(
            parent = %ctx.instance_id(),
            child = %child_id,
            company = %company,
            "delegating to sub-agent"
        );

        let activity = format!("delegate:{}", self.tool_name);
        let summary = ctx
            .execute(&activity, &company, &self.options, || {
                let agent = self.agent.clone();
                let task = company.clone();
                let child_ctx = ActivityContext::new(child_id.clone(), journal.clone());
                async move {
                    let mut handle =
                        AbortOnDrop(tokio::spawn(async move { agent.run(&task, child_ctx).await }));
                    match (&mut handle.0).await {
                        Ok(Ok(report)) => Ok(bounded_summary(&report, max_chars)),
                        Ok(Err(e)) => Err(AgentError::SubAgentFailed(e.to_string())),
                        Err(e) => Err(AgentError::SubAgentFailed(e.to_string())),
                    }
                }
            })
            .await?;

        tracing::info!(child = %child_id, chars = summary.chars().count(), "sub-agent finished");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedAgent {
        report: String,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SubAgent for FixedAgent {
        async fn run(&self, _task: &str, _ctx: ActivityContext) -> Result<String, AgentError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(self.report.clone())
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl SubAgent for SlowAgent {
        async fn run(&self, _task: &str, _ctx: ActivityContext) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    fn fixed(report: &str) -> Arc<FixedAgent> {
        Arc::new(FixedAgent {
            report: report.to_string(),
            runs: AtomicUsize::new(0),
        })
    }

    struct FailingAgent;

    #[async_trait]
    impl SubAgent for FailingAgent {
        async fn run(&self, _task: &str, _ctx: ActivityContext) -> Result<String, AgentError> {
            Err(AgentError::Journal("child diverged".to_string()))
        }
    }

    #[test]
    fn test_bounded_summary_rules() {
        assert_eq!(bounded_summary("  ", 2000), EMPTY_REPORT_TEXT);
        assert_eq!(
            bounded_summary("short report", 2000),
            "Company research report (markdown excerpt):\n\nshort report"
        );

        let long = "x".repeat(2500);
        let out = bounded_summary(&long, 2000);
        let excerpt = out.strip_prefix(REPORT_EXCERPT_PREFIX).unwrap();
        assert_eq!(excerpt.chars().count(), 2000);
        assert!(excerpt.ends_with("..."));

        let spaced = format!("{}   {}", "a".repeat(1996), "b".repeat(100));
        let out = bounded_summary(&spaced, 2000);
        assert_eq!(out, format!("{REPORT_EXCERPT_PREFIX}{}...", "a".repeat(1996)));
    }

    #[tokio::test]
    async fn test_child_failure_becomes_sub_agent_error() {
        let delegator = SubAgentDelegator::new("company_research", Arc::new(FailingAgent), 2000, 60);
        let mut ctx = ActivityContext::ephemeral();
        let err = delegator
            .delegate(&ToolCall::new("company_research", json!({"company": "Acme"})), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SubAgentFailed(ref msg) if msg.contains("child diverged")));
    }

    #[tokio::test]
    async fn test_missing_argument_is_reported() {
        let delegator = SubAgentDelegator::new("company_research", fixed("r"), 2000, 60);
        let mut ctx = ActivityContext::ephemeral();
        let err = delegator
            .delegate(&ToolCall::new("company_research", json!({"topic": "x"})), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "company_research tool was called without a 'company' argument."
        );
    }

    #[tokio::test]
    async fn test_alias_argument_starts_one_child() {
        let agent = fixed("# Report");
        let delegator = SubAgentDelegator::new("company_research", agent.clone(), 2000, 60);
        let mut ctx = ActivityContext::ephemeral();
        let out = delegator
            .delegate(&ToolCall::new("company_research", json!({"query": "Acme"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, format!("{REPORT_EXCERPT_PREFIX}# Report"));
        assert_eq!(agent.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_error() {
        let delegator = SubAgentDelegator::new("company_research", Arc::new(SlowAgent), 2000, 5);
        let mut ctx = ActivityContext::ephemeral();
        let err = delegator
            .delegate(&ToolCall::new("company_research", json!({"company": "Acme"})), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout { secs: 5, .. }));
    }
}
