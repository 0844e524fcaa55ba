//! 公司研究子 Agent
//!
//! 种子历史：研究系统提示词 + 任务 + 初始计划；每次工具结果后追加反思提示（重新评估事实 / 修订计划）。
//! 只受步数预算约束，不做重复调用缓存与熔断。产出 markdown 报告。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::prompts::{
    research_system_prompt, research_task, RESEARCH_INITIAL_PLAN, RESEARCH_PROGRESS_HINT,
};
use crate::agent::SubAgent;
use crate::core::{AgentError, GuardrailPolicy, RecoveryEngine};
use crate::llm::LlmClient;
use crate::memory::{PromptEntry, PromptHistory};
use crate::react::{run_turn, ReactSession, Reflection, TurnEnd};
use crate::runtime::{ActivityContext, ActivityOptions};
use crate::tools::ToolExecutor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// final 标记已去掉；步数用尽时为最后一段文本（可能为空）
    pub markdown_report: String,
}

pub struct CompanyResearchAgent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    policy: GuardrailPolicy,
    decision: ActivityOptions,
    tool: ActivityOptions,
}

impl CompanyResearchAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        policy: GuardrailPolicy,
        decision: ActivityOptions,
        tool: ActivityOptions,
    ) -> Self {
        Self {
            llm,
            executor,
            recovery: RecoveryEngine::new(),
            policy,
            decision,
            tool,
        }
    }

    pub fn seed_history(company: &str) -> PromptHistory {
        let mut history = PromptHistory::new();
        history.push(PromptEntry::system(research_system_prompt()));
        history.push(PromptEntry::task(research_task(company)));
        history.push(PromptEntry::user(RESEARCH_INITIAL_PLAN));
        history
    }

    pub async fn research(
        &self,
        company: &str,
        ctx: &mut ActivityContext,
    ) -> Result<ResearchReport, AgentError> {
        let mut history = Self::seed_history(company);
        let session = ReactSession::new(
            self.llm.as_ref(),
            &self.executor,
            &self.recovery,
            self.policy.clone(),
            self.decision.clone(),
            self.tool.clone(),
        )
        .with_reflection(Reflection {
            progress_hint: RESEARCH_PROGRESS_HINT.to_string(),
        });

        tracing::info!(instance = %ctx.instance_id(), company, "company research started");
        let result = run_turn(&session, &mut history, ctx).await?;
        if result.end != TurnEnd::Final {
            tracing::info!(
                instance = %ctx.instance_id(),
                steps = result.steps,
                "research ended without final answer, returning best-effort text"
            );
        }
        tracing::info!(
            instance = %ctx.instance_id(),
            steps = result.steps,
            tool_calls = result.tool_calls.len(),
            "company research finished"
        );
        Ok(ResearchReport {
            markdown_report: result.text,
        })
    }
}

#[async_trait]
impl SubAgent for CompanyResearchAgent {
    async fn run(&self, task: &str, mut ctx: ActivityContext) -> Result<String, AgentError> {
        Ok(self.research(task, &mut ctx).await?.markdown_report)
    }
}
