//! 单次请求的个人助理
//!
//! 种子历史：主管系统提示词 + 任务描述 + 初始计划 + 用户请求；以单次请求的步数预算跑一轮主循环。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::agent::prompts::{
    supervisor_prompt, NO_RESPONSE_FALLBACK, SINGLE_SHOT_INITIAL_PLAN, SINGLE_SHOT_TASK,
};
use crate::agent::AgentComponents;
use crate::core::{AgentError, GuardrailPolicy};
use crate::memory::{PromptEntry, PromptHistory};
use crate::react::{run_turn, ReactEvent, ToolCall};
use crate::runtime::ActivityContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantResult {
    pub final_response: String,
    /// 按顺序发出的工具请求
    pub tool_calls: Vec<ToolCall>,
    pub steps: usize,
}

pub struct PersonalAssistant {
    components: Arc<AgentComponents>,
}

impl PersonalAssistant {
    pub fn new(components: Arc<AgentComponents>) -> Self {
        Self { components }
    }

    pub fn seed_history(query: &str) -> PromptHistory {
        let mut history = PromptHistory::new();
        history.push(PromptEntry::system(supervisor_prompt()));
        history.push(PromptEntry::task(SINGLE_SHOT_TASK));
        history.push(PromptEntry::user(SINGLE_SHOT_INITIAL_PLAN));
        history.push(PromptEntry::user(query));
        history
    }

    /// 只有活动日志失败（含重放分歧）时返回 Err
    pub async fn run(
        &self,
        query: &str,
        ctx: &mut ActivityContext,
    ) -> Result<AssistantResult, AgentError> {
        self.run_inner(query, ctx, None).await
    }

    /// 同 run，并把过程事件推送到 event_tx
    pub async fn run_with_events(
        &self,
        query: &str,
        ctx: &mut ActivityContext,
        event_tx: &UnboundedSender<ReactEvent>,
    ) -> Result<AssistantResult, AgentError> {
        self.run_inner(query, ctx, Some(event_tx)).await
    }

    async fn run_inner(
        &self,
        query: &str,
        ctx: &mut ActivityContext,
        event_tx: Option<&UnboundedSender<ReactEvent>>,
    ) -> Result<AssistantResult, AgentError> {
        let mut history = Self::seed_history(query);
        let mut session = self
            .components
            .react_session(GuardrailPolicy::single_shot(&self.components.agent));
        if let Some(tx) = event_tx {
            session = session.with_event_tx(tx);
        }

        tracing::info!(instance = %ctx.instance_id(), "assistant request started");
        let result = run_turn(&session, &mut history, ctx).await?;
        tracing::info!(
            instance = %ctx.instance_id(),
            steps = result.steps,
            end = ?result.end,
            "assistant request finished"
        );

        let final_response = if result.text.trim().is_empty() {
            NO_RESPONSE_FALLBACK.to_string()
        } else {
            result.text
        };
        Ok(AssistantResult {
            final_response,
            tool_calls: result.tool_calls,
            steps: result.steps,
        })
    }
}
