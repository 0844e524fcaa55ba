//! 编排主循环（单次请求、聊天轮次、研究子 Agent 共用）
//!
//! AWAIT_DECISION -> TOOL_REQUESTED | FINAL | CONTINUE：
//! 渲染历史 -> 决策 -> 有工具请求就执行并写回工具结果；有文本就写为 assistant 条目，带 final 标记则结束。
//! 决策、工具、委派都经由 ActivityContext 执行（超时 / 重试 / 日志重放）；循环内的错误转成历史条目，
//! 只有活动日志失败（含重放分歧）会终止本轮并返回 Err。

use tokio::sync::mpsc::UnboundedSender;

use crate::agent::SubAgentDelegator;
use crate::core::{AgentError, GuardrailPolicy, RecoveryAction, RecoveryEngine, TurnGuard};
use crate::llm::LlmClient;
use crate::memory::{PromptEntry, PromptHistory};
use crate::react::{strip_final_marker, AgentStepInput, AgentStepOutput, ReactEvent, ToolCall};
use crate::runtime::{ActivityContext, ActivityOptions};
use crate::tools::ToolExecutor;

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 本轮如何结束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    /// 决策给出带标记的 final 文本
    Final,
    /// 工具预算熔断，final 文本由循环合成
    CircuitBreaker,
    /// 步数预算用尽
    BudgetExhausted,
}

/// 单轮执行结果
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    /// Final / CircuitBreaker 时已去掉 final 标记；BudgetExhausted 时为最后一条 assistant 文本原文（可能为空）
    pub text: String,
    pub end: TurnEnd,
    pub steps: usize,
    /// 本轮按顺序发出的工具请求
    pub tool_calls: Vec<ToolCall>,
}

/// 每次工具结果之后追加「重新评估事实」「修订计划」两条提示
#[derive(Debug, Clone)]
pub struct Reflection {
    /// 修订计划提示中的进度说明
    pub progress_hint: String,
}

/// 循环依赖与参数
pub struct ReactSession<'a> {
    pub llm: &'a dyn LlmClient,
    pub executor: &'a ToolExecutor,
    pub recovery: &'a RecoveryEngine,
    pub policy: GuardrailPolicy,
    pub decision: ActivityOptions,
    pub tool: ActivityOptions,
    /// 可选：委派工具的拦截与执行
    pub delegator: Option<&'a SubAgentDelegator>,
    /// 可选：反思提示
    pub reflection: Option<Reflection>,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a UnboundedSender<ReactEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        recovery: &'a RecoveryEngine,
        policy: GuardrailPolicy,
        decision: ActivityOptions,
        tool: ActivityOptions,
    ) -> Self {
        Self {
            llm,
            executor,
            recovery,
            policy,
            decision,
            tool,
            delegator: None,
            reflection: None,
            event_tx: None,
        }
    }

    pub fn with_delegator(mut self, delegator: &'a SubAgentDelegator) -> Self {
        self.delegator = Some(delegator);
        self
    }

    pub fn with_reflection(mut self, reflection: Reflection) -> Self {
        self.reflection = Some(reflection);
        self
    }

    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}

/// 运行一轮：直到 final、熔断或步数预算用尽。
/// 仅当恢复策略为 Abort（活动日志失败）时返回 Err，此时 history 停在出错前。
pub async fn run_turn(
    session: &ReactSession<'_>,
    history: &mut PromptHistory,
    ctx: &mut ActivityContext,
) -> Result<TurnResult, AgentError> {
    let mut guard = TurnGuard::new(session.policy.clone());
    let tools = session.executor.signatures();
    let mut last_text = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    while guard.begin_step() {
        let step = guard.steps_taken();
        session.send_event(ReactEvent::StepUpdate {
            step,
            max_steps: session.policy.step_budget,
        });

        let input = AgentStepInput {
            messages: history.render(),
            tools: tools.clone(),
        };
        let output = match decide(session, ctx, &input).await {
            Ok(output) => output,
            Err(e) => {
                match session.recovery.on_decision_error(&e) {
                    RecoveryAction::Abort => {
                        tracing::error!(instance = %ctx.instance_id(), step, error = %e, "decision journal failure, aborting turn");
                        return Err(e);
                    }
                    RecoveryAction::SkipStep => {
                        tracing::warn!(instance = %ctx.instance_id(), step, error = %e, "decision failed");
                    }
                    RecoveryAction::Observe(text) => {
                        tracing::warn!(instance = %ctx.instance_id(), step, error = %e, "decision failed");
                        history.push(PromptEntry::user(text));
                    }
                }
                continue;
            }
        };

        if let Some(call) = output.tool_call {
            guard.record_tool_call();
            tool_calls.push(call.clone());
            session.send_event(ReactEvent::ToolCall {
                tool: call.name.clone(),
                args: serde_json::Value::Object(call.arguments.clone()),
            });

            let result = handle_tool_call(session, &mut guard, ctx, &call).await?;
            history.push(PromptEntry::tool_result(&call.name, &result));
            if let Some(reflection) = &session.reflection {
                push_reflection(history, reflection, &call, &result, &tool_calls);
            }

            if let Some(final_text) = guard.circuit_breaker() {
                tracing::info!(
                    instance = %ctx.instance_id(),
                    steps = step,
                    tool_calls = guard.tool_calls_made(),
                    "tool budget reached with cached result, synthesizing final summary"
                );
                session.send_event(ReactEvent::CircuitBreaker {
                    tool_calls: guard.tool_calls_made(),
                });
                history.push(PromptEntry::assistant(&final_text));
                let text = strip_final_marker(&final_text);
                session.send_event(ReactEvent::Final { text: text.clone() });
                return Ok(TurnResult {
                    text,
                    end: TurnEnd::CircuitBreaker,
                    steps: step,
                    tool_calls,
                });
            }
            continue;
        }

        let Some(text) = output.text_content().map(str::to_string) else {
            // 既无工具也无文本：不写历史，继续
            continue;
        };
        history.push(PromptEntry::assistant(&text));
        if output.is_final {
            let text = strip_final_marker(&text);
            tracing::info!(instance = %ctx.instance_id(), steps = step, "final answer");
            session.send_event(ReactEvent::Final { text: text.clone() });
            return Ok(TurnResult {
                text,
                end: TurnEnd::Final,
                steps: step,
                tool_calls,
            });
        }
        session.send_event(ReactEvent::Thought { text: preview(&text) });
        last_text = text;
    }

    tracing::info!(
        instance = %ctx.instance_id(),
        steps = guard.steps_taken(),
        "step budget exhausted without final answer"
    );
    Ok(TurnResult {
        text: last_text,
        end: TurnEnd::BudgetExhausted,
        steps: guard.steps_taken(),
        tool_calls,
    })
}

async fn decide(
    session: &ReactSession<'_>,
    ctx: &mut ActivityContext,
    input: &AgentStepInput,
) -> Result<AgentStepOutput, AgentError> {
    let llm = session.llm;
    ctx.execute("decide", input, &session.decision, || async move {
        llm.decide(input).await.map_err(AgentError::from)
    })
    .await
}

/// 执行一次工具请求，返回写回历史的文本（失败也转成文本；活动日志失败除外）
async fn handle_tool_call(
    session: &ReactSession<'_>,
    guard: &mut TurnGuard,
    ctx: &mut ActivityContext,
    call: &ToolCall,
) -> Result<String, AgentError> {
    let name = call.name.as_str();

    let result = match session.delegator.filter(|d| d.handles(name)) {
        Some(delegator) => delegator.delegate(call, ctx).await,
        None => {
            if let Some(cached) = guard.cached(name) {
                tracing::info!(tool = name, "reusing cached result for guarded tool");
                let cached = cached.to_string();
                session.send_event(ReactEvent::Observation {
                    tool: name.to_string(),
                    preview: preview(&cached),
                    cached: true,
                });
                return Ok(cached);
            }
            let executor = session.executor;
            let out = ctx
                .execute(&format!("tool:{name}"), call, &session.tool, || async move {
                    executor.execute(call).await
                })
                .await;
            if let Ok(text) = &out {
                guard.remember(name, text);
            }
            out
        }
    };

    match result {
        Ok(text) => {
            session.send_event(ReactEvent::Observation {
                tool: name.to_string(),
                preview: preview(&text),
                cached: false,
            });
            Ok(text)
        }
        Err(e) => {
            let action = session.recovery.on_tool_error(&e);
            if action == RecoveryAction::Abort {
                tracing::error!(instance = %ctx.instance_id(), tool = name, error = %e, "tool journal failure, aborting turn");
                return Err(e);
            }
            tracing::warn!(tool = name, error = %e, "tool call failed");
            session.send_event(ReactEvent::ToolFailure {
                tool: name.to_string(),
                reason: e.to_string(),
            });
            Ok(match action {
                RecoveryAction::Observe(text) => text,
                _ => e.to_string(),
            })
        }
    }
}

fn push_reflection(
    history: &mut PromptHistory,
    reflection: &Reflection,
    call: &ToolCall,
    result: &str,
    tool_calls: &[ToolCall],
) {
    let arguments = serde_json::Value::Object(call.arguments.clone());
    history.push(PromptEntry::user(format!(
        "Reassess facts with new information:\n\n\
         Latest tool: {}\nArguments: {arguments}\nResult:\n{result}\n\n\
         Updated facts considered.",
        call.name
    )));
    let used: Vec<&str> = tool_calls.iter().map(|c| c.name.as_str()).collect();
    history.push(PromptEntry::user(format!(
        "Revise the analysis plan based on new data:\n\n\
         Tools used so far: {}\n{}\n\n\
         Analysis plan revised.",
        used.join(", "),
        reflection.progress_hint
    )));
}
