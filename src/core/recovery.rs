//! 错误恢复引擎
//!
//! 循环内的错误通常不外抛：根据 AgentError 类型决定写回历史的观察文本，或仅消耗一步。
//! 唯一例外是活动日志失败，此时实例已无法保证重放一致，直接终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 工具 / 委派失败：转成工具结果文本，让下一轮决策换个做法
    pub fn on_tool_error(&self, err: &AgentError) -> RecoveryAction {
        let text = match err {
            AgentError::Journal(_) => return RecoveryAction::Abort,
            AgentError::UnknownTool(name) => format!(
                "Error: unknown tool '{name}'. Choose one of the available tools or answer directly."
            ),
            AgentError::InvalidToolArguments { tool, reason } => format!(
                "Error: invalid arguments for {tool}: {reason}. Check the tool's parameters and try again."
            ),
            AgentError::ToolExecutionFailed { tool, reason } => {
                format!("Error: {tool} failed: {reason}")
            }
            AgentError::DelegationArgumentMissing { .. } => err.to_string(),
            AgentError::Timeout { operation, secs } => {
                format!("Error: {operation} did not finish within {secs}s.")
            }
            other => format!("Error: {other}"),
        };
        RecoveryAction::Observe(text)
    }

    /// 决策失败（重试耗尽）：不写历史，消耗一步，由步数预算兜底
    pub fn on_decision_error(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::Journal(_) => RecoveryAction::Abort,
            _ => RecoveryAction::SkipStep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_unknown_tool_is_observed() {
        let engine = RecoveryEngine::new();
        match engine.on_tool_error(&AgentError::UnknownTool("fake_tool".to_string())) {
            RecoveryAction::Observe(msg) => assert!(msg.contains("fake_tool")),
            other => panic!("Expected Observe, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_delegation_argument_text() {
        let engine = RecoveryEngine::new();
        let err = AgentError::DelegationArgumentMissing {
            tool: "company_research".to_string(),
            argument: "company".to_string(),
        };
        assert_eq!(
            engine.on_tool_error(&err),
            RecoveryAction::Observe(
                "company_research tool was called without a 'company' argument.".to_string()
            )
        );
    }

    #[test]
    fn test_tool_failure_includes_reason() {
        let engine = RecoveryEngine::new();
        let err = AgentError::ToolExecutionFailed {
            tool: "get_weather".to_string(),
            reason: "Could not find coordinates for \"Atlantis\".".to_string(),
        };
        match engine.on_tool_error(&err) {
            RecoveryAction::Observe(msg) => assert!(msg.contains("Atlantis")),
            other => panic!("Expected Observe, got {other:?}"),
        }
    }

    #[test]
    fn test_decision_failure_skips_step() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Llm(LlmError::Http {
            status: 400,
            body: "bad request".to_string(),
        });
        assert_eq!(engine.on_decision_error(&err), RecoveryAction::SkipStep);
    }

    #[test]
    fn test_journal_failures_abort() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Journal("non-deterministic replay".to_string());
        assert_eq!(engine.on_decision_error(&err), RecoveryAction::Abort);
        assert_eq!(engine.on_tool_error(&err), RecoveryAction::Abort);
    }
}
