//! Agent 错误类型
//!
//! 编排循环内的失败一般不会向外抛出：由 RecoveryEngine 转成一条工具结果文本写回历史，
//! 让下一轮决策自行调整；活动日志失败（Journal）例外，直接终止当前实例。可序列化，便于活动日志（journal）记录失败结果并在重放时原样还原。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// 编排过程中可能出现的错误（决策、工具、委派、持久化等）
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("{tool} tool was called without a '{argument}' argument.")]
    DelegationArgumentMissing { tool: String, argument: String },

    #[error("Sub-agent failed: {0}")]
    SubAgentFailed(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Session {0} already has journaled turns but no snapshot; use a new session id or configure persistence.session_dir")]
    SessionConflict(String),
}

/// 循环内错误的处理方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 作为工具结果写回历史，继续循环
    Observe(String),
    /// 不写历史，仅消耗一步
    SkipStep,
    /// 终止当前编排实例（活动日志读写失败或重放分歧）
    Abort,
}

impl AgentError {
    /// 是否为瞬时故障（网络、限流、超时），活动执行器据此决定是否自动重试
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Timeout { .. } => true,
            AgentError::Llm(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for AgentError {
    fn from(e: rusqlite::Error) -> Self {
        AgentError::Journal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = AgentError::Timeout {
            operation: "decide".to_string(),
            secs: 60,
        };
        assert!(timeout.is_transient());
        assert!(AgentError::Llm(LlmError::RateLimited { retry_after_ms: None }).is_transient());
        assert!(!AgentError::UnknownTool("nope".to_string()).is_transient());
        assert!(!AgentError::Llm(LlmError::Http {
            status: 401,
            body: "invalid api key".to_string(),
        })
        .is_transient());
    }

    #[test]
    fn test_error_serde_roundtrip_keeps_variant() {
        let err = AgentError::ToolExecutionFailed {
            tool: "get_weather".to_string(),
            reason: "geocoding failed".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: AgentError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
