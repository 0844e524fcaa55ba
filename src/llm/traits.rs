//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient：
//! decide（决策操作：历史 + 工具目录 -> AgentStepOutput）与 complete（纯文本补全，供研究类工具使用）。
//! 编排循环只依赖这个 trait，从不按 provider 分支。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::Provider;
use crate::memory::Message;
use crate::react::{AgentStepInput, AgentStepOutput};

/// LLM 调用错误（传输层 / HTTP / 限流）
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LlmError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("transport: {0}")]
    Transport(String),
}

impl LlmError {
    /// 429 / 5xx / 传输错误可重试；其余 4xx 不可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => *status >= 500,
            LlmError::RateLimited { .. } | LlmError::Transport(_) => true,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => LlmError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => LlmError::Transport(e.to_string()),
        }
    }
}

/// 决策操作能力：每个 provider 一个实现，由启动流程选定后注入编排器
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 当前实现对应的 provider（决定历史渲染时的原生角色名）
    fn provider(&self) -> Provider;

    /// 决策：给定完整渲染历史与工具目录，返回 final 文本 / 工具请求 / 中间文本之一。
    /// 对相同输入必须可安全重试；无法解析的响应应降级为非 final 文本而不是返回 Err。
    async fn decide(&self, input: &AgentStepInput) -> Result<AgentStepOutput, LlmError>;

    /// 非流式纯文本补全（不带工具）
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}
