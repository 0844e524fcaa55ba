//! Mock / 脚本化 LLM 客户端（用于测试与无 Key 的本地运行）
//!
//! MockLlmClient 回显最后一条用户消息并直接给出 final；
//! ScriptedLlmClient 按顺序吐出预置的决策结果，并记录每次收到的输入，便于断言编排行为。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Provider};
use crate::memory::{Message, Role};
use crate::react::{AgentStepInput, AgentStepOutput};

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn decide(&self, input: &AgentStepInput) -> Result<AgentStepOutput, LlmError> {
        Ok(AgentStepOutput::text(format!(
            "FINAL SUMMARY: Echo from Mock: {}",
            last_user(&input.messages)
        )))
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(format!("Echo from Mock: {}", last_user(messages)))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// 脚本化客户端：decide 依次返回预置结果，耗尽后返回 fallback（默认空文本，即无操作）
pub struct ScriptedLlmClient {
    decisions: Mutex<VecDeque<Result<AgentStepOutput, LlmError>>>,
    completions: Mutex<VecDeque<String>>,
    fallback: AgentStepOutput,
    delay: Option<Duration>,
    inputs: Mutex<Vec<AgentStepInput>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new(decisions: Vec<AgentStepOutput>) -> Self {
        Self::with_results(decisions.into_iter().map(Ok).collect())
    }

    /// 允许脚本中夹带错误（用于重试 / 降级测试）
    pub fn with_results(decisions: Vec<Result<AgentStepOutput, LlmError>>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            completions: Mutex::new(VecDeque::new()),
            fallback: AgentStepOutput::degraded(""),
            delay: None,
            inputs: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_completions(self, completions: Vec<String>) -> Self {
        *lock(&self.completions) = completions.into();
        self
    }

    pub fn with_fallback(mut self, fallback: AgentStepOutput) -> Self {
        self.fallback = fallback;
        self
    }

    /// 每次 decide 前等待（模拟慢模型）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 已收到的决策输入（按调用顺序）
    pub fn inputs(&self) -> Vec<AgentStepInput> {
        lock(&self.inputs).clone()
    }

    pub fn decide_calls(&self) -> usize {
        lock(&self.inputs).len()
    }

    /// complete 收到的最后一条用户消息
    pub fn completion_prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn decide(&self, input: &AgentStepInput) -> Result<AgentStepOutput, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.inputs).push(input.clone());
        let next = lock(&self.decisions).pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        lock(&self.prompts).push(last_user(messages).to_string());
        Ok(lock(&self.completions).pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_final() {
        let input = AgentStepInput {
            messages: vec![Message::system("sys"), Message::user("hello")],
            tools: vec![],
        };
        let out = MockLlmClient.decide(&input).await.unwrap();
        assert!(out.is_final_answer());
        assert_eq!(
            out.output_text.as_deref(),
            Some("FINAL SUMMARY: Echo from Mock: hello")
        );
    }

    #[tokio::test]
    async fn test_scripted_replays_then_falls_back() {
        let client = ScriptedLlmClient::new(vec![AgentStepOutput::text("first")]);
        let input = AgentStepInput {
            messages: vec![Message::user("q")],
            tools: vec![],
        };
        let a = client.decide(&input).await.unwrap();
        let b = client.decide(&input).await.unwrap();
        assert_eq!(a.output_text.as_deref(), Some("first"));
        assert!(b.text_content().is_none());
        assert_eq!(client.decide_calls(), 2);
    }
}
