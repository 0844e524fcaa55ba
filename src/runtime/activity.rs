//! 活动执行：每个对外调用（决策、工具、子 Agent）都经由 ActivityContext::execute
//!
//! 1. 重放：日志中已有 (instance_id, seq) 的结果，且活动名与输入指纹都一致，则直接返回，不再调用
//! 2. 否则在超时内执行，瞬时错误按指数退避重试
//! 3. 记录最终结果（成功值或错误）与输入指纹
//!
//! seq 在实例内单调递增；编排逻辑本身是确定性的，所以重放时同一位置一定是同名、同输入的活动。
//! 名称或指纹不一致说明实例 id 被复用或逻辑变了，返回 AgentError::Journal，由调用方终止实例。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::RetrySection;
use crate::core::AgentError;
use crate::llm::LlmError;
use crate::runtime::{ActivityJournal, ActivityOutcome, InMemoryJournal, RecordedActivity};

/// 重试参数：max_attempts 含首次执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            initial_backoff_ms: section.initial_backoff_ms,
            max_backoff_ms: section.max_backoff_ms,
        }
    }
}

impl RetryConfig {
    /// 只执行一次
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// 第 attempt 次（从 0 开始）失败后的等待：min(max, initial * 2^attempt)；限流时不少于 Retry-After
    pub fn backoff(&self, attempt: u32, err: &AgentError) -> Duration {
        let exponential = self
            .initial_backoff_ms
            .saturating_mul(1u64 << attempt.min(31))
            .min(self.max_backoff_ms);
        let hinted = match err {
            AgentError::Llm(LlmError::RateLimited {
                retry_after_ms: Some(ms),
            }) => *ms,
            _ => 0,
        };
        Duration::from_millis(exponential.max(hinted))
    }
}

#[derive(Debug, Clone)]
pub struct ActivityOptions {
    pub timeout: Option<Duration>,
    pub retry: RetryConfig,
}

impl ActivityOptions {
    pub fn new(timeout_secs: u64, retry: RetryConfig) -> Self {
        Self {
            timeout: Some(Duration::from_secs(timeout_secs)),
            retry,
        }
    }

    /// 不额外加超时（调用方自己有超时，如 ToolExecutor）
    pub fn untimed(retry: RetryConfig) -> Self {
        Self {
            timeout: None,
            retry,
        }
    }
}

/// 活动输入指纹：sha256(活动名 + 输入的 JSON 序列化)，十六进制
pub fn fingerprint<I: Serialize + ?Sized>(name: &str, input: &I) -> Result<String, AgentError> {
    let bytes = serde_json::to_vec(input)
        .map_err(|e| AgentError::Journal(format!("fingerprint {name}: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// 编排实例的活动上下文：稳定的 instance_id + 递增的活动序号 + 共享日志
pub struct ActivityContext {
    instance_id: String,
    next_seq: u64,
    journal: Arc<dyn ActivityJournal>,
}

impl ActivityContext {
    pub fn new(instance_id: impl Into<String>, journal: Arc<dyn ActivityJournal>) -> Self {
        Self {
            instance_id: instance_id.into(),
            next_seq: 0,
            journal,
        }
    }

    /// 一次性实例（进程内日志，不可跨进程重放）
    pub fn ephemeral() -> Self {
        Self::new(
            format!("adhoc-{}", uuid::Uuid::new_v4()),
            Arc::new(InMemoryJournal::new()),
        )
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn journal(&self) -> Arc<dyn ActivityJournal> {
        self.journal.clone()
    }

    /// 子实例（如委派出去的研究 Agent）：共享日志，id 挂在父实例下
    pub fn child_id(&self, suffix: &str) -> String {
        format!("{}/{}", self.instance_id, suffix)
    }

    /// 下一个活动的序号
    pub fn peek_seq(&self) -> u64 {
        self.next_seq
    }

    /// 执行一个活动；input 是决定该活动结果的全部输入（用于重放校验）
    pub async fn execute<T, I, F, Fut>(
        &mut self,
        name: &str,
        input: &I,
        options: &ActivityOptions,
        mut op: F,
    ) -> Result<T, AgentError>
    where
        T: Serialize + DeserializeOwned,
        I: Serialize + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        let fingerprint = fingerprint(name, input)?;

        if let Some(recorded) = self.journal.load(&self.instance_id, seq)? {
            if recorded.name != name {
                return Err(AgentError::Journal(format!(
                    "non-deterministic replay in {} at #{seq}: journal has {}, got {name}",
                    self.instance_id, recorded.name
                )));
            }
            if recorded.fingerprint != fingerprint {
                return Err(AgentError::Journal(format!(
                    "non-deterministic replay in {} at #{seq}: input of {name} differs from the journal",
                    self.instance_id
                )));
            }
            tracing::debug!(instance = %self.instance_id, seq, activity = name, "replayed from journal");
            return match recorded.outcome {
                ActivityOutcome::Completed(value) => serde_json::from_value(value)
                    .map_err(|e| AgentError::Journal(format!("decode {name}#{seq}: {e}"))),
                ActivityOutcome::Failed(err) => Err(err),
            };
        }

        let mut attempt = 0u32;
        let result = loop {
            let outcome = match options.timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(r) => r,
                    Err(_) => Err(AgentError::Timeout {
                        operation: name.to_string(),
                        secs: limit.as_secs(),
                    }),
                },
                None => op().await,
            };
            match outcome {
                Err(e) if e.is_transient() && attempt + 1 < options.retry.max_attempts => {
                    let wait = options.retry.backoff(attempt, &e);
                    tracing::warn!(
                        instance = %self.instance_id,
                        activity = name,
                        attempt = attempt + 1,
                        backoff_ms = wait.as_millis() as u64,
                        error = %e,
                        "transient activity failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                other => break other,
            }
        };

        let outcome = match &result {
            Ok(value) => ActivityOutcome::Completed(
                serde_json::to_value(value).map_err(|e| AgentError::Journal(e.to_string()))?,
            ),
            Err(e) => ActivityOutcome::Failed(e.clone()),
        };
        self.journal.record(&RecordedActivity {
            instance_id: self.instance_id.clone(),
            seq,
            name: name.to_string(),
            fingerprint,
            outcome,
        })?;
        result
    }
}
