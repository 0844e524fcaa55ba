//! 工具执行器
//!
//! 持有只读的 ToolRegistry 与单次调用超时，execute(call) 在超时内调用 registry.execute，
//! 未知工具 / 参数错误 / 执行失败 / 超时统一为 AgentError；每次调用输出结构化审计日志（JSON）。
//! 执行器本身无状态、无缓存（重复调用的复用由编排循环的护栏负责）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::react::ToolCall;
use crate::tools::{ToolRegistry, ToolSignature};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<String, AgentError> {
        let start = Instant::now();
        let args_preview = args_preview(&call.arguments);
        let result = timeout(
            self.timeout,
            self.registry.execute(&call.name, call.arguments.clone()),
        )
        .await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(AgentError::UnknownTool(_))) => "unknown_tool",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(r) => r,
            Err(_) => Err(AgentError::Timeout {
                operation: format!("tool {}", call.name),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn signatures(&self) -> Vec<ToolSignature> {
        self.registry.signatures()
    }
}

fn args_preview(args: &serde_json::Map<String, serde_json::Value>) -> String {
    let s = serde_json::Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
