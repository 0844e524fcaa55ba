//! 工具注册表
//!
//! 所有工具实现 Tool trait（签名 + 异步执行），由 ToolRegistry 按名注册与查找。
//! 注册表在编排开始前一次性构建，之后只读共享（放入 ToolExecutor 再包 Arc），无需加锁。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::AgentError;
use crate::tools::ToolSignature;

/// 工具自身的失败：参数不合法 / 执行失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl From<String> for ToolError {
    fn from(reason: String) -> Self {
        ToolError::Failed(reason)
    }
}

/// 工具 trait：静态签名 + 异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具签名（名称、描述、参数 schema），注册时读取一次
    fn signature(&self) -> ToolSignature;

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError>;
}

/// 把 JSON 参数解码为工具自己的参数结构体
pub fn decode_args<A: DeserializeOwned>(args: Map<String, Value>) -> Result<A, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

struct Registered {
    signature: ToolSignature,
    tool: Arc<dyn Tool>,
}

/// 工具注册表：按名称存储（BTreeMap 保证工具目录顺序稳定，决策输入因此可重放）
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Registered>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let signature = tool.signature();
        self.tools.insert(
            signature.name.clone(),
            Registered {
                signature,
                tool: Arc::new(tool),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|r| r.tool.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Map<String, Value>) -> Result<String, AgentError> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.execute(args).await.map_err(|e| match e {
            ToolError::InvalidArguments(reason) => AgentError::InvalidToolArguments {
                tool: name.to_string(),
                reason,
            },
            ToolError::Failed(reason) => AgentError::ToolExecutionFailed {
                tool: name.to_string(),
                reason,
            },
        })
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 全部工具签名（工具目录）
    pub fn signatures(&self) -> Vec<ToolSignature> {
        self.tools.values().map(|r| r.signature.clone()).collect()
    }
}
