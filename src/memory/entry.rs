//! 提示词条目与渲染后的消息
//!
//! PromptEntry 是历史中的一条不可变记录；Message 是渲染后的 role + text 对，
//! 交给决策操作时再由各 provider 映射为原生角色名。

use serde::{Deserialize, Serialize};

use crate::llm::Provider;

/// 渲染后消息的角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 渲染后的单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// provider 原生角色名：OpenAI 为 system/user/assistant；Gemini 为 user/model（system 走 systemInstruction）
    pub fn native_role(&self, provider: Provider) -> &'static str {
        match (provider, self.role) {
            (Provider::Gemini, Role::Assistant) => "model",
            (Provider::Gemini, _) => "user",
            (_, Role::System) => "system",
            (_, Role::User) => "user",
            (_, Role::Assistant) => "assistant",
        }
    }
}

/// 历史条目：按来源区分的标签变体，role 由变体推导
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptEntry {
    /// 固定的系统前言（或会话附加说明）
    System { text: String },
    /// 任务描述
    Task { text: String },
    /// 用户输入（含计划、反思提示）
    User { text: String },
    /// 模型输出的文本
    Assistant { text: String },
    /// 工具执行结果
    ToolResult { tool: String, text: String },
}

impl PromptEntry {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn task(text: impl Into<String>) -> Self {
        Self::Task { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into() }
    }

    pub fn tool_result(tool: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ToolResult {
            tool: tool.into(),
            text: text.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            PromptEntry::System { .. } => Role::System,
            PromptEntry::Task { .. } | PromptEntry::User { .. } | PromptEntry::ToolResult { .. } => {
                Role::User
            }
            PromptEntry::Assistant { .. } => Role::Assistant,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            PromptEntry::System { text }
            | PromptEntry::Task { text }
            | PromptEntry::User { text }
            | PromptEntry::Assistant { text }
            | PromptEntry::ToolResult { text, .. } => text,
        }
    }

    /// 渲染为单条消息；工具结果带上工具名前缀，便于模型与人阅读
    pub fn render(&self) -> Message {
        let content = match self {
            PromptEntry::ToolResult { tool, text } => format!("[Tool {tool} output]: {text}"),
            other => other.text().to_string(),
        };
        Message {
            role: self.role(),
            content,
        }
    }
}
