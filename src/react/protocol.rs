//! 决策协议：编排器与「决定下一步」操作之间的请求 / 响应契约
//!
//! AgentStepInput（渲染历史 + 工具目录）-> AgentStepOutput（final 文本 / 工具请求 / 中间文本）。
//! final 标记约定：修剪后的文本以 "final answer" / "final summary"（不区分大小写）开头。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::memory::Message;
use crate::tools::ToolSignature;

/// 模型请求的工具调用；参数为不透明的键值对，仅由目标工具自行校验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// 取第一个存在且非空的字符串参数（用于别名参数，如 company / company_name / query）
    pub fn first_str_arg(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|key| {
            self.arguments
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
    }
}

/// 单步决策输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStepInput {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSignature>,
}

/// 单步决策输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStepOutput {
    pub is_final: bool,
    pub output_text: Option<String>,
    pub tool_call: Option<ToolCall>,
    /// provider 原始消息（仅供日志）
    #[serde(default)]
    pub raw_message: Value,
}

impl AgentStepOutput {
    /// 普通文本输出，是否 final 由标记判断
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            is_final: is_final_text(&text),
            output_text: Some(text),
            tool_call: None,
            raw_message: Value::Null,
        }
    }

    /// 无法解析 / 空响应的降级结果：作为非 final 文本继续循环
    pub fn degraded(raw: impl Into<String>) -> Self {
        Self {
            is_final: false,
            output_text: Some(raw.into()),
            tool_call: None,
            raw_message: Value::Null,
        }
    }

    pub fn tool(call: ToolCall) -> Self {
        Self {
            is_final: false,
            output_text: None,
            tool_call: Some(call),
            raw_message: Value::Null,
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw_message = raw;
        self
    }

    /// 非空输出文本
    pub fn text_content(&self) -> Option<&str> {
        self.output_text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// is_final 只有在存在非空文本时才有效
    pub fn is_final_answer(&self) -> bool {
        self.is_final && self.text_content().is_some()
    }
}

const FINAL_MARKERS: [&str; 2] = ["final answer", "final summary"];

/// 修剪后的文本是否以 final 标记开头（不区分大小写）
pub fn is_final_text(text: &str) -> bool {
    let trimmed = text.trim();
    FINAL_MARKERS.iter().any(|m| starts_with_ignore_case(trimmed, m))
}

/// 去掉开头的 final 标记（及其后的冒号与空白）；没有标记时原样返回
pub fn strip_final_marker(text: &str) -> String {
    let stripped = text.trim_start();
    for marker in FINAL_MARKERS {
        if starts_with_ignore_case(stripped, marker) {
            let rest = &stripped[marker.len()..];
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            return rest.trim_start().to_string();
        }
    }
    text.to_string()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_detection_is_case_insensitive_prefix() {
        assert!(is_final_text("FINAL ANSWER: done"));
        assert!(is_final_text("  final summary: ok"));
        assert!(is_final_text("Final Answer"));
        assert!(!is_final_text("Here is my final answer: done"));
        assert!(!is_final_text(""));
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_final_marker("FINAL ANSWER: # Report"), "# Report");
        assert_eq!(strip_final_marker("  Final Summary:   It is sunny."), "It is sunny.");
        assert_eq!(strip_final_marker("final answer the rest"), "the rest");
        assert_eq!(strip_final_marker("no marker here"), "no marker here");
    }

    #[test]
    fn test_strip_marker_with_multibyte_text() {
        assert_eq!(strip_final_marker("FINAL SUMMARY: 北京晴"), "北京晴");
        assert_eq!(strip_final_marker("北京"), "北京");
    }

    #[test]
    fn test_is_final_requires_text() {
        let out = AgentStepOutput {
            is_final: true,
            output_text: None,
            tool_call: None,
            raw_message: Value::Null,
        };
        assert!(!out.is_final_answer());
        assert!(AgentStepOutput::text("FINAL ANSWER: x").is_final_answer());
        assert!(!AgentStepOutput::degraded("FINAL ANSWER: x").is_final_answer());
    }

    #[test]
    fn test_first_str_arg_aliases() {
        let call = ToolCall::new("company_research", json!({"company_name": "Acme", "query": "x"}));
        assert_eq!(call.first_str_arg(&["company", "company_name", "query"]), Some("Acme"));
        let empty = ToolCall::new("company_research", json!({"company": "  "}));
        assert_eq!(empty.first_str_arg(&["company", "company_name"]), None);
        let not_object = ToolCall::new("x", json!("scalar"));
        assert!(not_object.arguments.is_empty());
    }
}
