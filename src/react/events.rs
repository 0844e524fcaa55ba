//! 编排过程事件：供 CLI 等前端展示步数、工具调用与观察结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 第几步 / 预算
    StepUpdate { step: usize, max_steps: usize },
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览）；cached 表示复用了本轮已有结果
    Observation {
        tool: String,
        preview: String,
        cached: bool,
    },
    ToolFailure { tool: String, reason: String },
    /// 中间文本（未带 final 标记）
    Thought { text: String },
    /// 工具预算熔断
    CircuitBreaker { tool_calls: usize },
    Final { text: String },
}
