//! 编排护栏：步数预算、重复调用缓存、工具预算熔断
//!
//! 每个请求 / 每个聊天轮次新建一个 TurnGuard；计数与缓存不跨轮次。

use std::collections::HashMap;

use crate::config::AgentSection;

/// 护栏参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailPolicy {
    /// 单轮最多决策次数
    pub step_budget: usize,
    /// 工具调用次数达到该值且已有缓存结果时熔断
    pub tool_budget: usize,
    /// 成功结果可在本轮内复用的工具
    pub guarded_tools: Vec<String>,
}

impl GuardrailPolicy {
    pub fn single_shot(agent: &AgentSection) -> Self {
        Self {
            step_budget: agent.single_shot_max_steps,
            tool_budget: agent.tool_budget,
            guarded_tools: agent.guarded_tools.clone(),
        }
    }

    pub fn chat_turn(agent: &AgentSection) -> Self {
        Self {
            step_budget: agent.chat_max_steps_per_turn,
            ..Self::single_shot(agent)
        }
    }

    /// 研究子 Agent 只受步数预算约束
    pub fn research(agent: &AgentSection) -> Self {
        Self {
            step_budget: agent.research_max_steps,
            tool_budget: agent.tool_budget,
            guarded_tools: Vec::new(),
        }
    }
}

/// 单轮护栏状态
#[derive(Debug)]
pub struct TurnGuard {
    policy: GuardrailPolicy,
    steps_taken: usize,
    tool_calls_made: usize,
    cache: HashMap<String, String>,
    last_cached: Option<String>,
}

impl TurnGuard {
    pub fn new(policy: GuardrailPolicy) -> Self {
        Self {
            policy,
            steps_taken: 0,
            tool_calls_made: 0,
            cache: HashMap::new(),
            last_cached: None,
        }
    }

    /// 开始新一步；预算用尽时返回 false 且不计数
    pub fn begin_step(&mut self) -> bool {
        if self.steps_taken >= self.policy.step_budget {
            return false;
        }
        self.steps_taken += 1;
        true
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn record_tool_call(&mut self) {
        self.tool_calls_made += 1;
    }

    pub fn tool_calls_made(&self) -> usize {
        self.tool_calls_made
    }

    pub fn is_guarded(&self, tool: &str) -> bool {
        self.policy.guarded_tools.iter().any(|t| t == tool)
    }

    /// 本轮已缓存的成功结果
    pub fn cached(&self, tool: &str) -> Option<&str> {
        self.cache.get(tool).map(String::as_str)
    }

    /// 记住受保护工具的成功结果（非受保护工具忽略）
    pub fn remember(&mut self, tool: &str, result: &str) {
        if !self.is_guarded(tool) {
            return;
        }
        self.cache.insert(tool.to_string(), result.to_string());
        self.last_cached = Some(tool.to_string());
    }

    /// 熔断检查：达到工具预算且有缓存结果时，返回合成的 final 文本（带标记）
    pub fn circuit_breaker(&self) -> Option<String> {
        if self.tool_calls_made < self.policy.tool_budget {
            return None;
        }
        let tool = self.last_cached.as_deref()?;
        let cached = self.cache.get(tool)?;
        Some(synthesize_final(tool, cached))
    }
}

fn synthesize_final(tool: &str, cached: &str) -> String {
    format!(
        "FINAL SUMMARY: {cached} I used the {tool} tool to retrieve these conditions \
         and stopped calling tools once I had a reliable result."
    )
}
