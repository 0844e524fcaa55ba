//! Steward - 可持久、可重放的工具调用型 Agent 编排
//!
//! 模块划分：
//! - **agent**: 单次请求助理、交互式聊天会话、公司研究子 Agent 与委派、组件构建
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、护栏、错误恢复
//! - **llm**: 决策操作抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **memory**: 提示词条目、对话历史、会话快照
//! - **observability**: 日志初始化
//! - **react**: 决策协议与共享编排主循环
//! - **runtime**: 活动执行（超时 / 重试 / 日志重放）
//! - **tools**: 工具签名、注册表、执行器与各工具实现

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod runtime;
pub mod tools;
