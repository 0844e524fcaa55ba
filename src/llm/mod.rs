//! LLM 层：决策客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod traits;

pub use gemini::GeminiClient;
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use provider::{create_llm_from_config, Provider};
pub use traits::{LlmClient, LlmError};
