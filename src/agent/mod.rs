//! Agent 层：单次请求助理、交互式会话、公司研究子 Agent 与委派

pub mod assistant;
pub mod builder;
pub mod delegate;
pub mod prompts;
pub mod research;
pub mod session;

pub use assistant::{AssistantResult, PersonalAssistant};
pub use builder::{AgentBuilder, AgentComponents};
pub use delegate::{bounded_summary, SubAgent, SubAgentDelegator};
pub use research::{CompanyResearchAgent, ResearchReport};
pub use session::{
    ChatMessage, ChatResponse, ChatSession, SessionConfig, SessionHandle, SessionSummary,
};
