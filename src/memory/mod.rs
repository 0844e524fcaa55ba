//! 记忆层：提示词条目、对话历史、会话快照持久化

pub mod entry;
pub mod history;
pub mod persistence;

pub use entry::{Message, PromptEntry, Role};
pub use history::PromptHistory;
pub use persistence::{SessionSnapshot, SessionStore};
