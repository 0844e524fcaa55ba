//! 核心层：错误与恢复、编排护栏

pub mod error;
pub mod guardrail;
pub mod recovery;

pub use error::{AgentError, RecoveryAction};
pub use guardrail::{GuardrailPolicy, TurnGuard};
pub use recovery::RecoveryEngine;
