//! 编排层：决策协议、共享主循环、过程事件

pub mod events;
pub mod loop_;
pub mod protocol;

pub use events::ReactEvent;
pub use loop_::{run_turn, ReactSession, Reflection, TurnEnd, TurnResult};
pub use protocol::{is_final_text, strip_final_marker, AgentStepInput, AgentStepOutput, ToolCall};
