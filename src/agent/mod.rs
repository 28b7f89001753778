pub mod engine;
pub mod prompt;
pub mod tools;

pub use engine::{
    AgentConfig, AgentProgressEvent, ChatEngine, ChatReply, ENDPOINT_ERROR_REPLY,
    ROUND_LIMIT_REPLY,
};
pub use prompt::build_system_prompt;
pub use tools::{ToolError, ToolKind, ToolRegistry, ToolResult};
