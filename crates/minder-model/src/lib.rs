mod types;
mod client;
mod mock;
pub mod catalog;

pub use types::{Message, Role, ToolCallRequest, ToolSchema, Usage};
pub use client::{ChatRequest, ChatResponse, LlmClient};
pub use mock::ScriptedClient;
