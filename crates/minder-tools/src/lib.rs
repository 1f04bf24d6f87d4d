mod args;
mod error;
mod registry;
mod tool;

pub mod builtin;

pub use args::JsonArg;
pub use error::{is_error_envelope, ErrorCode, ToolError};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolCall, ToolContext, ToolSchema};
