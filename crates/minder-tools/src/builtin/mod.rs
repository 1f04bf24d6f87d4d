mod exec;
mod memory;
mod query_database;
mod raw_query;
mod system_stats;

pub use exec::ExecTool;
pub use memory::MemoryTool;
pub use query_database::QueryDatabaseTool;
pub use raw_query::RawDbQueryTool;
pub use system_stats::SystemStatsTool;

use crate::registry::ToolRegistry;

/// Register the built-in tool set on a registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(MemoryTool);
    registry.register(ExecTool::default());
    registry.register(QueryDatabaseTool);
    registry.register(SystemStatsTool);
    registry.register(RawDbQueryTool);
}
