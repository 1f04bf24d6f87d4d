mod bootstrap;
mod namespace;
mod store;

pub use namespace::{resolve_namespace, sanitize_name, NS_SEPARATOR};
pub use store::{
    FileEntry, MemoryError, MemoryStore, Result, SearchHit, MEMORY_CATEGORY, MEMORY_COLLECTION,
};
