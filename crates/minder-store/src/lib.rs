mod store;
mod mem;
mod json_dir;

pub use store::{matches_filter, ConfigStore, DocumentStore, Result, StoreError, WriteAck};
pub use mem::{MemConfigStore, MemDocumentStore};
pub use json_dir::JsonDirConfigStore;
