pub mod base;
pub mod file_storage;
pub mod memory_storage;

// Re-export the primary items so callers can do
// "use crate::storage::{DurableStorage, create_storage};"
pub use base::{create_storage, DurableStorage, ROLE_KEY, SESSION_KEYS, TOKEN_KEY, USERNAME_KEY};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
