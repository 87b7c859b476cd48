use std::sync::Arc;

use tracing::info;

use super::{file_storage::FileStorage, memory_storage::MemoryStorage};
use crate::config::StorageConfig;

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";
pub const ROLE_KEY: &str = "role";

/// Every key the session owns; purged together.
pub const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, USERNAME_KEY, ROLE_KEY];

/// Durable client-side key/value storage, the console's equivalent of
/// browser local storage.
///
/// Each call is a single atomic read or write. Implementations swallow and
/// log their own I/O failures: a read that fails is reported as absent, a
/// write that fails leaves the previous value in place.
pub trait DurableStorage: Send + Sync {
    /// A descriptive name for logs.
    fn name(&self) -> &str;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Creates a concrete storage backend based on the StorageConfig.
pub fn create_storage(config: &StorageConfig) -> Arc<dyn DurableStorage> {
    match config {
        StorageConfig::Memory => {
            info!("Using in-memory session storage.");
            Arc::new(MemoryStorage::new())
        }
        StorageConfig::File(file_config) => {
            info!(
                "Using file session storage at '{}'.",
                file_config.path.display()
            );
            Arc::new(FileStorage::new(&file_config.path))
        }
    }
}
