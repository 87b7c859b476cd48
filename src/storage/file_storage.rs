use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, error, warn};

use super::DurableStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("session file '{path}' is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

type Entries = BTreeMap<String, String>;

/// Keeps the session keys in a single JSON object on disk.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// reader never observes a half-written document.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: &Path) -> Self {
        FileStorage {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn update(&self, key: &str, apply: impl FnOnce(&mut Entries)) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(StorageError::Corrupt { .. }) => {
                // An unreadable document holds nothing we can trust; start over.
                warn!("Session file '{}' is corrupt, rewriting it.", self.path.display());
                Entries::new()
            }
            Err(e) => {
                error!("Failed to update session key '{}': {}", key, e);
                return;
            }
        };
        apply(&mut entries);
        if let Err(e) = self.persist(&entries) {
            error!("Failed to update session key '{}': {}", key, e);
        }
    }
}

impl DurableStorage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                warn!("Treating session key '{}' as absent: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        debug!("Writing session key '{}' to {}", key, self.path.display());
        self.update(key, |entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        debug!("Removing session key '{}' from {}", key, self.path.display());
        self.update(key, |entries| {
            entries.remove(key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_values_survive_a_new_instance() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let storage = FileStorage::new(&path);
        storage.set("token", "a.b.c");
        storage.set("username", "alice");

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("token").as_deref(), Some("a.b.c"));
        assert_eq!(reopened.get("username").as_deref(), Some("alice"));
        assert_eq!(reopened.get("role"), None);
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(&dir.path().join("absent.json"));
        assert_eq!(storage.get("token"), None);
        storage.remove("token");
    }

    #[test]
    fn test_remove_only_touches_one_key() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(&dir.path().join("nested/dir/session.json"));
        storage.set("token", "a.b.c");
        storage.set("role", "admin");
        storage.remove("token");
        assert_eq!(storage.get("token"), None);
        assert_eq!(storage.get("role").as_deref(), Some("admin"));
    }

    #[test]
    fn test_corrupt_file_is_absent_then_rewritten() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").expect("write");

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get("token"), None);

        storage.set("username", "bob");
        assert_eq!(storage.get("username").as_deref(), Some("bob"));
    }
}
