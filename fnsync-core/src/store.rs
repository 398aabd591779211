// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Thread-safe handle store using DashMap.
//!
//! Holds the persisted handle of every managed resource between runs, keyed by
//! resource key, and round-trips it through a JSON state file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{FnsyncError, FnsyncResult};
use crate::identity;
use crate::reconciler::ManagedResource;
use crate::types::{FunctionName, PersistedHandle, PlatformAddress};

/// Current state file layout.
const STATE_FILE_VERSION: u32 = 1;

/// What is remembered about a resource between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResource {
    /// Name and address are kept so a resource dropped from the manifest can
    /// still be deleted.
    pub name: FunctionName,
    pub address: PlatformAddress,
    pub handle: PersistedHandle,
    #[serde(default)]
    pub environment_digest: String,
}

impl StoredResource {
    /// Snapshot a managed resource after reconciliation.
    pub fn from_resource(resource: &ManagedResource) -> Self {
        let desired = resource.desired();
        Self {
            name: desired.name.clone(),
            address: desired.address.clone(),
            handle: resource.handle().clone(),
            environment_digest: identity::environment_digest(desired.environment.as_ref()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    resources: BTreeMap<String, StoredResource>,
}

/// Concurrent map of resource key to stored resource.
#[derive(Debug, Default)]
pub struct HandleStore {
    resources: DashMap<String, StoredResource>,
}

impl HandleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }

    /// Create a store wrapped in an Arc for sharing across tasks.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Load a state file. A missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> FnsyncResult<Self> {
        let path = path.as_ref();

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No state file, starting empty");
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(FnsyncError::Io {
                    context: "reading state file",
                    source: e,
                })
            }
        };

        let file: StateFile =
            serde_json::from_slice(&content).map_err(|e| FnsyncError::StateFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if file.version != STATE_FILE_VERSION {
            return Err(FnsyncError::StateFile {
                path: path.to_path_buf(),
                message: format!(
                    "unsupported version {} (expected {})",
                    file.version, STATE_FILE_VERSION
                ),
            });
        }

        let store = Self::new();
        for (key, resource) in file.resources {
            store.resources.insert(key, resource);
        }

        tracing::debug!(path = %path.display(), resources = store.len(), "Loaded state file");
        Ok(store)
    }

    /// Write the state file, replacing any previous one atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> FnsyncResult<()> {
        let path = path.as_ref();
        let file = StateFile {
            version: STATE_FILE_VERSION,
            resources: self
                .resources
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect(),
        };

        let content = serde_json::to_vec_pretty(&file).map_err(|e| FnsyncError::StateFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content).map_err(|e| FnsyncError::Io {
            context: "writing state file",
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| FnsyncError::Io {
            context: "replacing state file",
            source: e,
        })?;

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<StoredResource> {
        self.resources.get(key).map(|r| r.value().clone())
    }

    pub fn put(&self, key: impl Into<String>, resource: StoredResource) {
        self.resources.insert(key.into(), resource);
    }

    pub fn remove(&self, key: &str) -> Option<StoredResource> {
        self.resources.remove(key).map(|(_, resource)| resource)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    /// All resource keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.resources.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    fn stored(name: &str) -> StoredResource {
        StoredResource {
            name: FunctionName::new(name).unwrap(),
            address: PlatformAddress::new("10.0.0.5").unwrap(),
            handle: PersistedHandle::present(Identity::from_persisted(format!(
                "10.0.0.5 {} abc 1",
                name
            ))),
            environment_digest: String::new(),
        }
    }

    #[test]
    fn test_put_get_remove() {
        let store = HandleStore::new();
        store.put("greet", stored("greet"));

        assert!(store.contains("greet"));
        assert_eq!(store.get("greet"), Some(stored("greet")));
        assert_eq!(store.remove("greet"), Some(stored("greet")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = HandleStore::new();
        store.put("greet", stored("greet"));
        store.put("resize", stored("resize"));
        store.save(&path).unwrap();

        let loaded = HandleStore::load(&path).unwrap();
        assert_eq!(loaded.keys(), vec!["greet".to_string(), "resize".to_string()]);
        assert_eq!(loaded.get("resize"), Some(stored("resize")));
        assert!(!dir.path().join("state.tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HandleStore::load(dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_rejects_garbage_and_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            HandleStore::load(&path),
            Err(FnsyncError::StateFile { .. })
        ));

        std::fs::write(&path, r#"{"version": 9, "resources": {}}"#).unwrap();
        assert!(matches!(
            HandleStore::load(&path),
            Err(FnsyncError::StateFile { .. })
        ));
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let store = HandleStore::new_shared();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.put(format!("fn-{}", i), stored(&format!("fn-{}", i)));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 10);
    }
}
