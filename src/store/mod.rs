//! Persistence layer - per-subsystem, per-profile key-value records
//!
//! All subsystems persist through [`PersistentStore`], a thin namespacing
//! wrapper over a [`StorageBackend`]: a durable, synchronous, string-keyed
//! medium. Records are serialized as flat JSON text; a value that fails to
//! parse is treated as absent and self-heals on the next save.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A durable, synchronous, string-keyed storage medium.
///
/// Writes are last-writer-wins; there is no merge or conflict detection.
/// Concurrent writers (e.g. two processes sharing one state file) are an
/// accepted race, documented, not locked against.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// All keys starting with `prefix`, in lexicographic order
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// In-memory backend for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.map.lock().unwrap().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.map.lock().unwrap().remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.map
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// File-backed storage: one JSON map file holding every key.
///
/// The whole map is loaded at open and written through on every mutation.
/// Known limitation: two processes writing the same file race with
/// last-writer-wins semantics and no cross-process lock.
pub struct FileStorage {
    path: PathBuf,
    map: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) the state file at `path`
    pub fn open(path: PathBuf) -> Result<Arc<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create state directory")?;
        }

        let map = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    // Corrupted state file: start from empty, next save heals it
                    warn!("State file {} is malformed ({}), starting empty", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Ok(Arc::new(Self {
            path,
            map: Mutex::new(map),
        }))
    }

    fn flush(&self, map: &BTreeMap<String, String>) {
        match serde_json::to_string_pretty(map) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(&self.path, contents) {
                    warn!("Failed to write state file {}: {}", self.path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize state map: {}", e),
        }
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        let mut map = self.map.lock().unwrap();
        map.insert(key.to_string(), value.to_string());
        self.flush(&map);
    }

    fn remove(&self, key: &str) {
        let mut map = self.map.lock().unwrap();
        if map.remove(key).is_some() {
            self.flush(&map);
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.map
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Namespaced record access for one subsystem.
///
/// Keys are `"{subsystem}:{profile}"` or `"{subsystem}:{profile}:{suffix}"`.
/// `load` never fails: missing or malformed data yields the record default.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn StorageBackend>,
    subsystem: &'static str,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn StorageBackend>, subsystem: &'static str) -> Self {
        Self { backend, subsystem }
    }

    fn key(&self, profile: &str, suffix: Option<&str>) -> String {
        match suffix {
            Some(s) => format!("{}:{}:{}", self.subsystem, profile, s),
            None => format!("{}:{}", self.subsystem, profile),
        }
    }

    fn profile_prefix(&self, profile: &str) -> String {
        format!("{}:{}", self.subsystem, profile)
    }

    /// Load a record, falling back to its default when absent or malformed
    pub fn load<T: DeserializeOwned + Default>(&self, profile: &str, suffix: Option<&str>) -> T {
        let key = self.key(profile, suffix);
        match self.backend.read(&key) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Malformed record at '{}' ({}), using default", key, e);
                    T::default()
                }
            },
            None => T::default(),
        }
    }

    /// Persist a record (synchronous, last-writer-wins)
    pub fn save<T: Serialize>(&self, profile: &str, suffix: Option<&str>, record: &T) {
        let key = self.key(profile, suffix);
        match serde_json::to_string(record) {
            Ok(raw) => {
                self.backend.write(&key, &raw);
                debug!("Saved record '{}'", key);
            }
            Err(e) => warn!("Failed to serialize record '{}': {}", key, e),
        }
    }

    /// Suffixes of every record stored for this subsystem and profile
    pub fn suffixes(&self, profile: &str) -> Vec<String> {
        let prefix = format!("{}:", self.profile_prefix(profile));
        self.backend
            .keys_with_prefix(&prefix)
            .into_iter()
            .map(|k| k[prefix.len()..].to_string())
            .collect()
    }

    /// Delete every record for this subsystem and profile
    pub fn reset(&self, profile: &str) {
        // Exact-match the bare key, prefix-match only past the separator,
        // so profile 'elev' never clears 'eleva'
        let bare = self.profile_prefix(profile);
        self.backend.remove(&bare);
        for key in self.backend.keys_with_prefix(&format!("{}:", bare)) {
            self.backend.remove(&key);
        }
        debug!("Reset namespace '{}'", bare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u32,
        note: String,
    }

    #[test]
    fn test_round_trip_deep_equal() {
        let backend = MemoryStorage::new();
        let store = PersistentStore::new(backend, "sample");

        let record = Sample { count: 7, note: "salut".to_string() };
        store.save("elev1", Some("cls5/m1"), &record);

        let loaded: Sample = store.load("elev1", Some("cls5/m1"));
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_malformed_data_yields_default() {
        let backend = MemoryStorage::new();
        backend.write("sample:elev1", "{not json");
        let store = PersistentStore::new(backend, "sample");

        let loaded: Sample = store.load("elev1", None);
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_reset_clears_only_own_namespace_and_profile() {
        let backend = MemoryStorage::new();
        let mine = PersistentStore::new(backend.clone(), "sample");
        let other = PersistentStore::new(backend, "other");

        mine.save("elev1", Some("a"), &Sample { count: 1, note: String::new() });
        mine.save("elev1", Some("b"), &Sample { count: 2, note: String::new() });
        mine.save("elev2", Some("a"), &Sample { count: 3, note: String::new() });
        mine.save("elev12", Some("a"), &Sample { count: 5, note: String::new() });
        other.save("elev1", None, &Sample { count: 4, note: String::new() });

        mine.reset("elev1");

        assert_eq!(mine.load::<Sample>("elev1", Some("a")), Sample::default());
        assert_eq!(mine.load::<Sample>("elev2", Some("a")).count, 3);
        // A profile that merely extends the reset one is untouched
        assert_eq!(mine.load::<Sample>("elev12", Some("a")).count, 5);
        assert_eq!(other.load::<Sample>("elev1", None).count, 4);
    }

    #[test]
    fn test_suffix_enumeration() {
        let backend = MemoryStorage::new();
        let store = PersistentStore::new(backend, "prof");
        store.save("elev1", Some("V-M1-L01"), &Sample::default());
        store.save("elev1", Some("V-M1-L02"), &Sample::default());
        store.save("elev1", Some("V-M2-L01"), &Sample::default());

        let mut suffixes = store.suffixes("elev1");
        suffixes.sort();
        assert_eq!(suffixes, vec!["V-M1-L01", "V-M1-L02", "V-M2-L01"]);
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let backend = FileStorage::open(path.clone()).unwrap();
            backend.write("progress:elev1", r#"{"x":1}"#);
        }

        let backend = FileStorage::open(path.clone()).unwrap();
        assert_eq!(backend.read("progress:elev1").unwrap(), r#"{"x":1}"#);
    }

    #[test]
    fn test_file_storage_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage!!").unwrap();

        let backend = FileStorage::open(path).unwrap();
        assert!(backend.read("anything").is_none());
        // Next write heals the file
        backend.write("k", "v");
        assert_eq!(backend.read("k").unwrap(), "v");
    }
}
