//! Cache version registry
//!
//! Maps a domain key to a monotonically increasing version, starting at 1.
//! The whole map is persisted under [`VERSION_STORE_KEY`] after every change.

use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Storage key holding the persisted version map
pub const VERSION_STORE_KEY: &str = "cache_version_store";

const INITIAL_VERSION: u64 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedVersions {
    #[serde(rename = "versionMap", default)]
    version_map: BTreeMap<String, u64>,
}

/// Domain key -> version mapping shared by every cache reader and writer
pub struct VersionRegistry {
    backend: Arc<dyn StorageBackend>,
    versions: Mutex<BTreeMap<String, u64>>,
}

impl VersionRegistry {
    /// Restore the registry from storage.
    ///
    /// A missing or corrupt persisted map starts empty; versions below 1 are
    /// normalized to 1.
    pub fn load(backend: Arc<dyn StorageBackend>) -> Self {
        let versions = match backend.get_item(VERSION_STORE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<PersistedVersions>(&raw) {
                Ok(persisted) => persisted
                    .version_map
                    .into_iter()
                    .map(|(k, v)| (k, v.max(INITIAL_VERSION)))
                    .collect(),
                Err(e) => {
                    warn!("Discarding unreadable cache version map: {}", e);
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read cache version map: {}", e);
                BTreeMap::new()
            }
        };

        debug!("Loaded {} cache version(s)", versions.len());
        Self {
            backend,
            versions: Mutex::new(versions),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        self.versions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, versions: &BTreeMap<String, u64>) {
        let persisted = PersistedVersions {
            version_map: versions.clone(),
        };
        let raw = match serde_json::to_string(&persisted) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache version map: {}", e);
                return;
            }
        };
        if let Err(e) = self.backend.set_item(VERSION_STORE_KEY, &raw) {
            warn!("Failed to persist cache version map: {}", e);
        }
    }

    /// Current version of a domain, initializing it to 1 on first access
    pub fn current_version(&self, domain_key: &str) -> u64 {
        let mut versions = self.lock();
        match versions.entry(domain_key.to_string()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                entry.insert(INITIAL_VERSION);
                self.persist(&versions);
                INITIAL_VERSION
            }
        }
    }

    /// Version tag `{domain_key}_v{version}` stamped on cells
    pub fn cache_key(&self, domain_key: &str) -> String {
        format!("{}_v{}", domain_key, self.current_version(domain_key))
    }

    /// Increment a domain's version, orphaning every cell stamped with the old one
    pub fn bump(&self, domain_key: &str) -> u64 {
        let mut versions = self.lock();
        let version = versions
            .entry(domain_key.to_string())
            .or_insert(INITIAL_VERSION);
        *version += 1;
        let bumped = *version;
        self.persist(&versions);
        debug!("Bumped cache domain {} to v{}", domain_key, bumped);
        bumped
    }

    /// Reset a domain to version 1
    pub fn reset(&self, domain_key: &str) {
        let mut versions = self.lock();
        versions.insert(domain_key.to_string(), INITIAL_VERSION);
        self.persist(&versions);
    }

    /// Reset the given domains, or every known domain when `None`
    pub fn reset_many(&self, domain_keys: Option<&[String]>) {
        let mut versions = self.lock();
        match domain_keys {
            Some(keys) if !keys.is_empty() => {
                for key in keys {
                    versions.insert(key.clone(), INITIAL_VERSION);
                }
            }
            _ => {
                for version in versions.values_mut() {
                    *version = INITIAL_VERSION;
                }
            }
        }
        self.persist(&versions);
    }

    /// Forget a domain; its next access lazily starts at version 1 again
    pub fn delete(&self, domain_key: &str) {
        let mut versions = self.lock();
        if versions.remove(domain_key).is_some() {
            self.persist(&versions);
        }
    }

    /// Forget every domain
    pub fn clear_all(&self) {
        let mut versions = self.lock();
        versions.clear();
        self.persist(&versions);
    }

    /// Copy of the current map
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.lock().clone()
    }

    /// Re-write the in-memory map to storage
    pub fn flush(&self) {
        let versions = self.lock();
        self.persist(&versions);
    }
}

impl std::fmt::Debug for VersionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionRegistry")
            .field("versions", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn registry() -> (VersionRegistry, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        (VersionRegistry::load(backend.clone()), backend)
    }

    #[test]
    fn unknown_key_starts_at_one() {
        let (registry, _) = registry();
        assert_eq!(registry.current_version("trip"), 1);
        assert_eq!(registry.cache_key("trip"), "trip_v1");
        assert_eq!(registry.cache_key("trip"), "trip_v1");
    }

    #[test]
    fn bump_increments() {
        let (registry, _) = registry();
        assert_eq!(registry.bump("trip"), 2);
        assert_eq!(registry.bump("trip"), 3);
        assert_eq!(registry.cache_key("trip"), "trip_v3");
        assert_eq!(registry.cache_key("empl"), "empl_v1");
    }

    #[test]
    fn reset_and_delete() {
        let (registry, _) = registry();
        registry.bump("a");
        registry.bump("b");

        registry.reset("a");
        assert_eq!(registry.current_version("a"), 1);
        assert_eq!(registry.current_version("b"), 2);

        registry.delete("b");
        assert!(!registry.snapshot().contains_key("b"));
        assert_eq!(registry.current_version("b"), 1);
    }

    #[test]
    fn reset_many_selected_and_all() {
        let (registry, _) = registry();
        registry.bump("a");
        registry.bump("b");
        registry.bump("c");

        registry.reset_many(Some(&["a".to_string()]));
        assert_eq!(registry.current_version("a"), 1);
        assert_eq!(registry.current_version("b"), 2);

        registry.reset_many(None);
        assert!(registry.snapshot().values().all(|v| *v == 1));
    }

    #[test]
    fn survives_restart() {
        let (registry, backend) = registry();
        registry.bump("trip_2025-01-01_2025-01-31");
        drop(registry);

        let restored = VersionRegistry::load(backend);
        assert_eq!(
            restored.cache_key("trip_2025-01-01_2025-01-31"),
            "trip_2025-01-01_2025-01-31_v2"
        );
    }

    #[test]
    fn persisted_shape_is_the_map_only() {
        let (registry, backend) = registry();
        registry.bump("trip");

        let raw = backend.get_item(VERSION_STORE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"versionMap": {"trip": 2}}));
    }

    #[test]
    fn corrupt_map_and_zero_versions_are_normalized() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item(VERSION_STORE_KEY, "{not json").unwrap();
        assert!(VersionRegistry::load(backend.clone()).snapshot().is_empty());

        backend
            .set_item(VERSION_STORE_KEY, r#"{"versionMap":{"trip":0}}"#)
            .unwrap();
        assert_eq!(VersionRegistry::load(backend).current_version("trip"), 1);
    }

    #[test]
    fn clear_all_forgets_everything() {
        let (registry, _) = registry();
        registry.bump("a");
        registry.clear_all();
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.current_version("a"), 1);
    }
}
