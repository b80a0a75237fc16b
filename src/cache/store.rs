//! Expiring, version-stamped key-value cache

use super::version::{VersionRegistry, VERSION_STORE_KEY};
use crate::clock::Clock;
use crate::storage::StorageBackend;
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// One stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheCell {
    /// Cached payload
    pub data: Value,

    /// Absolute expiry in epoch milliseconds
    #[serde(rename = "expireAt")]
    pub expire_at: i64,

    /// Version tag (`{key}_v{n}`) current when the cell was written
    pub version: String,
}

/// When a cell stops being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// At an absolute instant
    At(DateTime<Utc>),
    /// Never expires on its own; only version changes evict it
    Infinite,
    /// At the end of the current local day
    EndOfDay,
}

impl Expiry {
    /// Far-future stand-in for "never"
    pub fn infinite_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2099, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expire after a duration from `now`
    pub fn after(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::At(now + ttl)
    }

    /// Resolve to epoch milliseconds relative to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> i64 {
        match self {
            Self::At(at) => at.timestamp_millis(),
            Self::Infinite => Self::infinite_at().timestamp_millis(),
            Self::EndOfDay => end_of_local_day(now).timestamp_millis(),
        }
    }
}

fn end_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let last_moment = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    now.with_timezone(&Local)
        .date_naive()
        .and_time(last_moment)
        .and_local_timezone(Local)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1))
}

/// Self-cleaning cache over a storage backend.
///
/// Writes are best-effort: storage failures are logged and swallowed. Reads
/// evict any cell they refuse to serve. All access to the backend goes
/// through one lock so a completed `set` is visible to every later `get`.
pub struct ExpiringStore {
    backend: Arc<dyn StorageBackend>,
    registry: Arc<VersionRegistry>,
    clock: Arc<dyn Clock>,
    enabled: bool,
    io: Mutex<()>,
}

impl ExpiringStore {
    /// Create a store sharing the registry's backend
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        registry: Arc<VersionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            registry,
            clock,
            enabled: true,
            io: Mutex::new(()),
        }
    }

    /// Turn caching on or off; a disabled store never hits and never writes
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Version registry backing this store
    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn usable_key(&self, key: &str) -> bool {
        if key.is_empty() {
            warn!("Cache key must not be empty");
            return false;
        }
        if key == VERSION_STORE_KEY {
            warn!("Cache key {} is reserved", key);
            return false;
        }
        self.enabled
    }

    /// Write `data` under `key`, stamped with the domain's current version
    pub fn set(&self, key: &str, data: Value, expiry: Expiry) {
        if !self.usable_key(key) {
            return;
        }

        let cell = CacheCell {
            data,
            expire_at: expiry.resolve(self.clock.now()),
            version: self.registry.cache_key(key),
        };
        let raw = match serde_json::to_string(&cell) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache cell {}: {}", key, e);
                return;
            }
        };

        let _io = self.lock();
        match self.backend.set_item(key, &raw) {
            Ok(()) => debug!("Cached {} as {}", key, cell.version),
            Err(e) => warn!("Failed to write cache cell {}: {}", key, e),
        }
    }

    /// Serialize and write a typed value
    pub fn set_as<T: Serialize>(&self, key: &str, data: &T, expiry: Expiry) {
        match serde_json::to_value(data) {
            Ok(value) => self.set(key, value, expiry),
            Err(e) => warn!("Failed to serialize cache value {}: {}", key, e),
        }
    }

    /// Read a cell if it is present, unexpired and of the current version
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.usable_key(key) {
            return None;
        }

        let _io = self.lock();
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cache cell {}: {}", key, e);
                self.evict(key);
                return None;
            }
        };

        let cell: CacheCell = match serde_json::from_str(&raw) {
            Ok(cell) => cell,
            Err(e) => {
                debug!("Evicting unreadable cache cell {}: {}", key, e);
                self.evict(key);
                return None;
            }
        };

        if self.clock.now_millis() > cell.expire_at {
            debug!("Cache cell {} expired", key);
            self.evict(key);
            return None;
        }

        let current = self.registry.cache_key(key);
        if cell.version != current {
            debug!("Cache cell {} is {}, current is {}", key, cell.version, current);
            self.evict(key);
            return None;
        }

        Some(cell.data)
    }

    /// Read and deserialize a typed value; a shape mismatch is a miss
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!("Cache cell {} has unexpected shape: {}", key, e);
                let _io = self.lock();
                self.evict(key);
                None
            }
        }
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.backend.remove_item(key) {
            warn!("Failed to evict cache cell {}: {}", key, e);
        }
    }

    /// Remove a cell and forget its domain's version
    pub fn remove(&self, key: &str) {
        if key.is_empty() || key == VERSION_STORE_KEY {
            return;
        }
        {
            let _io = self.lock();
            self.evict(key);
        }
        self.registry.delete(key);
    }

    /// Remove every data cell whose key starts with `prefix`.
    ///
    /// Versions are left alone: domains sharing a prefix keep their own
    /// version series.
    pub fn remove_by_prefix(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            return 0;
        }

        let _io = self.lock();
        let keys = match self.backend.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to list cache keys: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys
            .iter()
            .filter(|k| k.starts_with(prefix) && k.as_str() != VERSION_STORE_KEY)
        {
            self.evict(key);
            removed += 1;
        }
        debug!("Removed {} cache cell(s) with prefix {}", removed, prefix);
        removed
    }

    /// Remove every cell and every version
    pub fn clear_all(&self) {
        {
            let _io = self.lock();
            if let Err(e) = self.backend.clear() {
                warn!("Failed to clear cache storage: {}", e);
            }
        }
        self.registry.clear_all();
    }

    /// Invalidate every cell of a domain in O(1)
    pub fn bump(&self, domain_key: &str) -> u64 {
        self.registry.bump(domain_key)
    }

    /// Keys of stored data cells (the version map excluded)
    pub fn keys(&self) -> Vec<String> {
        let _io = self.lock();
        match self.backend.list_keys() {
            Ok(keys) => keys.into_iter().filter(|k| k != VERSION_STORE_KEY).collect(),
            Err(e) => {
                warn!("Failed to list cache keys: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{MemoryStorage, StorageError};
    use serde_json::json;

    struct Fixture {
        store: ExpiringStore,
        backend: Arc<MemoryStorage>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryStorage::new());
        let registry = Arc::new(VersionRegistry::load(backend.clone()));
        let clock = Arc::new(ManualClock::starting_now());
        let store = ExpiringStore::new(backend.clone(), registry, clock.clone());
        Fixture {
            store,
            backend,
            clock,
        }
    }

    #[test]
    fn set_and_get() {
        let f = fixture();
        f.store.set("trip", json!([{"id": 1}]), Expiry::Infinite);
        assert_eq!(f.store.get("trip"), Some(json!([{"id": 1}])));
    }

    #[test]
    fn cell_uses_wire_field_names() {
        let f = fixture();
        f.store.set("trip", json!(1), Expiry::Infinite);

        let raw = f.backend.get_item("trip").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], "trip_v1");
        assert_eq!(value["expireAt"], Expiry::infinite_at().timestamp_millis());
    }

    #[test]
    fn already_expired_is_never_served() {
        let f = fixture();
        let past = f.clock.now() - Duration::milliseconds(1);
        f.store.set("trip", json!(1), Expiry::At(past));

        assert_eq!(f.store.get("trip"), None);
        assert!(f.backend.get_item("trip").unwrap().is_none());
    }

    #[test]
    fn expires_after_deadline() {
        let f = fixture();
        let expiry = Expiry::after(f.clock.now(), Duration::minutes(5));
        f.store.set("trip", json!(1), expiry);

        f.clock.advance(Duration::minutes(5));
        assert_eq!(f.store.get("trip"), Some(json!(1)));

        f.clock.advance(Duration::milliseconds(1));
        assert_eq!(f.store.get("trip"), None);
    }

    #[test]
    fn bump_invalidates_and_evicts() {
        let f = fixture();
        let key = "trip_2025-01-01_2025-01-31";
        f.store.set(key, json!(["a"]), Expiry::Infinite);

        f.store.bump(key);
        assert_eq!(f.store.get(key), None);
        assert!(f.backend.get_item(key).unwrap().is_none());

        f.store.set(key, json!(["b"]), Expiry::Infinite);
        assert_eq!(f.store.get(key), Some(json!(["b"])));
    }

    #[test]
    fn unparsable_cell_is_evicted() {
        let f = fixture();
        f.backend.set_item("trip", "not json").unwrap();
        assert_eq!(f.store.get("trip"), None);
        assert!(f.backend.get_item("trip").unwrap().is_none());
    }

    #[test]
    fn remove_forgets_version() {
        let f = fixture();
        f.store.set("app_user", json!({"id": "u"}), Expiry::Infinite);
        f.store.bump("app_user");

        f.store.remove("app_user");
        assert_eq!(f.store.get("app_user"), None);
        assert!(!f.store.registry().snapshot().contains_key("app_user"));
    }

    #[test]
    fn remove_by_prefix_keeps_versions() {
        let f = fixture();
        f.store.set("trip_2025-01", json!(1), Expiry::Infinite);
        f.store.set("trip_2025-02", json!(2), Expiry::Infinite);
        f.store.set("empl", json!(3), Expiry::Infinite);
        f.store.bump("trip_2025-01");

        assert_eq!(f.store.remove_by_prefix("trip_"), 2);
        assert_eq!(f.store.keys(), vec!["empl"]);
        assert_eq!(f.store.registry().current_version("trip_2025-01"), 2);
    }

    #[test]
    fn clear_all_drops_cells_and_versions() {
        let f = fixture();
        f.store.set("a", json!(1), Expiry::Infinite);
        f.store.bump("a");

        f.store.clear_all();
        assert!(f.store.keys().is_empty());
        assert!(f.store.registry().snapshot().is_empty());
    }

    #[test]
    fn reserved_and_empty_keys_are_ignored() {
        let f = fixture();
        f.store.set("", json!(1), Expiry::Infinite);
        f.store.set(VERSION_STORE_KEY, json!(1), Expiry::Infinite);
        assert_eq!(f.store.get(VERSION_STORE_KEY), None);
        assert!(f.store.keys().is_empty());
    }

    #[test]
    fn disabled_store_never_hits() {
        let backend = Arc::new(MemoryStorage::new());
        let registry = Arc::new(VersionRegistry::load(backend.clone()));
        let store = ExpiringStore::new(backend, registry, Arc::new(ManualClock::starting_now()))
            .with_enabled(false);

        store.set("trip", json!(1), Expiry::Infinite);
        assert_eq!(store.get("trip"), None);
    }

    #[test]
    fn typed_roundtrip_and_shape_mismatch() {
        let f = fixture();
        f.store.set_as("ids", &vec![1u32, 2, 3], Expiry::Infinite);
        assert_eq!(f.store.get_as::<Vec<u32>>("ids"), Some(vec![1, 2, 3]));
        assert_eq!(f.store.get_as::<String>("ids"), None);
        assert_eq!(f.store.get("ids"), None);
    }

    #[test]
    fn shape_mismatch_keeps_domain_version() {
        let f = fixture();
        f.store.bump("ids");
        f.store.bump("ids");
        f.store.set_as("ids", &vec![1u32], Expiry::Infinite);

        assert_eq!(f.store.get_as::<String>("ids"), None);
        assert!(f.backend.get_item("ids").unwrap().is_none());
        assert_eq!(f.store.registry().current_version("ids"), 3);
    }

    struct FailingStorage;

    impl StorageBackend for FailingStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::io(key, std::io::Error::other("disk gone")))
        }
        fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::io(key, std::io::Error::other("disk gone")))
        }
        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::io(key, std::io::Error::other("disk gone")))
        }
        fn list_keys(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn storage_failures_are_misses() {
        let backend: Arc<dyn StorageBackend> = Arc::new(FailingStorage);
        let registry = Arc::new(VersionRegistry::load(backend.clone()));
        let store = ExpiringStore::new(backend, registry, Arc::new(ManualClock::starting_now()));

        store.set("trip", json!(1), Expiry::Infinite);
        assert_eq!(store.get("trip"), None);
        assert_eq!(store.remove_by_prefix("t"), 0);
        store.clear_all();
        assert_eq!(store.registry().current_version("trip"), 1);
    }

    #[test]
    fn end_of_day_is_later_today() {
        let now = Utc::now();
        let eod = Expiry::EndOfDay.resolve(now);
        assert!(eod >= now.timestamp_millis());
        assert!(eod <= (now + Duration::days(1)).timestamp_millis());
    }
}
