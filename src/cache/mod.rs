mod store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use store::{FileStore, MemoryStore, SessionStore, StorageError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const ANALYSIS_KEY_PREFIX: &str = "cluster-lens:analysis:";

pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

struct CacheEntry<V> {
    payload: Arc<V>,
    stored_at_ms: u64,
    ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) < self.ttl_ms
    }
}

#[derive(Serialize)]
struct PersistedEntryRef<'a, V> {
    stored_at_ms: u64,
    ttl_ms: u64,
    payload: &'a V,
}

#[derive(Deserialize)]
struct PersistedEntry<V> {
    stored_at_ms: u64,
    ttl_ms: u64,
    payload: V,
}

/// Read-through TTL cache keyed by analysis context id.
///
/// Entries live in memory and are mirrored into a [`SessionStore`] so a cache
/// rebuilt over the same store picks them up again. Expiry is lazy: an entry
/// whose age reached the TTL reads as absent and is dropped on access. The
/// first storage failure switches the cache to memory-only for good.
pub struct TtlCache<V, S = MemoryStore> {
    prefix: String,
    ttl: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
    entries: HashMap<String, CacheEntry<V>>,
    store: Option<S>,
}

impl<V, S> TtlCache<V, S>
where
    V: Serialize + DeserializeOwned,
    S: SessionStore,
{
    pub fn new(prefix: impl Into<String>, ttl: Duration, store: S) -> Self {
        Self::with_clock(prefix, ttl, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        prefix: impl Into<String>,
        ttl: Duration,
        store: S,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
            clock,
            entries: HashMap::new(),
            store: Some(store),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&mut self, key: &str) -> Option<Arc<V>> {
        let now_ms = self.clock.now_ms();

        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid_at(now_ms) {
                return Some(Arc::clone(&entry.payload));
            }
            debug!(key, "cache entry expired");
            self.invalidate(key);
            return None;
        }

        let entry = self.load_persisted(key)?;
        if !entry.is_valid_at(now_ms) {
            debug!(key, "persisted cache entry expired");
            self.invalidate(key);
            return None;
        }

        debug!(key, "restored cache entry from session storage");
        let payload = Arc::clone(&entry.payload);
        self.entries.insert(key.to_owned(), entry);
        Some(payload)
    }

    pub fn set(&mut self, key: &str, payload: V) -> Arc<V> {
        let entry = CacheEntry {
            payload: Arc::new(payload),
            stored_at_ms: self.clock.now_ms(),
            ttl_ms: self.ttl.as_millis() as u64,
        };
        self.persist(key, &entry);
        let payload = Arc::clone(&entry.payload);
        self.entries.insert(key.to_owned(), entry);
        payload
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
        let storage_key = self.storage_key(key);
        let result = match self.store.as_mut() {
            Some(store) => store.remove(&storage_key),
            None => Ok(()),
        };
        if let Err(error) = result {
            self.degrade(error);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        let result = match self.store.as_mut() {
            Some(store) => remove_prefixed(store, &self.prefix, |_| true),
            None => Ok(0),
        };
        if let Err(error) = result {
            self.degrade(error);
        }
    }

    pub fn sweep_expired(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now_ms));
        let mut removed = before - self.entries.len();

        let result = match self.store.as_mut() {
            Some(store) => remove_prefixed(store, &self.prefix, |raw| {
                serde_json::from_str::<PersistedEntry<serde::de::IgnoredAny>>(raw)
                    .map(|entry| now_ms.saturating_sub(entry.stored_at_ms) >= entry.ttl_ms)
                    .unwrap_or(true)
            }),
            None => Ok(0),
        };
        match result {
            Ok(persisted) => removed = removed.max(persisted),
            Err(error) => self.degrade(error),
        }

        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn load_persisted(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let storage_key = self.storage_key(key);
        let loaded = self.store.as_ref()?.get(&storage_key);
        let raw = match loaded {
            Ok(raw) => raw?,
            Err(error) => {
                self.degrade(error);
                return None;
            }
        };

        match serde_json::from_str::<PersistedEntry<V>>(&raw) {
            Ok(persisted) => Some(CacheEntry {
                payload: Arc::new(persisted.payload),
                stored_at_ms: persisted.stored_at_ms,
                ttl_ms: persisted.ttl_ms,
            }),
            Err(error) => {
                warn!(key, %error, "discarding unreadable cache entry");
                self.invalidate(key);
                None
            }
        }
    }

    fn persist(&mut self, key: &str, entry: &CacheEntry<V>) {
        let storage_key = self.storage_key(key);
        let Some(store) = self.store.as_mut() else {
            return;
        };

        let record = PersistedEntryRef {
            stored_at_ms: entry.stored_at_ms,
            ttl_ms: entry.ttl_ms,
            payload: entry.payload.as_ref(),
        };
        let result = serde_json::to_string(&record)
            .map_err(StorageError::from)
            .and_then(|raw| store.set(&storage_key, &raw));

        if let Err(error) = result {
            self.degrade(error);
        }
    }

    fn degrade(&mut self, error: StorageError) {
        warn!(%error, "session storage failed; caching in memory only from now on");
        self.store = None;
    }
}

fn remove_prefixed<S: SessionStore>(
    store: &mut S,
    prefix: &str,
    should_remove: impl Fn(&str) -> bool,
) -> Result<usize, StorageError> {
    let mut removed = 0;
    for key in store.keys()? {
        if !key.starts_with(prefix) {
            continue;
        }
        let remove = match store.get(&key)? {
            Some(raw) => should_remove(&raw),
            None => false,
        };
        if remove {
            store.remove(&key)?;
            removed += 1;
        }
    }
    Ok(removed)
}
