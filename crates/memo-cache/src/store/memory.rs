//! In-memory backend with TTL expiry and an LRU capacity bound.

use async_trait::async_trait;
use memo_core::{KeyValueStore, Payload, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for the memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// TTL applied when `set` is called without one.
    pub default_ttl: Option<Duration>,
    /// Maximum number of entries before the least recently used is evicted.
    pub max_entries: Option<usize>,
}

impl MemoryStoreConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }
}

struct Entry {
    payload: Payload,
    expires_at: Option<Instant>,
    last_access: AtomicU64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Key-value store held in process memory.
pub struct MemoryStore {
    config: MemoryStoreConfig,
    entries: RwLock<HashMap<String, Entry>>,
    clock: AtomicU64,
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_for_insert(&self, entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
        let Some(max) = self.config.max_entries else {
            return;
        };
        if entries.contains_key(key) || entries.len() < max {
            return;
        }

        entries.retain(|_, entry| !entry.is_expired(now));

        while entries.len() >= max {
            let lru = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match lru {
                Some(victim) => {
                    debug!(key = %victim, "Evicting least recently used entry");
                    entries.remove(&victim);
                }
                None => break,
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Payload>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => {
                    entry.last_access.store(self.tick(), Ordering::Relaxed);
                    return Ok(Some(entry.payload.clone()));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            debug!(key = %key, "Dropping expired entry");
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<()> {
        let now = Instant::now();
        let ttl = ttl.or(self.config.default_ttl);
        let entry = Entry {
            payload: value,
            // A TTL past the clock's range never expires.
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            last_access: AtomicU64::new(self.tick()),
        };

        let mut entries = self.entries.write().await;
        self.evict_for_insert(&mut entries, key, now);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
