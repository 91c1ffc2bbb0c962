//! Shared helpers for memo-cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use memo_cache::{Error, KeyValueStore, MemoryStore, Payload, Result};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Memory store that fails operations on chosen keys and records calls.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_get: Mutex<HashSet<String>>,
    fail_set: Mutex<HashSet<String>>,
    fail_delete: Mutex<HashSet<String>>,
    pub sets: Mutex<Vec<(String, Payload, Option<Duration>)>>,
    pub deletes: Mutex<Vec<String>>,
    pub gets: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_get_on(&self, key: &str) {
        self.fail_get.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_set_on(&self, key: &str) {
        self.fail_set.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_delete_on(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_string());
    }

    pub fn set_calls(&self) -> usize {
        self.sets.lock().unwrap().len()
    }

    pub fn last_set(&self) -> Option<(String, Payload, Option<Duration>)> {
        self.sets.lock().unwrap().last().cloned()
    }

    /// Highest number of deletes observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Payload>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.lock().unwrap().contains(key) {
            return Err(Error::Backend(format!("get refused for {}", key)));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<()> {
        if self.fail_set.lock().unwrap().contains(key) {
            return Err(Error::Backend(format!("set refused for {}", key)));
        }
        self.sets
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone(), ttl));
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        // Yield so sibling deletes get a chance to start.
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_delete.lock().unwrap().contains(key) {
            return Err(Error::Backend(format!("delete refused for {}", key)));
        }
        self.inner.delete(key).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}
