//! Metrics for cache adapter observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the cache adapter.
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    /// Successful backend writes.
    pub stores: AtomicU64,
    /// Backend write failures.
    pub store_failures: AtomicU64,
    /// Retrieve calls that ended in a hit or a miss.
    pub retrieves: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub encode_failures: AtomicU64,
    pub decode_failures: AtomicU64,
    /// Keys deleted by purges.
    pub keys_purged: AtomicU64,
    /// Individual deletes that failed during purges.
    pub purge_failures: AtomicU64,
    /// Bytes written for byte payloads.
    pub bytes_stored: AtomicU64,
}

impl AdapterMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_store(&self, bytes: Option<usize>) {
        self.stores.fetch_add(1, Ordering::Relaxed);
        if let Some(bytes) = bytes {
            self.bytes_stored.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.retrieves.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.retrieves.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purge(&self, deleted: usize, failed: usize) {
        self.keys_purged.fetch_add(deleted as u64, Ordering::Relaxed);
        self.purge_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stores: self.stores.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            retrieves: self.retrieves.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            keys_purged: self.keys_purged.load(Ordering::Relaxed),
            purge_failures: self.purge_failures.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub stores: u64,
    pub store_failures: u64,
    pub retrieves: u64,
    pub hits: u64,
    pub misses: u64,
    pub encode_failures: u64,
    pub decode_failures: u64,
    pub keys_purged: u64,
    pub purge_failures: u64,
    pub bytes_stored: u64,
}

impl MetricsSnapshot {
    /// Fraction of retrieves that found a value.
    pub fn hit_ratio(&self) -> f64 {
        if self.retrieves == 0 {
            0.0
        } else {
            self.hits as f64 / self.retrieves as f64
        }
    }
}
