//! Bridge between a memoization façade and a key-value backend.

use crate::compression::{Codec, CompressionType, Compressor};
use crate::config::AdapterConfig;
use crate::metrics::AdapterMetrics;
use crate::transform::{AsyncStage, Stage, SyncStage, TransformPipeline};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use memo_core::{Error, KeyValueStore, Payload, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keys for a purge, normalized to a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeKeys(Vec<String>);

impl PurgeKeys {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for PurgeKeys {
    fn from(key: &str) -> Self {
        PurgeKeys(vec![key.to_string()])
    }
}

impl From<String> for PurgeKeys {
    fn from(key: String) -> Self {
        PurgeKeys(vec![key])
    }
}

impl From<Vec<String>> for PurgeKeys {
    fn from(keys: Vec<String>) -> Self {
        PurgeKeys(keys)
    }
}

impl From<Vec<&str>> for PurgeKeys {
    fn from(keys: Vec<&str>) -> Self {
        PurgeKeys(keys.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for PurgeKeys {
    fn from(keys: &[&str]) -> Self {
        PurgeKeys(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<&[String]> for PurgeKeys {
    fn from(keys: &[String]) -> Self {
        PurgeKeys(keys.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for PurgeKeys {
    fn from(keys: [&str; N]) -> Self {
        PurgeKeys(keys.iter().map(|k| k.to_string()).collect())
    }
}

/// Cache adapter: runs values through the transform pipeline and hands them
/// to the backend.
///
/// Cloning is cheap; clones share the backend, pipeline and metrics.
#[derive(Clone)]
pub struct CacheAdapter {
    store: Arc<dyn KeyValueStore>,
    pipeline: Arc<TransformPipeline>,
    default_ttl: Option<Duration>,
    metrics: Arc<AdapterMetrics>,
}

impl CacheAdapter {
    /// Adapter with the identity pipeline.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            pipeline: Arc::new(TransformPipeline::identity()),
            default_ttl: None,
            metrics: AdapterMetrics::new(),
        }
    }

    pub fn builder(store: Arc<dyn KeyValueStore>) -> CacheAdapterBuilder {
        CacheAdapterBuilder::new(store)
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> &AdapterMetrics {
        &self.metrics
    }

    /// Encode `value` and write it under `key`.
    ///
    /// A missing or zero `ttl` falls back to the configured default; with no
    /// default the backend is called without a TTL. Nothing is written when
    /// encoding fails.
    pub async fn store(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.filter(|ttl| !ttl.is_zero()).or(self.default_ttl);

        let encoded = match self.pipeline.encode(value).await {
            Ok(encoded) => encoded,
            Err(e) => {
                self.metrics.record_encode_failure();
                warn!(key = %key, error = %e, "Encode failed, nothing written");
                return Err(e);
            }
        };

        let size = encoded.byte_len();
        match self.store.set(key, encoded, ttl).await {
            Ok(()) => {
                self.metrics.record_store(size);
                debug!(
                    key = %key,
                    store = self.store.name(),
                    ttl_ms = ttl.map(|ttl| ttl.as_millis() as u64),
                    "Stored value"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.record_store_failure();
                warn!(key = %key, store = self.store.name(), error = %e, "Backend set failed");
                Err(e)
            }
        }
    }

    /// Read and decode the value under `key`.
    ///
    /// `Ok(None)` means the key is absent; decode failures are errors.
    pub async fn retrieve(&self, key: &str) -> Result<Option<Payload>> {
        let stored = match self.store.get(key).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %key, store = self.store.name(), error = %e, "Backend get failed");
                return Err(e);
            }
        };

        let Some(encoded) = stored else {
            self.metrics.record_miss();
            debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        match self.pipeline.decode(encoded).await {
            Ok(value) => {
                self.metrics.record_hit();
                debug!(key = %key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                self.metrics.record_decode_failure();
                warn!(key = %key, error = %e, "Decode failed");
                Err(e)
            }
        }
    }

    /// Serialize `value` and store it.
    pub async fn store_as<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = Payload::from_serialize(value).map_err(|e| Error::encode("serialize", e))?;
        self.store(key, payload, ttl).await
    }

    /// Retrieve a value and deserialize it into `T`.
    pub async fn retrieve_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.retrieve(key).await? {
            Some(payload) => payload
                .deserialize_into()
                .map(Some)
                .map_err(|e| Error::decode("deserialize", e)),
            None => Ok(None),
        }
    }

    /// Delete every key concurrently and wait for all deletes to finish.
    ///
    /// A failed delete never cancels the others. If any fail, the error is
    /// [`Error::PartialPurge`] carrying the first failure observed.
    pub async fn purge_many(&self, keys: impl Into<PurgeKeys>) -> Result<()> {
        let keys = keys.into().into_inner();
        let total = keys.len();
        if total == 0 {
            return Ok(());
        }

        let store = self.store.as_ref();
        let mut pending: FuturesUnordered<_> = keys
            .iter()
            .map(|key| async move { (key, store.delete(key).await) })
            .collect();

        let mut failed = 0;
        let mut first = None;
        while let Some((key, result)) = pending.next().await {
            if let Err(e) = result {
                warn!(key = %key, store = store.name(), error = %e, "Delete failed");
                failed += 1;
                first.get_or_insert(e);
            }
        }

        self.metrics.record_purge(total - failed, failed);
        match first {
            None => {
                debug!(keys = total, "Purged keys");
                Ok(())
            }
            Some(first) => Err(Error::PartialPurge {
                failed,
                total,
                first: Box::new(first),
            }),
        }
    }

    /// Fire-and-forget purge.
    ///
    /// Runs [`purge_many`](Self::purge_many) on the current tokio runtime. The
    /// caller never sees the outcome; failures are only logged and counted.
    /// Called outside a runtime, nothing is deleted and a warning is logged.
    pub fn purge_many_detached(&self, keys: impl Into<PurgeKeys>) {
        let keys = keys.into();
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(keys = keys.len(), error = %e, "No runtime for detached purge, skipped");
                return;
            }
        };

        let adapter = self.clone();
        handle.spawn(async move {
            if let Err(e) = adapter.purge_many(keys).await {
                debug!(error = %e, "Detached purge failed");
            }
        });
    }
}

impl std::fmt::Debug for CacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAdapter")
            .field("store", &self.store.name())
            .field("pipeline", &self.pipeline)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// Builder for [`CacheAdapter`].
pub struct CacheAdapterBuilder {
    store: Arc<dyn KeyValueStore>,
    stages: Vec<Stage>,
    compress: bool,
    algorithm: CompressionType,
    compressor: Option<Arc<dyn Compressor>>,
    default_ttl: Option<Duration>,
}

impl CacheAdapterBuilder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            stages: Vec::new(),
            compress: false,
            algorithm: CompressionType::default(),
            compressor: None,
            default_ttl: None,
        }
    }

    /// Apply compression, algorithm and default TTL from a config.
    pub fn with_config(mut self, config: &AdapterConfig) -> Self {
        self.compress = config.compress;
        self.algorithm = config.algorithm;
        self.default_ttl = config.default_ttl();
        self
    }

    /// Enable or disable the compression stage.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Built-in codec used when compression is enabled.
    pub fn compression(mut self, algorithm: CompressionType) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Use a custom codec. Enables compression.
    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self.compress = true;
        self
    }

    /// Register a stage. Stages encode in registration order.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn sync_stage(self, stage: impl SyncStage + 'static) -> Self {
        self.stage(Stage::sync(stage))
    }

    pub fn async_stage(self, stage: impl AsyncStage + 'static) -> Self {
        self.stage(Stage::asynchronous(stage))
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    /// Build the adapter, probing the compression codec if enabled.
    pub fn build(self) -> Result<CacheAdapter> {
        let compressor = if self.compress {
            let algorithm = self.algorithm;
            Some(
                self.compressor
                    .unwrap_or_else(|| Arc::new(Codec::new(algorithm)) as Arc<dyn Compressor>),
            )
        } else {
            None
        };

        let pipeline = TransformPipeline::new(self.stages, compressor)?;
        info!(
            store = self.store.name(),
            stages = ?pipeline.stage_names(),
            "Cache adapter configured"
        );

        Ok(CacheAdapter {
            store: self.store,
            pipeline: Arc::new(pipeline),
            default_ttl: self.default_ttl,
            metrics: AdapterMetrics::new(),
        })
    }
}
