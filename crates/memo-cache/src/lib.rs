//! Cache adapter for memoization façades.
//!
//! [`CacheAdapter`] stores and retrieves values through any
//! [`KeyValueStore`](memo_core::KeyValueStore), running them through a
//! [`TransformPipeline`] of custom stages and optional compression.

pub mod adapter;
pub mod compression;
pub mod config;
pub mod metrics;
pub mod store;
pub mod telemetry;
pub mod transform;

pub use adapter::{CacheAdapter, CacheAdapterBuilder, PurgeKeys};
pub use compression::{Capability, Codec, CompressionType, Compressor, compress, decompress};
pub use config::AdapterConfig;
pub use memo_core::{Error, KeyValueStore, Payload, Result};
pub use metrics::{AdapterMetrics, MetricsSnapshot};
pub use store::{FilesystemStore, MemoryStore, MemoryStoreConfig};
pub use telemetry::{init_test_tracing, init_tracing};
pub use transform::{
    AsyncStage, CompressionStage, JsonStage, Stage, StageResult, SyncStage, TransformPipeline,
};
