//! Transform pipeline applied to payloads on their way to and from a backend.
//!
//! Encode runs the registered stages in order and finishes with the optional
//! compression stage. Decode runs compression first and then the stages in
//! reverse, so every stage sees on decode exactly what it produced on encode.

use crate::compression::{Capability, Compressor};
use async_trait::async_trait;
use memo_core::{BoxError, Error, Payload, Result};
use std::sync::Arc;
use tracing::trace;

/// Outcome of a single stage.
pub type StageResult = std::result::Result<Payload, BoxError>;

/// A stage that completes synchronously.
pub trait SyncStage: Send + Sync {
    fn name(&self) -> &str;

    fn encode(&self, payload: Payload) -> StageResult;

    fn decode(&self, payload: Payload) -> StageResult;
}

/// A stage that completes asynchronously.
#[async_trait]
pub trait AsyncStage: Send + Sync {
    fn name(&self) -> &str;

    async fn encode(&self, payload: Payload) -> StageResult;

    async fn decode(&self, payload: Payload) -> StageResult;
}

/// A registered pipeline stage.
#[derive(Clone)]
pub enum Stage {
    Sync(Arc<dyn SyncStage>),
    Async(Arc<dyn AsyncStage>),
}

impl Stage {
    pub fn sync(stage: impl SyncStage + 'static) -> Self {
        Stage::Sync(Arc::new(stage))
    }

    pub fn asynchronous(stage: impl AsyncStage + 'static) -> Self {
        Stage::Async(Arc::new(stage))
    }

    /// Build a synchronous stage from an encode/decode closure pair.
    pub fn from_fns<E, D>(name: impl Into<String>, encode: E, decode: D) -> Self
    where
        E: Fn(Payload) -> StageResult + Send + Sync + 'static,
        D: Fn(Payload) -> StageResult + Send + Sync + 'static,
    {
        Stage::sync(FnStage {
            name: name.into(),
            encode,
            decode,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Stage::Sync(stage) => stage.name(),
            Stage::Async(stage) => stage.name(),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Stage::Async(_))
    }

    async fn encode(&self, payload: Payload) -> StageResult {
        match self {
            Stage::Sync(stage) => stage.encode(payload),
            Stage::Async(stage) => stage.encode(payload).await,
        }
    }

    async fn decode(&self, payload: Payload) -> StageResult {
        match self {
            Stage::Sync(stage) => stage.decode(payload),
            Stage::Async(stage) => stage.decode(payload).await,
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.is_async() { "async" } else { "sync" };
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("mode", &mode)
            .finish()
    }
}

struct FnStage<E, D> {
    name: String,
    encode: E,
    decode: D,
}

impl<E, D> SyncStage for FnStage<E, D>
where
    E: Fn(Payload) -> StageResult + Send + Sync,
    D: Fn(Payload) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, payload: Payload) -> StageResult {
        (self.encode)(payload)
    }

    fn decode(&self, payload: Payload) -> StageResult {
        (self.decode)(payload)
    }
}

/// Serializes structured values to JSON bytes and back.
///
/// Byte payloads pass through untouched on encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStage;

impl SyncStage for JsonStage {
    fn name(&self) -> &str {
        "json"
    }

    fn encode(&self, payload: Payload) -> StageResult {
        match payload {
            Payload::Value(value) => Ok(Payload::Bytes(serde_json::to_vec(&value)?)),
            bytes => Ok(bytes),
        }
    }

    fn decode(&self, payload: Payload) -> StageResult {
        match payload {
            Payload::Bytes(bytes) => Ok(Payload::Value(serde_json::from_slice(&bytes)?)),
            Payload::Value(_) => Err("json stage expected bytes to decode".into()),
        }
    }
}

const FRAME_VALUE: u8 = b'j';
const FRAME_BYTES: u8 = b'b';

/// Compression stage, always nearest to the storage boundary.
///
/// The uncompressed frame is a one-byte tag followed by the body: JSON text
/// for structured values, the raw bytes otherwise. The tag lets decode
/// restore the exact variant the preceding stage produced.
pub struct CompressionStage {
    name: String,
    compressor: Arc<dyn Compressor>,
}

impl CompressionStage {
    /// Probe the codec once and fail if it is unusable.
    pub fn new(compressor: Arc<dyn Compressor>) -> Result<Self> {
        match compressor.probe() {
            Capability::Available => Ok(Self {
                name: format!("compress:{}", compressor.name()),
                compressor,
            }),
            Capability::Unavailable { reason } => Err(Error::Configuration(format!(
                "The compress option requires the \"{}\" codec, which is unavailable: {}",
                compressor.name(),
                reason
            ))),
        }
    }

    pub fn codec_name(&self) -> &str {
        self.compressor.name()
    }
}

impl SyncStage for CompressionStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, payload: Payload) -> StageResult {
        let frame = match payload {
            Payload::Value(value) => {
                let mut frame = vec![FRAME_VALUE];
                serde_json::to_writer(&mut frame, &value)?;
                frame
            }
            Payload::Bytes(bytes) => {
                let mut frame = Vec::with_capacity(bytes.len() + 1);
                frame.push(FRAME_BYTES);
                frame.extend_from_slice(&bytes);
                frame
            }
        };
        Ok(Payload::Bytes(self.compressor.compress(&frame)?))
    }

    fn decode(&self, payload: Payload) -> StageResult {
        let Payload::Bytes(compressed) = payload else {
            return Err("compressed payload must be bytes".into());
        };
        let frame = self.compressor.decompress(&compressed)?;
        match frame.split_first() {
            Some((&FRAME_VALUE, body)) => Ok(Payload::Value(serde_json::from_slice(body)?)),
            Some((&FRAME_BYTES, body)) => Ok(Payload::Bytes(body.to_vec())),
            Some((tag, _)) => Err(format!("unknown compression frame tag 0x{:02x}", tag).into()),
            None => Err("empty compression frame".into()),
        }
    }
}

/// Ordered, immutable chain of stages.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    stages: Vec<Stage>,
    compression: Option<Arc<CompressionStage>>,
}

impl TransformPipeline {
    /// The identity pipeline.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build a pipeline, probing the compressor if one is given.
    pub fn new(stages: Vec<Stage>, compressor: Option<Arc<dyn Compressor>>) -> Result<Self> {
        let compression = compressor
            .map(CompressionStage::new)
            .transpose()?
            .map(Arc::new);
        Ok(Self {
            stages,
            compression,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty() && self.compression.is_none()
    }

    pub fn compression(&self) -> Option<&CompressionStage> {
        self.compression.as_deref()
    }

    /// Stage names in encode order, compression last.
    pub fn stage_names(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|s| s.name().to_string())
            .chain(self.compression.iter().map(|c| c.name().to_string()))
            .collect()
    }

    /// Apply every stage's encode in registration order.
    pub async fn encode(&self, payload: Payload) -> Result<Payload> {
        let mut current = payload;
        for stage in &self.stages {
            trace!(stage = stage.name(), "Encoding");
            current = stage
                .encode(current)
                .await
                .map_err(|e| Error::encode(stage.name(), e))?;
        }
        if let Some(compression) = &self.compression {
            current = compression
                .encode(current)
                .map_err(|e| Error::encode(compression.name(), e))?;
        }
        Ok(current)
    }

    /// Apply every stage's decode in reverse registration order.
    pub async fn decode(&self, payload: Payload) -> Result<Payload> {
        let mut current = payload;
        if let Some(compression) = &self.compression {
            current = compression
                .decode(current)
                .map_err(|e| Error::decode(compression.name(), e))?;
        }
        for stage in self.stages.iter().rev() {
            trace!(stage = stage.name(), "Decoding");
            current = stage
                .decode(current)
                .await
                .map_err(|e| Error::decode(stage.name(), e))?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{Codec, CompressionType};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Appends a marker byte on encode and strips it on decode, logging calls.
    struct Marker {
        name: &'static str,
        mark: u8,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl SyncStage for Marker {
        fn name(&self) -> &str {
            self.name
        }

        fn encode(&self, payload: Payload) -> StageResult {
            self.log.lock().unwrap().push(format!("encode:{}", self.name));
            let mut bytes = payload.as_bytes().ok_or("marker needs bytes")?.to_vec();
            bytes.push(self.mark);
            Ok(Payload::Bytes(bytes))
        }

        fn decode(&self, payload: Payload) -> StageResult {
            self.log.lock().unwrap().push(format!("decode:{}", self.name));
            let mut bytes = payload.as_bytes().ok_or("marker needs bytes")?.to_vec();
            match bytes.pop() {
                Some(m) if m == self.mark => Ok(Payload::Bytes(bytes)),
                _ => Err(format!("missing marker {}", self.mark).into()),
            }
        }
    }

    struct Reverse;

    #[async_trait]
    impl AsyncStage for Reverse {
        fn name(&self) -> &str {
            "reverse"
        }

        async fn encode(&self, payload: Payload) -> StageResult {
            tokio::task::yield_now().await;
            let mut bytes = payload.as_bytes().ok_or("reverse needs bytes")?.to_vec();
            bytes.reverse();
            Ok(Payload::Bytes(bytes))
        }

        async fn decode(&self, payload: Payload) -> StageResult {
            self.encode(payload).await
        }
    }

    fn lz4() -> Option<Arc<dyn Compressor>> {
        Some(Arc::new(Codec::new(CompressionType::Lz4)))
    }

    #[tokio::test]
    async fn test_identity_passes_values_through() {
        let pipeline = TransformPipeline::identity();
        let value = Payload::from(json!({"a": [1, 2]}));
        assert!(pipeline.is_identity());
        assert_eq!(pipeline.encode(value.clone()).await.unwrap(), value);
        assert_eq!(pipeline.decode(value.clone()).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_stage_order_is_reversed_on_decode() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages = vec![
            Stage::sync(Marker {
                name: "first",
                mark: 1,
                log: log.clone(),
            }),
            Stage::sync(Marker {
                name: "second",
                mark: 2,
                log: log.clone(),
            }),
        ];
        let pipeline = TransformPipeline::new(stages, None).unwrap();

        let encoded = pipeline.encode(Payload::Bytes(b"x".to_vec())).await.unwrap();
        assert_eq!(encoded, Payload::Bytes(vec![b'x', 1, 2]));

        let decoded = pipeline.decode(encoded).await.unwrap();
        assert_eq!(decoded, Payload::Bytes(b"x".to_vec()));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "encode:first",
                "encode:second",
                "decode:second",
                "decode:first"
            ]
        );
    }

    #[tokio::test]
    async fn test_mixed_sync_and_async_stages() {
        let stages = vec![Stage::sync(JsonStage), Stage::asynchronous(Reverse)];
        let pipeline = TransformPipeline::new(stages, None).unwrap();

        let encoded = pipeline.encode(Payload::from("ab")).await.unwrap();
        assert_eq!(encoded, Payload::Bytes(br#""ba""#.to_vec()));

        let decoded = pipeline.decode(encoded).await.unwrap();
        assert_eq!(decoded, Payload::from("ab"));
    }

    #[tokio::test]
    async fn test_compression_runs_last_and_first() {
        let pipeline = TransformPipeline::new(vec![Stage::sync(JsonStage)], lz4()).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["json", "compress:lz4"]);

        let value = Payload::from(json!({"result": "ok"}));
        let encoded = pipeline.encode(value.clone()).await.unwrap();

        // The compressed frame wraps the JSON stage's byte output.
        let frame =
            crate::compression::decompress(encoded.as_bytes().unwrap(), CompressionType::Lz4)
                .unwrap();
        assert_eq!(frame[0], FRAME_BYTES);
        assert_eq!(&frame[1..], br#"{"result":"ok"}"#);

        assert_eq!(pipeline.decode(encoded).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_compression_restores_structured_values() {
        let pipeline = TransformPipeline::new(vec![], lz4()).unwrap();
        let value = Payload::from(json!([1, "two", null]));

        let encoded = pipeline.encode(value.clone()).await.unwrap();
        assert!(encoded.is_bytes());
        assert_eq!(pipeline.decode(encoded).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_compression_keeps_float_precision() {
        let pipeline = TransformPipeline::new(vec![], lz4()).unwrap();
        let value = Payload::from(json!({"f": 1.0715660391465826e-75, "g": [0.1, -2.5e300]}));

        let encoded = pipeline.encode(value.clone()).await.unwrap();
        assert_eq!(pipeline.decode(encoded).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_failed_stage_is_named_in_error() {
        let failing = Stage::from_fns(
            "strict",
            |_| Err("cannot encode".into()),
            |_| Err("cannot decode".into()),
        );
        let pipeline = TransformPipeline::new(vec![failing], None).unwrap();

        let err = pipeline.encode(Payload::from("v")).await.unwrap_err();
        assert!(err.is_encode());
        assert_eq!(err.stage(), Some("strict"));

        let err = pipeline.decode(Payload::from("v")).await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_decompressing_structured_value_is_decode_error() {
        let pipeline = TransformPipeline::new(vec![], lz4()).unwrap();
        let err = pipeline.decode(Payload::from("plain")).await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(err.stage(), Some("compress:lz4"));
    }
}
