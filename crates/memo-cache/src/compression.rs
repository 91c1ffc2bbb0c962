//! Compression codecs and the capability probe.

use memo_core::{Error, Result};
use serde::{Deserialize, Serialize};
#[cfg(any(feature = "zstd", feature = "gzip"))]
use std::io::{Read, Write};
use std::str::FromStr;

/// Compression algorithm.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    Lz4,
    Zstd,
    Gzip,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::Lz4 => "lz4",
            CompressionType::Zstd => "zstd",
            CompressionType::Gzip => "gzip",
        }
    }

    /// Whether this build carries the codec.
    pub fn is_compiled_in(&self) -> bool {
        match self {
            CompressionType::Lz4 => cfg!(feature = "lz4"),
            CompressionType::Zstd => cfg!(feature = "zstd"),
            CompressionType::Gzip => cfg!(feature = "gzip"),
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lz4" => Ok(CompressionType::Lz4),
            "zstd" => Ok(CompressionType::Zstd),
            "gzip" | "gz" => Ok(CompressionType::Gzip),
            other => Err(Error::Configuration(format!(
                "Unknown compression algorithm: {}",
                other
            ))),
        }
    }
}

/// Result of probing a compression capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Available,
    Unavailable { reason: String },
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available)
    }
}

const PROBE_INPUT: &[u8] = b"memo-cache capability probe: memo-cache capability probe";

/// A byte-level compression codec.
pub trait Compressor: Send + Sync {
    /// Codec name for logging and error reports.
    fn name(&self) -> &str;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Check that the codec works in this environment.
    ///
    /// The default runs a self-test round trip.
    fn probe(&self) -> Capability {
        self_test(self)
    }
}

/// Round-trip a fixed input through the codec.
pub fn self_test<C: Compressor + ?Sized>(codec: &C) -> Capability {
    let compressed = match codec.compress(PROBE_INPUT) {
        Ok(c) => c,
        Err(e) => {
            return Capability::Unavailable {
                reason: format!("{} probe compression failed: {}", codec.name(), e),
            };
        }
    };
    match codec.decompress(&compressed) {
        Ok(restored) if restored == PROBE_INPUT => Capability::Available,
        Ok(_) => Capability::Unavailable {
            reason: format!("{} probe round trip returned different bytes", codec.name()),
        },
        Err(e) => Capability::Unavailable {
            reason: format!("{} probe decompression failed: {}", codec.name(), e),
        },
    }
}

/// Built-in codec selected by [`CompressionType`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    algorithm: CompressionType,
}

impl Codec {
    pub fn new(algorithm: CompressionType) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> CompressionType {
        self.algorithm
    }
}

impl Compressor for Codec {
    fn name(&self) -> &str {
        self.algorithm.as_str()
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        compress(data, self.algorithm)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        decompress(data, self.algorithm)
    }

    fn probe(&self) -> Capability {
        if !self.algorithm.is_compiled_in() {
            return Capability::Unavailable {
                reason: format!(
                    "the \"{}\" compression support was not compiled in (enable the \"{}\" feature)",
                    self.algorithm, self.algorithm
                ),
            };
        }
        self_test(self)
    }
}

/// Compress data using the specified algorithm.
pub fn compress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::Lz4 => compress_lz4(data),
        CompressionType::Zstd => compress_zstd(data),
        CompressionType::Gzip => compress_gzip(data),
    }
}

/// Decompress data using the specified algorithm.
pub fn decompress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::Lz4 => decompress_lz4(data),
        CompressionType::Zstd => decompress_zstd(data),
        CompressionType::Gzip => decompress_gzip(data),
    }
}

#[cfg(not(all(feature = "lz4", feature = "zstd", feature = "gzip")))]
fn not_compiled(algorithm: CompressionType) -> Error {
    Error::Configuration(format!(
        "The \"{}\" compression support was not compiled in",
        algorithm
    ))
}

#[cfg(feature = "zstd")]
fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)
        .map_err(|e| Error::Internal(format!("Zstd compression failed: {}", e)))?;
    encoder
        .write_all(data)
        .map_err(|e| Error::Internal(format!("Zstd write failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Internal(format!("Zstd finish failed: {}", e)))
}

#[cfg(feature = "zstd")]
fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(data)
        .map_err(|e| Error::Internal(format!("Zstd decompression failed: {}", e)))?;
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Internal(format!("Zstd read failed: {}", e)))?;
    Ok(output)
}

#[cfg(not(feature = "zstd"))]
fn compress_zstd(_data: &[u8]) -> Result<Vec<u8>> {
    Err(not_compiled(CompressionType::Zstd))
}

#[cfg(not(feature = "zstd"))]
fn decompress_zstd(_data: &[u8]) -> Result<Vec<u8>> {
    Err(not_compiled(CompressionType::Zstd))
}

#[cfg(feature = "gzip")]
fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Internal(format!("Gzip write failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Internal(format!("Gzip finish failed: {}", e)))
}

#[cfg(feature = "gzip")]
fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Internal(format!("Gzip read failed: {}", e)))?;
    Ok(output)
}

#[cfg(not(feature = "gzip"))]
fn compress_gzip(_data: &[u8]) -> Result<Vec<u8>> {
    Err(not_compiled(CompressionType::Gzip))
}

#[cfg(not(feature = "gzip"))]
fn decompress_gzip(_data: &[u8]) -> Result<Vec<u8>> {
    Err(not_compiled(CompressionType::Gzip))
}

#[cfg(feature = "lz4")]
fn compress_lz4(data: &[u8]) -> Result<Vec<u8>> {
    Ok(lz4_flex::compress_prepend_size(data))
}

#[cfg(feature = "lz4")]
fn decompress_lz4(data: &[u8]) -> Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| Error::Internal(format!("LZ4 decompression failed: {}", e)))
}

#[cfg(not(feature = "lz4"))]
fn compress_lz4(_data: &[u8]) -> Result<Vec<u8>> {
    Err(not_compiled(CompressionType::Lz4))
}

#[cfg(not(feature = "lz4"))]
fn decompress_lz4(_data: &[u8]) -> Result<Vec<u8>> {
    Err(not_compiled(CompressionType::Lz4))
}
