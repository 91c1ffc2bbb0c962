//! The value handed between the adapter and a backend.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A cached value, either structured or raw bytes.
///
/// Application results enter the adapter as a `Payload` and the encode
/// direction of the transform pipeline produces another `Payload`, which is
/// what a backend physically stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Structured or primitive value.
    Value(serde_json::Value),
    /// Raw byte sequence (base64 when serialized).
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Payload {
    /// Convert any serializable value into a structured payload.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Payload::Value)
    }

    /// Convert the payload back into a typed value.
    ///
    /// Byte payloads are parsed as JSON text.
    pub fn deserialize_into<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        match self {
            Payload::Value(value) => serde_json::from_value(value),
            Payload::Bytes(bytes) => serde_json::from_slice(&bytes),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            Payload::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Bytes(_) => None,
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Payload::Bytes(_))
    }

    /// Size in bytes for byte payloads, `None` for structured values.
    pub fn byte_len(&self) -> Option<usize> {
        self.as_bytes().map(<[u8]>::len)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Value(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Value(serde_json::Value::String(s))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Value(serde_json::Value::String(s.to_string()))
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
