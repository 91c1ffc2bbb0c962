//! Port traits.
//!
//! The adapter reaches its backend only through these traits.

use crate::{Payload, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Key-value backend with get/set/delete-with-TTL semantics.
///
/// Implementations enforce their own expiry and eviction policy and must be
/// safe to call concurrently.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value. `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Payload>>;

    /// Set a value. `None` leaves expiry to the backend's default policy.
    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<()>;

    /// Delete a value. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Store name for logging.
    fn name(&self) -> &str {
        "kv"
    }
}
