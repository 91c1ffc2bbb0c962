//! Memo Core
//!
//! Shared vocabulary for the memo cache adapter: the error type, the
//! [`Payload`] that travels between the adapter and a backend, and the
//! [`KeyValueStore`] port every backend implements.

pub mod error;
pub mod payload;
pub mod ports;

pub use error::{BoxError, Error, Result};
pub use payload::Payload;
pub use ports::KeyValueStore;
