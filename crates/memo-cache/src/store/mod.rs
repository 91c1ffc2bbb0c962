//! Reference key-value backends.

mod filesystem;
mod memory;

pub use filesystem::FilesystemStore;
pub use memory::{MemoryStore, MemoryStoreConfig};
