//! In-memory storage implementations for testing
//!
//! These implementations store data in memory and are useful for unit tests
//! where you don't want to touch the filesystem.

mod storage_client;

pub use storage_client::{MemoryStorageClient, StoredObject};
