//! Persistence of users, threads, steps, elements and feedback
//!
//! - `DataLayer` - the persistence trait sessions talk to
//! - `StorageClient` - object storage for element payloads
//! - `SqliteDataLayer` - SQL implementation (requires `sqlite` feature)
//! - `FsStorageClient` / `MemoryStorageClient` - storage clients

pub mod helper;
pub mod ids;
pub mod implementations;
pub mod traits;
pub mod types;

pub use implementations::fs::FsStorageClient;
pub use implementations::memory::{MemoryStorageClient, StoredObject};
#[cfg(feature = "sqlite")]
pub use implementations::sqlite::{DataLayerOptions, SqliteDataLayer};
pub use traits::{DataLayer, StorageClient};
