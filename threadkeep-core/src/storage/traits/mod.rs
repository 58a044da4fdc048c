//! Storage trait definitions
//!
//! All storage traits are defined here, with implementations in `implementations/`.

mod data_layer;
mod storage_client;

pub use data_layer::DataLayer;
pub use storage_client::StorageClient;
