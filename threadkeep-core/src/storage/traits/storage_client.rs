//! StorageClient trait for element payloads kept outside the database

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::types::UploadedFile;

/// Object storage addressed by string keys
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Store `data` under `object_key` and return where it can be fetched.
    ///
    /// With `overwrite == false` an existing object is an error.
    async fn upload_file(
        &self,
        object_key: &str,
        data: &[u8],
        mime: &str,
        overwrite: bool,
    ) -> Result<UploadedFile>;

    /// Delete an object.
    ///
    /// Returns Ok(true) if deleted, Ok(false) if it didn't exist
    async fn delete_file(&self, object_key: &str) -> Result<bool>;
}
