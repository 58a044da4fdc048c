//! In-memory StorageClient implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::DataLayerError;
use crate::storage::traits::StorageClient;
use crate::storage::types::UploadedFile;

/// An object held by [`MemoryStorageClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub mime: String,
}

/// In-memory storage client for testing
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, object_key: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(object_key).cloned()
    }

    pub fn contains(&self, object_key: &str) -> bool {
        self.get(object_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn upload_file(
        &self,
        object_key: &str,
        data: &[u8],
        mime: &str,
        overwrite: bool,
    ) -> Result<UploadedFile> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))
            .context("upload_file")?;
        if !overwrite && objects.contains_key(object_key) {
            return Err(DataLayerError::ObjectExists(object_key.to_string()).into());
        }
        objects.insert(
            object_key.to_string(),
            StoredObject {
                data: data.to_vec(),
                mime: mime.to_string(),
            },
        );

        Ok(UploadedFile {
            object_key: object_key.to_string(),
            url: format!("memory://{}", object_key),
        })
    }

    async fn delete_file(&self, object_key: &str) -> Result<bool> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        Ok(objects.remove(object_key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_records_mime() {
        let client = MemoryStorageClient::new();
        let uploaded = client.upload_file("a/b", b"hello", "text/plain", true).await.unwrap();

        assert_eq!(uploaded.url, "memory://a/b");
        let stored = client.get("a/b").unwrap();
        assert_eq!(stored.data, b"hello");
        assert_eq!(stored.mime, "text/plain");
    }

    #[tokio::test]
    async fn test_no_overwrite() {
        let client = MemoryStorageClient::new();
        client.upload_file("k", b"1", "text/plain", false).await.unwrap();
        assert!(client.upload_file("k", b"2", "text/plain", false).await.is_err());
        assert_eq!(client.get("k").unwrap().data, b"1");
    }

    #[tokio::test]
    async fn test_delete() {
        let client = MemoryStorageClient::new();
        client.upload_file("k", b"1", "text/plain", true).await.unwrap();

        assert!(client.delete_file("k").await.unwrap());
        assert!(client.is_empty());
        assert!(!client.delete_file("k").await.unwrap());
    }
}
