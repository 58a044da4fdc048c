//! Filesystem storage client for element payloads
//!
//! Objects live at `{root}/{object_key}`. Keys are relative paths built by the
//! data layer (`user/element/name`), so they are checked for traversal before
//! touching the disk.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::DataLayerError;
use crate::storage::traits::StorageClient;
use crate::storage::types::UploadedFile;

/// Object storage on the local filesystem
#[derive(Debug, Clone)]
pub struct FsStorageClient {
    root: PathBuf,
    /// Public URL prefix; `file://` URLs are returned when unset
    base_url: Option<String>,
}

impl FsStorageClient {
    /// Create a new FsStorageClient with the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self { root, base_url: None }
    }

    /// Serve objects from `base_url/{object_key}`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the filesystem path for an object key
    pub fn path_for(&self, object_key: &str) -> Result<PathBuf> {
        let relative = Path::new(object_key);
        let is_safe = !object_key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_safe {
            return Err(DataLayerError::InvalidObjectKey(object_key.to_string()).into());
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, object_key: &str, path: &Path) -> Result<String> {
        if let Some(base) = &self.base_url {
            return Ok(format!("{}/{}", base, object_key));
        }
        let absolute = std::path::absolute(path)?;
        Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|_| anyhow::anyhow!("Cannot build file URL for {}", absolute.display()))
    }

    /// Read an object back
    pub async fn read(&self, object_key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(object_key)?;
        Ok(fs::read(&path).await?)
    }
}

#[async_trait]
impl StorageClient for FsStorageClient {
    async fn upload_file(
        &self,
        object_key: &str,
        data: &[u8],
        _mime: &str,
        overwrite: bool,
    ) -> Result<UploadedFile> {
        let path = self.path_for(object_key)?;

        if !overwrite && fs::try_exists(&path).await? {
            return Err(DataLayerError::ObjectExists(object_key.to_string()).into());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using a temp file
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        Ok(UploadedFile {
            object_key: object_key.to_string(),
            url: self.url_for(object_key, &path)?,
        })
    }

    async fn delete_file(&self, object_key: &str) -> Result<bool> {
        let path = self.path_for(object_key)?;
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
