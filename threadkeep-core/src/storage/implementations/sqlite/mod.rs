//! SQLite storage backend
//!
//! Provides `SqliteDataLayer` - a shared SQLite connection wrapper that
//! implements `DataLayer` over the `users`, `threads`, `steps`, `elements`
//! and `feedbacks` tables. Element payloads go to an optional
//! `StorageClient`; only the returned object key and URL are stored.
//!
//! Per-table statements are in submodules:
//! - `user` - users
//! - `thread` - threads, listing and cascade deletes
//! - `step` - steps
//! - `element` - elements and payload upload
//! - `feedback` - feedbacks
//! - `sql` - statement execution and upsert building

use anyhow::{Context, Result};
use async_trait::async_trait;
use config::Settings;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::storage::ids::{ElementId, FeedbackId, StepId, ThreadId};
use crate::storage::implementations::fs::FsStorageClient;
use crate::storage::traits::{DataLayer, StorageClient};
use crate::storage::types::{
    Element, ElementDict, Feedback, PaginatedResponse, Pagination, PersistedUser, StepDict,
    ThreadDict, ThreadFilter, ThreadUpdate, User,
};

mod element;
mod feedback;
mod sql;
mod step;
mod thread;
mod user;

/// Construction options for [`SqliteDataLayer`]
#[derive(Clone)]
pub struct DataLayerOptions {
    /// Where element payloads are uploaded; elements are not persisted without one
    pub storage: Option<Arc<dyn StorageClient>>,
    /// Maximum threads loaded per user when listing, `None` for no limit
    pub user_thread_limit: Option<u32>,
    /// Trace every call at info level
    pub show_logger: bool,
}

impl Default for DataLayerOptions {
    fn default() -> Self {
        Self {
            storage: None,
            user_thread_limit: Some(config::settings::DEFAULT_USER_THREAD_LIMIT),
            show_logger: false,
        }
    }
}

impl DataLayerOptions {
    pub fn with_storage(mut self, storage: Arc<dyn StorageClient>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_thread_limit(mut self, limit: Option<u32>) -> Self {
        self.user_thread_limit = limit;
        self
    }

    pub fn with_show_logger(mut self, show_logger: bool) -> Self {
        self.show_logger = show_logger;
        self
    }
}

/// SQL-backed data layer
///
/// Create one and share it via `Arc` across sessions.
pub struct SqliteDataLayer {
    conn: Arc<Mutex<Connection>>,
    storage: Option<Arc<dyn StorageClient>>,
    user_thread_limit: Option<u32>,
    show_logger: bool,
}

impl SqliteDataLayer {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>, options: DataLayerOptions) -> Result<Self> {
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.as_ref().display()))?;
        Self::with_connection(conn, options)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory(options: DataLayerOptions) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, options)
    }

    /// Open the database and filesystem storage described by the settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let db_path = settings
            .resolved_database_path()
            .context("Could not determine database path")?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = DataLayerOptions::default()
            .with_thread_limit(settings.thread_limit())
            .with_show_logger(settings.show_logger);
        if let Some(dir) = settings.resolved_storage_dir() {
            let mut client = FsStorageClient::new(dir);
            if let Some(base_url) = &settings.storage_base_url {
                client = client.with_base_url(base_url.clone());
            }
            options = options.with_storage(Arc::new(client));
        }

        Self::open(db_path, options)
    }

    fn with_connection(conn: Connection, options: DataLayerOptions) -> Result<Self> {
        let layer = Self {
            conn: Arc::new(Mutex::new(conn)),
            storage: options.storage,
            user_thread_limit: options.user_thread_limit,
            show_logger: options.show_logger,
        };
        layer.init_schema()?;

        if layer.storage.is_some() {
            if layer.show_logger {
                tracing::info!("SQLite data layer storage client initialized");
            }
        } else {
            tracing::warn!(
                "SQLite data layer storage client is not initialized and elements will not be persisted!"
            );
        }
        Ok(layer)
    }

    /// Get access to the connection (for statement helpers)
    pub(crate) fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    pub fn storage(&self) -> Option<&Arc<dyn StorageClient>> {
        self.storage.as_ref()
    }

    pub fn user_thread_limit(&self) -> Option<u32> {
        self.user_thread_limit
    }

    /// Per-call trace, only when `show_logger` is on
    fn log_call(&self, args: std::fmt::Arguments<'_>) {
        if self.show_logger {
            tracing::info!("SQLite: {}", args);
        }
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("SQLite connection lock poisoned"))?;
        user::init_schema(&conn)?;
        thread::init_schema(&conn)?;
        step::init_schema(&conn)?;
        element::init_schema(&conn)?;
        feedback::init_schema(&conn)?;
        Ok(())
    }
}

// ============================================================================
// DataLayer Implementation
// ============================================================================

#[async_trait]
impl DataLayer for SqliteDataLayer {
    async fn get_user(&self, identifier: &str) -> Result<Option<PersistedUser>> {
        self.log_call(format_args!("get_user, identifier={}", identifier));
        self.select_user(identifier)
    }

    async fn create_user(&self, user: &User) -> Result<Option<PersistedUser>> {
        self.log_call(format_args!("create_user, user_identifier={}", user.identifier));
        self.upsert_user(user)
    }

    async fn get_thread_author(&self, thread_id: &ThreadId) -> Result<String> {
        self.log_call(format_args!("get_thread_author, thread_id={}", thread_id));
        self.select_thread_author(thread_id)
    }

    async fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<ThreadDict>> {
        self.log_call(format_args!("get_thread, thread_id={}", thread_id));
        Ok(self
            .get_all_user_threads(None, Some(thread_id))?
            .into_iter()
            .next())
    }

    async fn update_thread(&self, thread_id: &ThreadId, update: ThreadUpdate) -> Result<()> {
        self.log_call(format_args!("update_thread, thread_id={}", thread_id));
        self.upsert_thread(thread_id, &update)
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<()> {
        self.log_call(format_args!("delete_thread, thread_id={}", thread_id));
        self.delete_thread_cascade(thread_id).await
    }

    async fn list_threads(
        &self,
        pagination: &Pagination,
        filters: &ThreadFilter,
    ) -> Result<PaginatedResponse<ThreadDict>> {
        self.log_call(format_args!(
            "list_threads, pagination={:?}, filters={:?}",
            pagination, filters
        ));
        self.list_user_threads(pagination, filters)
    }

    async fn create_step(&self, step: &StepDict) -> Result<()> {
        self.upsert_thread(&step.thread_id, &ThreadUpdate::default())?;
        self.log_call(format_args!("create_step, step_id={}", step.id));
        self.upsert_step(step)
    }

    async fn update_step(&self, step: &StepDict) -> Result<()> {
        self.log_call(format_args!("update_step, step_id={}", step.id));
        self.create_step(step).await
    }

    async fn delete_step(&self, step_id: &StepId) -> Result<()> {
        self.log_call(format_args!("delete_step, step_id={}", step_id));
        self.delete_step_cascade(step_id)
    }

    async fn upsert_feedback(&self, feedback: &Feedback) -> Result<FeedbackId> {
        self.log_call(format_args!("upsert_feedback, feedback_id={:?}", feedback.id));
        self.write_feedback(feedback)
    }

    async fn delete_feedback(&self, feedback_id: &FeedbackId) -> Result<bool> {
        self.log_call(format_args!("delete_feedback, feedback_id={}", feedback_id));
        self.remove_feedback(feedback_id)?;
        Ok(true)
    }

    async fn get_element(
        &self,
        thread_id: &ThreadId,
        element_id: &ElementId,
    ) -> Result<Option<ElementDict>> {
        self.log_call(format_args!(
            "get_element, thread_id={}, element_id={}",
            thread_id, element_id
        ));
        self.select_element(thread_id, element_id)
    }

    async fn create_element(&self, element: &Element) -> Result<()> {
        self.log_call(format_args!("create_element, element_id={}", element.id()));
        self.upload_element(element).await
    }

    async fn delete_element(&self, element_id: &ElementId, thread_id: Option<&ThreadId>) -> Result<()> {
        self.log_call(format_args!(
            "delete_element, element_id={}, thread_id={:?}",
            element_id, thread_id
        ));
        self.remove_element(element_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_without_storage() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        assert!(layer.storage().is_none());
        assert_eq!(layer.user_thread_limit(), Some(1000));
    }

    #[tokio::test]
    async fn test_debug_url_is_empty() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        assert_eq!(layer.build_debug_url().await.unwrap(), "");
    }

    #[test]
    fn test_from_settings_creates_database_file() {
        let dir = std::env::temp_dir().join(format!("tk_settings_{}", uuid::Uuid::new_v4()));
        let settings = Settings {
            database_path: Some(dir.join("db").join("threads.db")),
            storage_dir: Some(dir.join("files")),
            ..Settings::default()
        };

        let layer = SqliteDataLayer::from_settings(&settings).unwrap();
        assert!(layer.storage().is_some());
        assert!(dir.join("db").join("threads.db").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
