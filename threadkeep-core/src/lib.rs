//! Conversation persistence and session plumbing for chat applications
//!
//! This crate provides:
//! - **Storage**: the `DataLayer` trait with a SQLite implementation, plus
//!   `StorageClient` backends for element payloads
//! - **Session**: `ChatSession`, which defers step and element writes until
//!   the first user message
//! - **Widgets**: input widgets pushed to the client, with change callbacks
//!
//! # Example
//!
//! ```ignore
//! use threadkeep_core::{ChatSession, DataLayerOptions, SqliteDataLayer};
//!
//! let layer = Arc::new(SqliteDataLayer::in_memory(DataLayerOptions::default())?);
//! let (mut session, events) = ChatSession::new(layer, ThreadId::new());
//! session.on_user_message(StepDict::user_message(thread_id, "alice", "hi")).await?;
//! ```
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod widgets;

pub use error::{DataLayerError, WidgetError};
pub use events::SessionEvent;
pub use session::{ChatSession, PendingWrite};
pub use storage::ids::{ElementId, FeedbackId, StepId, ThreadId, UserId};
pub use storage::types::{
    Element, ElementDict, ElementType, Feedback, PaginatedResponse, Pagination, PersistedUser,
    StepDict, StepType, ThreadDict, ThreadFilter, ThreadUpdate, User,
};
pub use storage::{DataLayer, FsStorageClient, MemoryStorageClient, StorageClient};
#[cfg(feature = "sqlite")]
pub use storage::{DataLayerOptions, SqliteDataLayer};
pub use widgets::{InputBar, InputWidget, SelectItem, WidgetCallback, WidgetKind};
