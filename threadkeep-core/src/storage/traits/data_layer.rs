//! DataLayer trait: persistence of users, threads, steps, elements and feedback

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::{ElementId, FeedbackId, StepId, ThreadId};
use crate::storage::types::{
    Element, ElementDict, Feedback, PaginatedResponse, Pagination, PersistedUser, StepDict,
    ThreadDict, ThreadFilter, ThreadUpdate, User,
};

/// Pluggable persistence layer used by chat sessions
///
/// Implementations own the database schema. Validation failures are reported
/// as [`crate::DataLayerError`] inside the returned `anyhow::Error`.
#[async_trait]
pub trait DataLayer: Send + Sync {
    /// Get a user by its unique identifier
    async fn get_user(&self, identifier: &str) -> Result<Option<PersistedUser>>;

    /// Create the user, or merge `user.metadata` into the stored metadata
    async fn create_user(&self, user: &User) -> Result<Option<PersistedUser>>;

    /// Identifier of the user owning a thread
    async fn get_thread_author(&self, thread_id: &ThreadId) -> Result<String>;

    /// Thread with its steps and elements
    async fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<ThreadDict>>;

    /// Insert the thread, or update the columns present in `update`
    async fn update_thread(&self, thread_id: &ThreadId, update: ThreadUpdate) -> Result<()>;

    /// Delete a thread with its feedbacks, elements (and stored payloads) and steps
    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<()>;

    /// One page of a user's threads; `filters.user_id` is required
    async fn list_threads(
        &self,
        pagination: &Pagination,
        filters: &ThreadFilter,
    ) -> Result<PaginatedResponse<ThreadDict>>;

    async fn create_step(&self, step: &StepDict) -> Result<()>;

    async fn update_step(&self, step: &StepDict) -> Result<()>;

    /// Delete a step with its feedbacks and attached elements
    async fn delete_step(&self, step_id: &StepId) -> Result<()>;

    /// Insert or update feedback, returning its id (assigned when absent)
    async fn upsert_feedback(&self, feedback: &Feedback) -> Result<FeedbackId>;

    async fn delete_feedback(&self, feedback_id: &FeedbackId) -> Result<bool>;

    async fn get_element(
        &self,
        thread_id: &ThreadId,
        element_id: &ElementId,
    ) -> Result<Option<ElementDict>>;

    /// Upload the element payload to the storage client and record the element
    async fn create_element(&self, element: &Element) -> Result<()>;

    async fn delete_element(&self, element_id: &ElementId, thread_id: Option<&ThreadId>) -> Result<()>;

    /// Link to an external inspector for the current thread, if any
    async fn build_debug_url(&self) -> Result<String> {
        Ok(String::new())
    }
}
