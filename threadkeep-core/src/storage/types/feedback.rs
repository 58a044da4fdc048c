//! Feedback storage types

use serde::{Deserialize, Serialize};

use crate::storage::ids::{FeedbackId, StepId, ThreadId};

/// Feedback submitted for a step; `id` is assigned on first upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeedbackId>,
    pub for_id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    /// Rating; the client sends 0 (negative) or 1 (positive)
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Feedback {
    pub fn new(for_id: StepId, value: i64) -> Self {
        Self {
            id: None,
            for_id,
            thread_id: None,
            value,
            comment: None,
        }
    }

    pub fn with_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Feedback as attached to a step when a thread is read back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDict {
    pub id: Option<FeedbackId>,
    pub for_id: StepId,
    pub value: i64,
    pub comment: Option<String>,
}
