//! Error types for validation failures callers may want to match on
//!
//! Storage operations return `anyhow::Result`; these errors travel inside it
//! and can be recovered with `downcast_ref`.

use thiserror::Error;

use crate::storage::ids::ThreadId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataLayerError {
    #[error("userId is required to list threads")]
    MissingUserId,

    #[error("author not found for thread_id {0}")]
    AuthorNotFound(ThreadId),

    #[error("user not found for id {0}")]
    UnknownUser(String),

    #[error("element url, path or content must be provided")]
    MissingElementContent,

    #[error("content is empty, cannot upload element {0}")]
    EmptyElementContent(String),

    #[error("object already exists: {0}")]
    ObjectExists(String),

    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum WidgetError {
    #[error("must provide values or items to create select widget {0}")]
    SelectWithoutOptions(String),

    #[error("select widget {0} takes values or items, not both")]
    SelectWithBothOptions(String),

    #[error("initial index {index} out of range for select widget {id}")]
    InitialIndexOutOfRange { id: String, index: usize },

    #[error("slider {id}: expected min <= initial <= max and step > 0 (min {min}, initial {initial}, max {max}, step {step})")]
    InvalidSliderRange {
        id: String,
        min: f64,
        max: f64,
        initial: f64,
        step: f64,
    },

    #[error("duplicate widget id: {0}")]
    DuplicateId(String),
}
