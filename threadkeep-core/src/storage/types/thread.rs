//! Thread storage types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::element::ElementDict;
use super::step::StepDict;
use crate::storage::ids::{ThreadId, UserId};

/// A thread with its steps (oldest first) and elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDict {
    pub id: ThreadId,
    pub created_at: Option<String>,
    pub name: Option<String>,
    pub user_id: Option<UserId>,
    pub user_identifier: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub steps: Vec<StepDict>,
    #[serde(default)]
    pub elements: Vec<ElementDict>,
}

/// Fields to write when upserting a thread; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadUpdate {
    pub name: Option<String>,
    pub user_id: Option<UserId>,
    pub metadata: Option<Map<String, Value>>,
    pub tags: Option<Vec<String>>,
}

impl ThreadUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Name to persist: the explicit name, else `metadata.name` when it is a string
    pub fn resolved_name(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.metadata
                .as_ref()
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Metadata to persist; an empty map counts as absent
    pub fn effective_metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref().filter(|m| !m.is_empty())
    }
}
