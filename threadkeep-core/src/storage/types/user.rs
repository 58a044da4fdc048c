//! User storage types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::ids::UserId;

/// A user as known to the application, before it is persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub identifier: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl User {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A user row as stored in the `users` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedUser {
    pub id: UserId,
    pub identifier: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
