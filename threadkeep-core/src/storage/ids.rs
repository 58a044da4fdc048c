//! Type-safe ID newtypes for persisted records
//!
//! IDs are generated as UUID v4 strings but any string loaded from the
//! database is accepted, so rows written by other tools stay readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares an id newtype over `String`. Fresh ids are UUID v4; ids read
/// back from rows keep whatever text was stored.
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap a stored id as is
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        /// Bound as a TEXT parameter
        #[cfg(feature = "sqlite")]
        impl From<$name> for rusqlite::types::Value {
            fn from(id: $name) -> Self {
                rusqlite::types::Value::Text(id.0)
            }
        }
    };
}

define_id!(UserId, "Unique identifier for a persisted user");
define_id!(ThreadId, "Unique identifier for a conversation thread");
define_id!(StepId, "Unique identifier for a step within a thread");
define_id!(ElementId, "Unique identifier for an element attachment");
define_id!(FeedbackId, "Unique identifier for a feedback record");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_distinct_uuids() {
        let id1 = StepId::new();
        let id2 = StepId::new();
        assert_ne!(id1, id2);
        assert!(Uuid::parse_str(id1.as_str()).is_ok());
    }

    #[test]
    fn test_foreign_ids_are_kept_verbatim() {
        let id = ElementId::from("legacy element 7");
        assert_eq!(id.as_str(), "legacy element 7");
        assert_eq!(String::from(id), "legacy element 7");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_ids_bind_as_text() {
        let value = rusqlite::types::Value::from(FeedbackId::from("f-1"));
        assert_eq!(value, rusqlite::types::Value::Text("f-1".into()));
    }

    #[test]
    fn test_id_display() {
        let id = UserId::from_string("user-abc");
        assert_eq!(format!("{}", id), "user-abc");
    }

    #[test]
    fn test_id_serde() {
        let id = ThreadId::from_string("thread-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"thread-123\"");

        let parsed: ThreadId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
