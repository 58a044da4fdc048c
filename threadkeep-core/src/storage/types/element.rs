//! Element storage types
//!
//! `ElementDict` is the persisted row. `Element` is what an application hands
//! to the data layer to create one: the row fields plus the payload source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::storage::ids::{ElementId, StepId, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Image,
    Text,
    Pdf,
    Tasklist,
    Audio,
    Video,
    File,
    Plotly,
    Dataframe,
    Custom,
}

/// Where the client renders the element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementDisplay {
    #[default]
    Inline,
    Side,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementSize {
    Small,
    Medium,
    Large,
}

/// An element row as persisted in the `elements` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDict {
    pub id: ElementId,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(default)]
    pub chainlit_key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub object_key: Option<String>,
    pub name: String,
    #[serde(default)]
    pub display: ElementDisplay,
    #[serde(default)]
    pub size: Option<ElementSize>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub auto_play: Option<bool>,
    #[serde(default)]
    pub player_config: Option<Value>,
    #[serde(default)]
    pub for_id: Option<StepId>,
    #[serde(default)]
    pub mime: Option<String>,
}

impl ElementDict {
    pub fn new(element_type: ElementType, name: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(),
            thread_id: None,
            element_type,
            chainlit_key: None,
            url: None,
            object_key: None,
            name: name.into(),
            display: ElementDisplay::default(),
            size: None,
            language: None,
            page: None,
            props: Map::new(),
            auto_play: None,
            player_config: None,
            for_id: None,
            mime: None,
        }
    }
}

/// An element to be created, with its payload source.
///
/// The payload is taken from `path` first, then `dict.url`, then `content`.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub dict: ElementDict,
    pub path: Option<PathBuf>,
    pub content: Option<Vec<u8>>,
}

impl Element {
    pub fn new(element_type: ElementType, name: impl Into<String>) -> Self {
        Self {
            dict: ElementDict::new(element_type, name),
            path: None,
            content: None,
        }
    }

    /// Attach the element to a step of a thread
    pub fn attached_to(mut self, thread_id: ThreadId, for_id: StepId) -> Self {
        self.dict.thread_id = Some(thread_id);
        self.dict.for_id = Some(for_id);
        self
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.dict.url = Some(url.into());
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.dict.mime = Some(mime.into());
        self
    }

    pub fn id(&self) -> &ElementId {
        &self.dict.id
    }

    pub fn to_dict(&self) -> ElementDict {
        self.dict.clone()
    }
}

/// Reference returned by a storage client after an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub object_key: String,
    pub url: String,
}
