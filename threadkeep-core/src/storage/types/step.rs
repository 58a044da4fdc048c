//! Step storage types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::feedback::FeedbackDict;
use crate::storage::ids::{StepId, ThreadId};

/// Kind of work a step records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    AssistantMessage,
    UserMessage,
    SystemMessage,
    Run,
    Tool,
    Llm,
    Embedding,
    Retrieval,
    Rerank,
    Undefined,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::AssistantMessage => "assistant_message",
            StepType::UserMessage => "user_message",
            StepType::SystemMessage => "system_message",
            StepType::Run => "run",
            StepType::Tool => "tool",
            StepType::Llm => "llm",
            StepType::Embedding => "embedding",
            StepType::Retrieval => "retrieval",
            StepType::Rerank => "rerank",
            StepType::Undefined => "undefined",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assistant_message" => Ok(StepType::AssistantMessage),
            "user_message" => Ok(StepType::UserMessage),
            "system_message" => Ok(StepType::SystemMessage),
            "run" => Ok(StepType::Run),
            "tool" => Ok(StepType::Tool),
            "llm" => Ok(StepType::Llm),
            "embedding" => Ok(StepType::Embedding),
            "retrieval" => Ok(StepType::Retrieval),
            "rerank" => Ok(StepType::Rerank),
            "undefined" => Ok(StepType::Undefined),
            other => Err(format!("Unknown step type: {}", other)),
        }
    }
}

/// Whether a step's input is shown, and optionally the language to render it in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShowInput {
    Flag(bool),
    Language(String),
}

impl ShowInput {
    /// Column representation: lower-cased text
    pub fn to_column(&self) -> String {
        match self {
            ShowInput::Flag(flag) => flag.to_string(),
            ShowInput::Language(lang) => lang.to_lowercase(),
        }
    }

    pub fn from_column(text: &str) -> Self {
        match text {
            "true" => ShowInput::Flag(true),
            "false" => ShowInput::Flag(false),
            other => ShowInput::Language(other.to_string()),
        }
    }

    /// Input is hidden only by an explicit `false`
    pub fn shows_input(&self) -> bool {
        !matches!(self, ShowInput::Flag(false))
    }
}

/// A step as persisted and as returned inside a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDict {
    pub id: StepId,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub thread_id: ThreadId,
    #[serde(default)]
    pub parent_id: Option<StepId>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub wait_for_answer: Option<bool>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub generation: Option<Value>,
    #[serde(default)]
    pub show_input: Option<ShowInput>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackDict>,
}

impl StepDict {
    pub fn new(thread_id: ThreadId, name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: StepId::new(),
            name: name.into(),
            step_type,
            thread_id,
            parent_id: None,
            streaming: false,
            wait_for_answer: None,
            is_error: None,
            metadata: Map::new(),
            tags: None,
            input: String::new(),
            output: String::new(),
            created_at: None,
            start: None,
            end: None,
            generation: None,
            show_input: None,
            language: None,
            feedback: None,
        }
    }

    /// A user message step carrying `content` as its output
    pub fn user_message(thread_id: ThreadId, author: impl Into<String>, content: impl Into<String>) -> Self {
        let mut step = Self::new(thread_id, author, StepType::UserMessage);
        step.output = content.into();
        step
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_input(mut self, input: impl Into<String>, show: ShowInput) -> Self {
        self.input = input.into();
        self.show_input = Some(show);
        self
    }

    pub fn with_parent(mut self, parent_id: StepId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_type_string_forms_agree() {
        for ty in [StepType::UserMessage, StepType::Llm, StepType::Undefined] {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, Value::String(ty.as_str().to_string()));
            assert_eq!(ty.as_str().parse::<StepType>().unwrap(), ty);
        }
        assert!("chat".parse::<StepType>().is_err());
    }

    #[test]
    fn test_show_input_column_form() {
        assert_eq!(ShowInput::Flag(true).to_column(), "true");
        assert_eq!(ShowInput::Language("JSON".into()).to_column(), "json");
        assert_eq!(ShowInput::from_column("false"), ShowInput::Flag(false));
        assert!(!ShowInput::from_column("false").shows_input());
        assert!(ShowInput::from_column("python").shows_input());
    }

    #[test]
    fn test_step_serializes_with_camel_case_keys() {
        let step = StepDict::user_message(ThreadId::from("t1"), "alice", "hi");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "user_message");
        assert_eq!(json["threadId"], "t1");
        assert_eq!(json["output"], "hi");
        assert!(json.get("feedback").is_none());
    }
}
