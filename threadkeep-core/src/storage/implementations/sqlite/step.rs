//! SQLite statements for the `steps` table

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::sql::{json_text, upsert_sql, ConflictUpdate, SqlParams};
use super::SqliteDataLayer;
use crate::storage::helper::{json_column, json_object_column};
use crate::storage::ids::{FeedbackId, StepId, ThreadId};
use crate::storage::types::{FeedbackDict, ShowInput, StepDict, StepType};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS steps (
            "id" TEXT PRIMARY KEY,
            "name" TEXT NOT NULL,
            "type" TEXT NOT NULL,
            "threadId" TEXT NOT NULL,
            "parentId" TEXT,
            "streaming" INTEGER NOT NULL DEFAULT 0,
            "waitForAnswer" INTEGER,
            "isError" INTEGER,
            "metadata" TEXT,
            "tags" TEXT,
            "input" TEXT,
            "output" TEXT,
            "createdAt" TEXT,
            "start" TEXT,
            "end" TEXT,
            "generation" TEXT,
            "showInput" TEXT,
            "language" TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_steps_thread ON steps("threadId", "createdAt");
        "#,
    )
    .context("Failed to initialize step schema")?;
    Ok(())
}

/// A step row joined with its feedback
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StepRow {
    id: String,
    name: String,
    #[serde(rename = "type")]
    step_type: String,
    thread_id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    streaming: Option<i64>,
    #[serde(default)]
    wait_for_answer: Option<i64>,
    #[serde(default)]
    is_error: Option<i64>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    tags: Value,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    generation: Value,
    #[serde(default)]
    show_input: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    feedback_value: Option<i64>,
    #[serde(default)]
    feedback_comment: Option<String>,
    #[serde(default)]
    feedback_id: Option<String>,
}

impl StepRow {
    /// Build the step, hiding its input unless `showInput` allows it
    pub(crate) fn into_step(self) -> Result<StepDict> {
        let step_type: StepType = self.step_type.parse().map_err(|e: String| anyhow!(e))?;
        let show_input = self.show_input.as_deref().map(ShowInput::from_column);
        let input = match &show_input {
            Some(show) if show.shows_input() => self.input.unwrap_or_default(),
            _ => String::new(),
        };
        let step_id = StepId::from_string(self.id);

        let feedback = self.feedback_value.map(|value| FeedbackDict {
            id: self.feedback_id.map(FeedbackId::from_string),
            for_id: step_id.clone(),
            value,
            comment: self.feedback_comment,
        });

        let generation = match json_column(self.generation) {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(other),
        };

        Ok(StepDict {
            id: step_id,
            name: self.name,
            step_type,
            thread_id: ThreadId::from_string(self.thread_id),
            parent_id: self.parent_id.map(StepId::from_string),
            streaming: self.streaming.is_some_and(|v| v != 0),
            wait_for_answer: self.wait_for_answer.map(|v| v != 0),
            is_error: self.is_error.map(|v| v != 0),
            metadata: json_object_column(self.metadata),
            tags: serde_json::from_value(json_column(self.tags)).ok(),
            input,
            output: self.output.unwrap_or_default(),
            created_at: self.created_at,
            start: self.start,
            end: self.end,
            generation,
            show_input,
            language: self.language,
            feedback,
        })
    }
}

impl SqliteDataLayer {
    /// Upsert the step's present columns. `metadata` and `generation` are
    /// always written, as `{}` when empty.
    pub(crate) fn upsert_step(&self, step: &StepDict) -> Result<()> {
        let generation = step.generation.clone().unwrap_or_else(|| Value::Object(Map::new()));
        let tags = step.tags.as_ref().map(json_text).transpose()?;

        let params = SqlParams::new()
            .set("id", step.id.clone())
            .set("name", step.name.clone())
            .set("type", step.step_type.as_str().to_string())
            .set("threadId", step.thread_id.to_string())
            .set_opt("parentId", step.parent_id.as_ref().map(StepId::to_string))
            .set("streaming", step.streaming)
            .set_opt("waitForAnswer", step.wait_for_answer)
            .set_opt("isError", step.is_error)
            .set("metadata", json_text(&step.metadata)?)
            .set_opt("tags", tags)
            .set("input", step.input.clone())
            .set("output", step.output.clone())
            .set_opt("createdAt", step.created_at.clone())
            .set_opt("start", step.start.clone())
            .set_opt("end", step.end.clone())
            .set("generation", json_text(&generation)?)
            .set_opt("showInput", step.show_input.as_ref().map(ShowInput::to_column))
            .set_opt("language", step.language.clone());

        self.execute_sql(&upsert_sql("steps", &params, ConflictUpdate::Params), &params)?;
        Ok(())
    }

    /// Delete feedbacks, attached elements, then the step
    pub(crate) fn delete_step_cascade(&self, step_id: &StepId) -> Result<()> {
        let params = SqlParams::new().set("id", step_id.clone());
        self.execute_sql(r#"DELETE FROM feedbacks WHERE "forId" = :id"#, &params)?;
        self.execute_sql(r#"DELETE FROM elements WHERE "forId" = :id"#, &params)?;
        self.execute_sql(r#"DELETE FROM steps WHERE "id" = :id"#, &params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::sqlite::DataLayerOptions;
    use crate::storage::types::ThreadUpdate;
    use serde_json::json;

    fn layer() -> SqliteDataLayer {
        SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap()
    }

    fn read_back(layer: &SqliteDataLayer, thread_id: &ThreadId) -> Vec<StepDict> {
        layer
            .get_all_user_threads(None, Some(thread_id))
            .unwrap()
            .remove(0)
            .steps
    }

    #[test]
    fn test_input_hidden_without_show_input() {
        let layer = layer();
        let thread_id = ThreadId::new();
        layer.upsert_thread(&thread_id, &ThreadUpdate::new()).unwrap();

        let mut hidden = StepDict::new(thread_id.clone(), "tool", StepType::Tool)
            .with_created_at("2024-01-01T00:00:00Z");
        hidden.input = "secret".into();
        let shown = StepDict::new(thread_id.clone(), "llm", StepType::Llm)
            .with_input("prompt", ShowInput::Language("JSON".into()))
            .with_created_at("2024-01-01T00:00:01Z");
        let off = StepDict::new(thread_id.clone(), "run", StepType::Run)
            .with_input("quiet", ShowInput::Flag(false))
            .with_created_at("2024-01-01T00:00:02Z");
        for step in [&hidden, &shown, &off] {
            layer.upsert_step(step).unwrap();
        }

        let steps = read_back(&layer, &thread_id);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].input, "");
        assert_eq!(steps[1].input, "prompt");
        assert_eq!(steps[1].show_input, Some(ShowInput::Language("json".into())));
        assert_eq!(steps[2].input, "");
    }

    #[test]
    fn test_upsert_updates_existing_step() {
        let layer = layer();
        let thread_id = ThreadId::new();
        let mut step = StepDict::new(thread_id.clone(), "assistant", StepType::AssistantMessage);
        step.streaming = true;
        step.metadata.insert("k".into(), json!(1));
        layer.upsert_step(&step).unwrap();

        step.streaming = false;
        step.output = "done".into();
        step.generation = Some(json!({"model": "m"}));
        layer.upsert_step(&step).unwrap();
        layer.upsert_thread(&thread_id, &ThreadUpdate::new()).unwrap();

        let stored = read_back(&layer, &thread_id).remove(0);
        assert!(!stored.streaming);
        assert_eq!(stored.output, "done");
        assert_eq!(stored.metadata["k"], json!(1));
        assert_eq!(stored.generation, Some(json!({"model": "m"})));
    }

    #[test]
    fn test_delete_step_cascade() {
        let layer = layer();
        let thread_id = ThreadId::new();
        layer.upsert_thread(&thread_id, &ThreadUpdate::new()).unwrap();
        let step = StepDict::user_message(thread_id.clone(), "alice", "hi");
        layer.upsert_step(&step).unwrap();
        layer
            .write_feedback(&crate::storage::types::Feedback::new(step.id.clone(), 1))
            .unwrap();

        layer.delete_step_cascade(&step.id).unwrap();

        assert!(read_back(&layer, &thread_id).is_empty());
        let left = layer
            .execute_sql("SELECT COUNT(*) AS n FROM feedbacks", &SqlParams::new())
            .unwrap()
            .into_rows();
        assert_eq!(left[0]["n"], json!(0));
    }
}
