//! SQLite statements for the `feedbacks` table

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::sql::{upsert_sql, ConflictUpdate, SqlParams};
use super::SqliteDataLayer;
use crate::storage::ids::{FeedbackId, ThreadId};
use crate::storage::types::Feedback;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS feedbacks (
            "id" TEXT PRIMARY KEY,
            "forId" TEXT NOT NULL,
            "threadId" TEXT,
            "value" INTEGER NOT NULL,
            "comment" TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_feedbacks_for ON feedbacks("forId");
        "#,
    )
    .context("Failed to initialize feedback schema")?;
    Ok(())
}

impl SqliteDataLayer {
    pub(crate) fn write_feedback(&self, feedback: &Feedback) -> Result<FeedbackId> {
        let id = feedback.id.clone().unwrap_or_default();
        let params = SqlParams::new()
            .set("id", id.to_string())
            .set("forId", feedback.for_id.to_string())
            .set_opt("threadId", feedback.thread_id.as_ref().map(ThreadId::to_string))
            .set("value", feedback.value)
            .set_opt("comment", feedback.comment.clone());

        self.execute_sql(&upsert_sql("feedbacks", &params, ConflictUpdate::Params), &params)?;
        Ok(id)
    }

    pub(crate) fn remove_feedback(&self, feedback_id: &FeedbackId) -> Result<()> {
        self.execute_sql(
            r#"DELETE FROM feedbacks WHERE "id" = :feedback_id"#,
            &SqlParams::new().set("feedback_id", feedback_id.to_string()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::sqlite::DataLayerOptions;
    use crate::storage::ids::StepId;
    use crate::storage::types::{StepDict, ThreadUpdate};

    #[test]
    fn test_feedback_assigned_updated_and_joined() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        let thread_id = ThreadId::new();
        layer.upsert_thread(&thread_id, &ThreadUpdate::new()).unwrap();
        let step = StepDict::user_message(thread_id.clone(), "alice", "hello");
        layer.upsert_step(&step).unwrap();

        let id = layer.write_feedback(&Feedback::new(step.id.clone(), 0)).unwrap();
        let mut changed = Feedback::new(step.id.clone(), 1).with_comment("better");
        changed.id = Some(id.clone());
        assert_eq!(layer.write_feedback(&changed).unwrap(), id);

        let thread = layer.get_all_user_threads(None, Some(&thread_id)).unwrap().remove(0);
        let feedback = thread.steps[0].feedback.clone().unwrap();
        assert_eq!(feedback.id, Some(id.clone()));
        assert_eq!(feedback.value, 1);
        assert_eq!(feedback.comment.as_deref(), Some("better"));

        layer.remove_feedback(&id).unwrap();
        let thread = layer.get_all_user_threads(None, Some(&thread_id)).unwrap().remove(0);
        assert!(thread.steps[0].feedback.is_none());
    }

    #[test]
    fn test_feedback_without_step_is_stored() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        let id = layer.write_feedback(&Feedback::new(StepId::from("missing"), 1)).unwrap();
        assert!(!id.as_str().is_empty());
    }
}
