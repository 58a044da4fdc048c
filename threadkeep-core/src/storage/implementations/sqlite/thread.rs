//! SQLite statements for the `threads` table, thread listing and cascade deletes

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::element::ElementRow;
use super::sql::{json_text, upsert_sql, ConflictUpdate, SqlParams};
use super::step::StepRow;
use super::SqliteDataLayer;
use crate::error::DataLayerError;
use crate::storage::helper::{iso_timestamp, json_column};
use crate::storage::ids::{ThreadId, UserId};
use crate::storage::types::{
    paginate, PaginatedResponse, Pagination, ThreadDict, ThreadFilter, ThreadUpdate,
};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS threads (
            "id" TEXT PRIMARY KEY,
            "createdAt" TEXT,
            "name" TEXT,
            "userId" TEXT,
            "userIdentifier" TEXT,
            "tags" TEXT,
            "metadata" TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_threads_user ON threads("userId", "createdAt");
        "#,
    )
    .context("Failed to initialize thread schema")?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadRow {
    id: String,
    created_at: Option<String>,
    name: Option<String>,
    user_id: Option<String>,
    user_identifier: Option<String>,
    tags: Value,
    metadata: Value,
}

impl From<ThreadRow> for ThreadDict {
    fn from(row: ThreadRow) -> Self {
        let tags = serde_json::from_value(json_column(row.tags)).ok();
        let metadata = match json_column(row.metadata) {
            Value::Object(map) => Some(map),
            _ => None,
        };
        ThreadDict {
            id: ThreadId::from_string(row.id),
            created_at: row.created_at,
            name: row.name,
            user_id: row.user_id.map(UserId::from_string),
            user_identifier: row.user_identifier,
            tags,
            metadata,
            steps: Vec::new(),
            elements: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorRow {
    user_identifier: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectKeyRow {
    object_key: Option<String>,
}

/// `(:t0, :t1, ...)` plus the matching parameters
fn id_list(ids: &[&ThreadId]) -> (String, SqlParams) {
    let mut params = SqlParams::new();
    let placeholders: Vec<String> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let name = format!("t{}", i);
            params.push(&name, id.to_string());
            format!(":{}", name)
        })
        .collect();
    (format!("({})", placeholders.join(", ")), params)
}

impl SqliteDataLayer {
    pub(crate) fn select_thread_author(&self, thread_id: &ThreadId) -> Result<String> {
        let rows: Vec<AuthorRow> = self.fetch(
            r#"SELECT "userIdentifier" FROM threads WHERE "id" = :id"#,
            &SqlParams::new().set("id", thread_id.clone()),
        )?;
        rows.into_iter()
            .next()
            .and_then(|row| row.user_identifier)
            .ok_or_else(|| DataLayerError::AuthorNotFound(thread_id.clone()).into())
    }

    /// Upsert over the columns present in `update`.
    ///
    /// `createdAt` is stamped whenever no metadata is supplied, so threads
    /// touched by new steps sort first when listing.
    pub(crate) fn upsert_thread(&self, thread_id: &ThreadId, update: &ThreadUpdate) -> Result<()> {
        let user_identifier = match &update.user_id {
            Some(user_id) => Some(self.user_identifier_by_id(user_id)?),
            None => None,
        };
        let tags = update.tags.as_ref().map(json_text).transpose()?;
        let metadata = update.effective_metadata().map(json_text).transpose()?;

        let params = SqlParams::new()
            .set("id", thread_id.clone())
            .set_opt("createdAt", update.metadata.is_none().then(iso_timestamp))
            .set_opt("name", update.resolved_name())
            .set_opt("userId", update.user_id.as_ref().map(UserId::to_string))
            .set_opt("userIdentifier", user_identifier)
            .set_opt("tags", tags)
            .set_opt("metadata", metadata);

        self.execute_sql(&upsert_sql("threads", &params, ConflictUpdate::Excluded), &params)?;
        Ok(())
    }

    /// Delete stored payloads, then feedbacks, elements, steps and the thread
    pub(crate) async fn delete_thread_cascade(&self, thread_id: &ThreadId) -> Result<()> {
        let params = SqlParams::new().set("id", thread_id.clone());

        let elements: Vec<ObjectKeyRow> = self.fetch(
            r#"SELECT "objectKey" FROM elements WHERE "threadId" = :id"#,
            &params,
        )?;
        if let Some(storage) = self.storage() {
            for object_key in elements.into_iter().filter_map(|e| e.object_key) {
                storage.delete_file(&object_key).await?;
            }
        }

        self.execute_sql(
            r#"DELETE FROM feedbacks WHERE "forId" IN (SELECT "id" FROM steps WHERE "threadId" = :id)"#,
            &params,
        )?;
        self.execute_sql(r#"DELETE FROM elements WHERE "threadId" = :id"#, &params)?;
        self.execute_sql(r#"DELETE FROM steps WHERE "threadId" = :id"#, &params)?;
        self.execute_sql(r#"DELETE FROM threads WHERE "id" = :id"#, &params)?;
        Ok(())
    }

    pub(crate) fn list_user_threads(
        &self,
        pagination: &Pagination,
        filters: &ThreadFilter,
    ) -> Result<PaginatedResponse<ThreadDict>> {
        let user_id = filters.user_id.as_ref().ok_or(DataLayerError::MissingUserId)?;

        let filtered: Vec<ThreadDict> = self
            .get_all_user_threads(Some(user_id), None)?
            .into_iter()
            .filter(|thread| filters.matches(thread))
            .collect();

        Ok(paginate(filtered, pagination, |t| t.id.as_str()))
    }

    /// Threads of a user (newest first, up to the thread limit), or the single
    /// thread `thread_id`, each with its steps and elements.
    pub(crate) fn get_all_user_threads(
        &self,
        user_id: Option<&UserId>,
        thread_id: Option<&ThreadId>,
    ) -> Result<Vec<ThreadDict>> {
        self.log_call(format_args!("get_all_user_threads"));
        let limit = self.user_thread_limit().map(i64::from).unwrap_or(-1);
        let threads: Vec<ThreadRow> = self.fetch(
            r#"
            SELECT "id", "createdAt", "name", "userId", "userIdentifier", "tags", "metadata"
            FROM threads
            WHERE "userId" = :user_id OR "id" = :thread_id
            ORDER BY "createdAt" DESC
            LIMIT :limit
            "#,
            &SqlParams::new()
                .set("user_id", user_id.map(UserId::to_string))
                .set("thread_id", thread_id.map(ThreadId::to_string))
                .set("limit", limit),
        )?;
        if threads.is_empty() {
            return Ok(Vec::new());
        }

        let mut thread_dicts: Vec<ThreadDict> = threads.into_iter().map(ThreadDict::from).collect();
        let index: HashMap<String, usize> = thread_dicts
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.to_string(), i))
            .collect();
        let ids: Vec<&ThreadId> = thread_dicts.iter().map(|t| &t.id).collect();
        let (id_sql, id_params) = id_list(&ids);

        let steps: Vec<StepRow> = self.fetch(
            &format!(
                r#"
                SELECT s."id", s."name", s."type", s."threadId", s."parentId", s."streaming",
                       s."waitForAnswer", s."isError", s."metadata", s."tags", s."input",
                       s."output", s."createdAt", s."start", s."end", s."generation",
                       s."showInput", s."language",
                       f."value" AS "feedbackValue",
                       f."comment" AS "feedbackComment",
                       f."id" AS "feedbackId"
                FROM steps s LEFT JOIN feedbacks f ON s."id" = f."forId"
                WHERE s."threadId" IN {}
                ORDER BY s."createdAt" ASC
                "#,
                id_sql
            ),
            &id_params,
        )?;

        let elements: Vec<ElementRow> = self.fetch(
            &format!(r#"SELECT * FROM elements WHERE "threadId" IN {}"#, id_sql),
            &id_params,
        )?;

        for row in steps {
            let step = row.into_step()?;
            if let Some(&i) = index.get(step.thread_id.as_str()) {
                thread_dicts[i].steps.push(step);
            }
        }

        for row in elements {
            let element = row.into_element()?;
            let slot = element
                .thread_id
                .as_ref()
                .and_then(|id| index.get(id.as_str()).copied());
            if let Some(i) = slot {
                thread_dicts[i].elements.push(element);
            }
        }

        Ok(thread_dicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::sqlite::DataLayerOptions;
    use crate::storage::types::{StepDict, User};
    use serde_json::{json, Map};

    fn layer() -> SqliteDataLayer {
        SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap()
    }

    #[test]
    fn test_id_list_placeholders() {
        let a = ThreadId::from("a");
        let b = ThreadId::from("b");
        let (sql, params) = id_list(&[&a, &b]);
        assert_eq!(sql, "(:t0, :t1)");
        assert_eq!(params.columns().collect::<Vec<_>>(), vec!["t0", "t1"]);
    }

    #[test]
    fn test_upsert_thread_resolves_user_identifier() {
        let layer = layer();
        let user = layer.upsert_user(&User::new("bob")).unwrap().unwrap();
        let thread_id = ThreadId::new();

        layer
            .upsert_thread(&thread_id, &ThreadUpdate::new().user(user.id.clone()).tags(["a", "b"]))
            .unwrap();

        let thread = layer.get_all_user_threads(None, Some(&thread_id)).unwrap().remove(0);
        assert_eq!(thread.user_identifier.as_deref(), Some("bob"));
        assert_eq!(thread.tags, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(layer.select_thread_author(&thread_id).unwrap(), "bob");
    }

    #[test]
    fn test_upsert_keeps_columns_not_supplied() {
        let layer = layer();
        let thread_id = ThreadId::new();
        let mut meta = Map::new();
        meta.insert("name".into(), json!("Named by metadata"));
        meta.insert("topic".into(), json!("rust"));

        layer.upsert_thread(&thread_id, &ThreadUpdate::new().metadata(meta)).unwrap();
        layer.upsert_thread(&thread_id, &ThreadUpdate::new()).unwrap();

        let thread = layer.get_all_user_threads(None, Some(&thread_id)).unwrap().remove(0);
        assert_eq!(thread.name.as_deref(), Some("Named by metadata"));
        assert_eq!(thread.metadata.unwrap()["topic"], json!("rust"));
        assert!(thread.created_at.is_some());
    }

    #[test]
    fn test_upsert_with_unknown_user_fails() {
        let err = layer()
            .upsert_thread(&ThreadId::new(), &ThreadUpdate::new().user(UserId::from("ghost")))
            .unwrap_err();
        assert!(err.downcast_ref::<DataLayerError>().is_some());
    }

    #[test]
    fn test_author_missing() {
        let layer = layer();
        let thread_id = ThreadId::new();
        layer.upsert_thread(&thread_id, &ThreadUpdate::new()).unwrap();
        let err = layer.select_thread_author(&thread_id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DataLayerError>(),
            Some(&DataLayerError::AuthorNotFound(thread_id))
        );
    }

    #[tokio::test]
    async fn test_delete_cascade_continues_past_failed_statement() {
        let layer = layer();
        let user = layer.upsert_user(&User::new("hal")).unwrap().unwrap();
        let thread_id = ThreadId::new();
        layer
            .upsert_thread(&thread_id, &ThreadUpdate::new().user(user.id.clone()))
            .unwrap();
        layer
            .upsert_step(&StepDict::user_message(thread_id.clone(), "hal", "hi"))
            .unwrap();
        layer
            .conn()
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE feedbacks")
            .unwrap();

        layer.delete_thread_cascade(&thread_id).await.unwrap();

        assert!(layer.get_all_user_threads(None, Some(&thread_id)).unwrap().is_empty());
        let steps = layer
            .execute_sql("SELECT COUNT(*) AS n FROM steps", &SqlParams::new())
            .unwrap()
            .into_rows();
        assert_eq!(steps[0]["n"], json!(0));
    }
}
