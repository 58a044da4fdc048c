//! SQLite statements for the `users` table

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;

use super::sql::{json_text, SqlParams};
use super::SqliteDataLayer;
use crate::error::DataLayerError;
use crate::storage::helper::{iso_timestamp, json_object_column};
use crate::storage::ids::{ThreadId, UserId};
use crate::storage::types::{PersistedUser, User};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            "id" TEXT PRIMARY KEY,
            "identifier" TEXT NOT NULL UNIQUE,
            "metadata" TEXT NOT NULL,
            "createdAt" TEXT
        );
        "#,
    )
    .context("Failed to initialize user schema")?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRow {
    id: String,
    identifier: String,
    created_at: Option<String>,
    metadata: Value,
}

impl From<UserRow> for PersistedUser {
    fn from(row: UserRow) -> Self {
        PersistedUser {
            id: UserId::from_string(row.id),
            identifier: row.identifier,
            created_at: row.created_at.unwrap_or_default(),
            metadata: json_object_column(row.metadata),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifierRow {
    identifier: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadOwnerRow {
    user_id: Option<String>,
}

impl SqliteDataLayer {
    pub(crate) fn select_user(&self, identifier: &str) -> Result<Option<PersistedUser>> {
        let rows: Vec<UserRow> = self.fetch(
            r#"SELECT * FROM users WHERE "identifier" = :identifier"#,
            &SqlParams::new().set("identifier", identifier.to_string()),
        )?;
        Ok(rows.into_iter().next().map(PersistedUser::from))
    }

    /// Insert a new user, or merge the given metadata into the stored one
    pub(crate) fn upsert_user(&self, user: &User) -> Result<Option<PersistedUser>> {
        match self.select_user(&user.identifier)? {
            None => {
                self.log_call(format_args!("create_user, creating the user"));
                let params = SqlParams::new()
                    .set("id", UserId::new())
                    .set("identifier", user.identifier.clone())
                    .set("createdAt", iso_timestamp())
                    .set("metadata", json_text(&user.metadata)?);
                self.execute_sql(
                    r#"INSERT INTO users ("id", "identifier", "createdAt", "metadata") VALUES (:id, :identifier, :createdAt, :metadata)"#,
                    &params,
                )?;
            }
            Some(existing) => {
                self.log_call(format_args!("create_user, updating user metadata"));
                let mut metadata = existing.metadata;
                metadata.extend(user.metadata.clone());
                let params = SqlParams::new()
                    .set("metadata", json_text(&metadata)?)
                    .set("identifier", user.identifier.clone());
                self.execute_sql(
                    r#"UPDATE users SET "metadata" = :metadata WHERE "identifier" = :identifier"#,
                    &params,
                )?;
            }
        }
        self.select_user(&user.identifier)
    }

    pub(crate) fn user_identifier_by_id(&self, user_id: &UserId) -> Result<String> {
        self.log_call(format_args!("user_identifier_by_id, user_id={}", user_id));
        let rows: Vec<IdentifierRow> = self.fetch(
            r#"SELECT "identifier" FROM users WHERE "id" = :user_id"#,
            &SqlParams::new().set("user_id", user_id.to_string()),
        )?;
        rows.into_iter()
            .next()
            .map(|row| row.identifier)
            .ok_or_else(|| DataLayerError::UnknownUser(user_id.to_string()).into())
    }

    pub(crate) fn user_id_by_thread(&self, thread_id: &ThreadId) -> Result<Option<UserId>> {
        self.log_call(format_args!("user_id_by_thread, thread_id={}", thread_id));
        let rows: Vec<ThreadOwnerRow> = self.fetch(
            r#"SELECT "userId" FROM threads WHERE "id" = :thread_id"#,
            &SqlParams::new().set("thread_id", thread_id.to_string()),
        )?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.user_id)
            .map(UserId::from_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::sqlite::DataLayerOptions;
    use serde_json::json;

    fn layer() -> SqliteDataLayer {
        SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap()
    }

    #[test]
    fn test_create_then_merge_metadata() {
        let layer = layer();
        let created = layer
            .upsert_user(&User::new("alice").with_metadata("role", "admin"))
            .unwrap()
            .unwrap();
        assert_eq!(created.metadata["role"], json!("admin"));
        assert!(created.created_at.ends_with('Z'));

        let updated = layer
            .upsert_user(&User::new("alice").with_metadata("theme", "dark"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.metadata["role"], json!("admin"));
        assert_eq!(updated.metadata["theme"], json!("dark"));
    }

    #[test]
    fn test_unknown_user_id() {
        let err = layer().user_identifier_by_id(&UserId::from("nope")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DataLayerError>(),
            Some(&DataLayerError::UnknownUser("nope".into()))
        );
    }

    #[test]
    fn test_missing_thread_has_no_owner() {
        assert!(layer().user_id_by_thread(&ThreadId::from("t")).unwrap().is_none());
    }
}
