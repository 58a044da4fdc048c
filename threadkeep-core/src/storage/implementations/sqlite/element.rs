//! SQLite statements for the `elements` table and payload upload

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sql::{json_text, upsert_sql, ConflictUpdate, SqlParams};
use super::SqliteDataLayer;
use crate::error::DataLayerError;
use crate::storage::helper::{json_column, json_object_column, DEFAULT_MIME};
use crate::storage::ids::{ElementId, StepId, ThreadId};
use crate::storage::types::{Element, ElementDict};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS elements (
            "id" TEXT PRIMARY KEY,
            "threadId" TEXT,
            "type" TEXT NOT NULL,
            "chainlitKey" TEXT,
            "url" TEXT,
            "objectKey" TEXT,
            "name" TEXT NOT NULL,
            "display" TEXT,
            "size" TEXT,
            "language" TEXT,
            "page" INTEGER,
            "props" TEXT,
            "autoPlay" INTEGER,
            "playerConfig" TEXT,
            "forId" TEXT,
            "mime" TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_elements_thread ON elements("threadId");
        "#,
    )
    .context("Failed to initialize element schema")?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ElementRow {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(rename = "type")]
    element_type: String,
    #[serde(default)]
    chainlit_key: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    object_key: Option<String>,
    name: String,
    #[serde(default)]
    display: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    props: Value,
    #[serde(default)]
    auto_play: Option<i64>,
    #[serde(default)]
    player_config: Value,
    #[serde(default)]
    for_id: Option<String>,
    #[serde(default)]
    mime: Option<String>,
}

/// Parse a lowercase enum stored as text
fn enum_from_column<T: DeserializeOwned>(text: String) -> Result<T> {
    serde_json::from_value(Value::String(text.clone()))
        .with_context(|| format!("Unexpected column value: {}", text))
}

fn enum_to_column<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        Value::String(text) => Ok(text),
        other => Err(anyhow!("Expected a string enum, got {}", other)),
    }
}

impl ElementRow {
    pub(crate) fn into_element(self) -> Result<ElementDict> {
        Ok(ElementDict {
            id: ElementId::from_string(self.id),
            thread_id: self.thread_id.map(ThreadId::from_string),
            element_type: enum_from_column(self.element_type)?,
            chainlit_key: self.chainlit_key,
            url: self.url,
            object_key: self.object_key,
            name: self.name,
            display: self.display.map(enum_from_column).transpose()?.unwrap_or_default(),
            size: self.size.map(enum_from_column).transpose()?,
            language: self.language,
            page: self.page,
            props: json_object_column(self.props),
            auto_play: self.auto_play.map(|v| v != 0),
            player_config: match json_column(self.player_config) {
                Value::Null => None,
                other => Some(other),
            },
            for_id: self.for_id.map(StepId::from_string),
            mime: self.mime,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectKeyRow {
    object_key: Option<String>,
}

/// Object key of an element payload: `{userId}/{elementId}[/{name}]`
fn object_key_for(user_id: Option<&str>, element: &ElementDict) -> String {
    let mut key = format!("{}/{}", user_id.unwrap_or("unknown"), element.id);
    if !element.name.is_empty() {
        key.push('/');
        key.push_str(&element.name);
    }
    key
}

/// GET the url; anything but 200 yields no content
async fn fetch_url(url: &str) -> Result<Option<Vec<u8>>> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch element url {}", url))?;
    if response.status() != reqwest::StatusCode::OK {
        tracing::warn!("Element url {} returned {}", url, response.status());
        return Ok(None);
    }
    Ok(Some(response.bytes().await?.to_vec()))
}

/// Payload bytes, taken from the path, then the url, then the inline content.
/// A file may be empty; a url that does not answer 200 may not.
async fn load_payload(element: &Element) -> Result<Vec<u8>> {
    if let Some(path) = &element.path {
        return tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read element file {}", path.display()));
    }
    if let Some(url) = &element.dict.url {
        return fetch_url(url)
            .await?
            .ok_or_else(|| DataLayerError::EmptyElementContent(element.dict.name.clone()).into());
    }
    match element.content.as_ref().filter(|c| !c.is_empty()) {
        Some(content) => Ok(content.clone()),
        None => Err(DataLayerError::MissingElementContent.into()),
    }
}

impl SqliteDataLayer {
    pub(crate) fn select_element(
        &self,
        thread_id: &ThreadId,
        element_id: &ElementId,
    ) -> Result<Option<ElementDict>> {
        let rows: Vec<ElementRow> = self.fetch(
            r#"SELECT * FROM elements WHERE "id" = :element_id AND "threadId" = :thread_id"#,
            &SqlParams::new()
                .set("element_id", element_id.to_string())
                .set("thread_id", thread_id.to_string()),
        )?;
        rows.into_iter().next().map(ElementRow::into_element).transpose()
    }

    /// Upload the payload, then upsert the row with the stored url and key
    pub(crate) async fn upload_element(&self, element: &Element) -> Result<()> {
        let Some(storage) = self.storage() else {
            tracing::warn!("SQLite: create_element error. No storage client is configured!");
            return Ok(());
        };
        if element.dict.for_id.is_none() {
            return Ok(());
        }

        let content = load_payload(element).await?;

        let user_id = match &element.dict.thread_id {
            Some(thread_id) => self.user_id_by_thread(thread_id)?,
            None => None,
        };
        let object_key = object_key_for(user_id.as_ref().map(|id| id.as_str()), &element.dict);
        let mime = element.dict.mime.clone().unwrap_or_else(|| DEFAULT_MIME.to_string());

        let uploaded = storage
            .upload_file(&object_key, &content, &mime, true)
            .await
            .context("SQLite: create_element, failed to persist data in storage client")?;

        let dict = &element.dict;
        let player_config = dict.player_config.as_ref().map(json_text).transpose()?;
        let params = SqlParams::new()
            .set("id", dict.id.clone())
            .set_opt("threadId", dict.thread_id.as_ref().map(ThreadId::to_string))
            .set("type", enum_to_column(&dict.element_type)?)
            .set_opt("chainlitKey", dict.chainlit_key.clone())
            .set("url", uploaded.url)
            .set("objectKey", uploaded.object_key)
            .set("name", dict.name.clone())
            .set("display", enum_to_column(&dict.display)?)
            .set_opt("size", dict.size.as_ref().map(enum_to_column).transpose()?)
            .set_opt("language", dict.language.clone())
            .set_opt("page", dict.page)
            .set("props", json_text(&dict.props)?)
            .set_opt("autoPlay", dict.auto_play)
            .set_opt("playerConfig", player_config)
            .set_opt("forId", dict.for_id.as_ref().map(StepId::to_string))
            .set("mime", mime);

        self.execute_sql(&upsert_sql("elements", &params, ConflictUpdate::Params), &params)?;
        Ok(())
    }

    /// Delete the stored payload when one is recorded, then the row
    pub(crate) async fn remove_element(&self, element_id: &ElementId) -> Result<()> {
        let params = SqlParams::new().set("id", element_id.clone());
        let rows: Vec<ObjectKeyRow> =
            self.fetch(r#"SELECT "objectKey" FROM elements WHERE "id" = :id"#, &params)?;

        let object_key = rows.into_iter().next().and_then(|row| row.object_key);
        if let (Some(storage), Some(object_key)) = (self.storage(), object_key) {
            storage.delete_file(&object_key).await?;
        }

        self.execute_sql(r#"DELETE FROM elements WHERE "id" = :id"#, &params)?;
        Ok(())
    }
}
