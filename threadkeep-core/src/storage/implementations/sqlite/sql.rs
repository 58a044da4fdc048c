//! SQL execution helpers
//!
//! Every statement runs in its own transaction through
//! [`SqliteDataLayer::execute_sql`]. Statements that produce columns come back
//! as JSON objects keyed by column name, which the per-table modules decode
//! with serde.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::{ToSql, Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use super::SqliteDataLayer;

/// A result row keyed by column name (or alias)
pub(crate) type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlOutcome {
    Rows(Vec<Row>),
    Affected(usize),
}

impl SqlOutcome {
    /// What a failed statement yields: no rows for a query, zero rows changed
    /// otherwise
    fn empty_for(query: &str) -> Self {
        let head = query.trim_start().to_ascii_uppercase();
        if head.starts_with("SELECT") || head.starts_with("WITH") {
            SqlOutcome::Rows(Vec::new())
        } else {
            SqlOutcome::Affected(0)
        }
    }

    pub(crate) fn into_rows(self) -> Vec<Row> {
        match self {
            SqlOutcome::Rows(rows) => rows,
            SqlOutcome::Affected(_) => Vec::new(),
        }
    }
}

/// Named parameters, in insertion order. Names are column names; the
/// placeholder is the name prefixed with `:`.
#[derive(Debug, Clone, Default)]
pub(crate) struct SqlParams {
    entries: Vec<(String, String, SqlValue)>,
}

impl SqlParams {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Set only when the value is present
    pub(crate) fn set_opt<V: Into<SqlValue>>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.push(name, value);
        }
        self
    }

    pub(crate) fn push(&mut self, name: &str, value: impl Into<SqlValue>) {
        self.entries
            .push((name.to_string(), format!(":{}", name), value.into()));
    }

    pub(crate) fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _, _)| name.as_str())
    }

    fn bindings(&self) -> Vec<(&str, &dyn ToSql)> {
        self.entries
            .iter()
            .map(|(_, placeholder, value)| (placeholder.as_str(), value as &dyn ToSql))
            .collect()
    }
}

/// How an upsert updates an existing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConflictUpdate {
    /// `"col" = EXCLUDED."col"`
    Excluded,
    /// `"col" = :col`
    Params,
}

/// `INSERT .. ON CONFLICT ("id") DO UPDATE` over exactly the given columns
pub(crate) fn upsert_sql(table: &str, params: &SqlParams, style: ConflictUpdate) -> String {
    let columns = params
        .columns()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    let values = params
        .columns()
        .map(|c| format!(":{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = params
        .columns()
        .filter(|c| *c != "id")
        .map(|c| match style {
            ConflictUpdate::Excluded => format!("\"{c}\" = EXCLUDED.\"{c}\""),
            ConflictUpdate::Params => format!("\"{c}\" = :{c}"),
        })
        .collect::<Vec<_>>();

    if updates.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (\"id\") DO NOTHING",
            table, columns, values
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (\"id\") DO UPDATE SET {}",
            table,
            columns,
            values,
            updates.join(", ")
        )
    }
}

/// JSON text for a column holding structured data
pub(crate) fn json_text(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize JSON column")
}

/// Decode rows into typed records
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).context("Failed to decode row"))
        .collect()
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

fn run_in_transaction(conn: &mut Connection, query: &str, params: &SqlParams) -> rusqlite::Result<SqlOutcome> {
    let tx = conn.transaction()?;
    let outcome = {
        let mut stmt = tx.prepare(query)?;
        let bindings = params.bindings();
        if stmt.column_count() > 0 {
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query(bindings.as_slice())?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut map = Row::new();
                for (i, name) in names.iter().enumerate() {
                    map.insert(name.clone(), value_to_json(row.get_ref(i)?));
                }
                out.push(map);
            }
            SqlOutcome::Rows(out)
        } else {
            SqlOutcome::Affected(stmt.execute(bindings.as_slice())?)
        }
    };
    tx.commit()?;
    Ok(outcome)
}

impl SqliteDataLayer {
    /// Run one statement in its own transaction.
    ///
    /// A failed statement rolls the transaction back (the uncommitted
    /// transaction is dropped), is logged, and yields an empty outcome.
    pub(crate) fn execute_sql(&self, query: &str, params: &SqlParams) -> Result<SqlOutcome> {
        let mut conn = self
            .conn()
            .lock()
            .map_err(|_| anyhow::anyhow!("SQLite connection lock poisoned"))?;
        match run_in_transaction(&mut conn, query, params) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!("An error occurred: {} ({})", e, query.trim());
                Ok(SqlOutcome::empty_for(query))
            }
        }
    }

    /// Run a query and decode every row
    pub(crate) fn fetch<T: DeserializeOwned>(&self, query: &str, params: &SqlParams) -> Result<Vec<T>> {
        decode_rows(self.execute_sql(query, params)?.into_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::sqlite::DataLayerOptions;

    #[test]
    fn test_upsert_sql_excluded() {
        let params = SqlParams::new().set("id", "t1".to_string()).set("name", "n".to_string());
        let sql = upsert_sql("threads", &params, ConflictUpdate::Excluded);
        assert_eq!(
            sql,
            "INSERT INTO threads (\"id\", \"name\") VALUES (:id, :name) ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""
        );
    }

    #[test]
    fn test_upsert_sql_id_only_does_nothing_on_conflict() {
        let params = SqlParams::new().set("id", "t1".to_string());
        let sql = upsert_sql("threads", &params, ConflictUpdate::Params);
        assert!(sql.ends_with("DO NOTHING"));
    }

    #[test]
    fn test_set_opt_skips_none() {
        let params = SqlParams::new()
            .set("id", "x".to_string())
            .set_opt::<String>("name", None)
            .set_opt("page", Some(3i64));
        assert_eq!(params.columns().collect::<Vec<_>>(), vec!["id", "page"]);
    }

    #[test]
    fn test_execute_sql_rows_and_counts() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        let inserted = layer
            .execute_sql(
                "INSERT INTO users (\"id\", \"identifier\", \"createdAt\", \"metadata\") VALUES (:id, :identifier, :createdAt, :metadata)",
                &SqlParams::new()
                    .set("id", "u1".to_string())
                    .set("identifier", "alice".to_string())
                    .set("createdAt", "2024-01-01T00:00:00Z".to_string())
                    .set("metadata", "{}".to_string()),
            )
            .unwrap();
        assert_eq!(inserted, SqlOutcome::Affected(1));

        let rows = layer
            .execute_sql(
                "SELECT \"identifier\" FROM users WHERE \"id\" = :id",
                &SqlParams::new().set("id", "u1".to_string()),
            )
            .unwrap()
            .into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["identifier"], "alice");
    }

    #[test]
    fn test_execute_sql_failures_yield_empty_outcome() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        let read = layer
            .execute_sql("SELECT * FROM missing_table", &SqlParams::new())
            .unwrap();
        assert_eq!(read, SqlOutcome::Rows(Vec::new()));

        let write = layer
            .execute_sql("DELETE FROM missing_table", &SqlParams::new())
            .unwrap();
        assert_eq!(write, SqlOutcome::Affected(0));
    }

    #[test]
    fn test_failed_insert_is_rolled_back() {
        let layer = SqliteDataLayer::in_memory(DataLayerOptions::default()).unwrap();
        let insert = "INSERT INTO users (\"id\", \"identifier\", \"createdAt\", \"metadata\") VALUES (:id, :identifier, :createdAt, '{}')";
        let params = |id: &str| {
            SqlParams::new()
                .set("id", id.to_string())
                .set("identifier", "same".to_string())
                .set("createdAt", "2024-01-01T00:00:00Z".to_string())
        };
        assert_eq!(layer.execute_sql(insert, &params("u1")).unwrap(), SqlOutcome::Affected(1));
        assert_eq!(layer.execute_sql(insert, &params("u2")).unwrap(), SqlOutcome::Affected(0));

        let rows = layer
            .execute_sql("SELECT COUNT(*) AS n FROM users", &SqlParams::new())
            .unwrap()
            .into_rows();
        assert_eq!(rows[0]["n"], Value::from(1));
    }

    #[test]
    fn test_blob_columns_become_base64() {
        assert_eq!(value_to_json(ValueRef::Blob(b"hi")), Value::String("aGk=".into()));
        assert_eq!(value_to_json(ValueRef::Integer(7)), Value::from(7));
    }
}
