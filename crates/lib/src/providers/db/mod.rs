//! # Storage Providers
//!
//! Both stores live in one turso (SQLite) database: the lake holds the business
//! tables the agent queries, and the catalog holds the table metadata it searches.

pub mod catalog;
pub mod lake;
pub mod sql;

use crate::errors::AgentError;
use turso::{Database, Value as TursoValue};

/// Opens a turso database from a file path, or `:memory:` for an isolated in-memory one.
///
/// To share an in-memory database between the catalog and the lake, open it once
/// and hand clones of the returned `Database` to both stores.
pub async fn open_database(db_path: &str) -> Result<Database, AgentError> {
    let db = turso::Builder::new_local(db_path)
        .build()
        .await
        .map_err(|e| AgentError::StorageConnection(e.to_string()))?;

    // `query` rather than `execute`, as the PRAGMA returns a row.
    let conn = db
        .connect()
        .map_err(|e| AgentError::StorageConnection(e.to_string()))?;
    conn.query("PRAGMA journal_mode=WAL;", ())
        .await
        .map_err(|e| AgentError::StorageConnection(e.to_string()))?;

    Ok(db)
}

/// Converts a turso value to a `serde_json::Value`.
pub(crate) fn turso_value_to_json(v: TursoValue) -> serde_json::Value {
    use serde_json::Value;
    match v {
        TursoValue::Null => Value::Null,
        TursoValue::Integer(i) => Value::Number(i.into()),
        TursoValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TursoValue::Text(s) => Value::String(s),
        TursoValue::Blob(_) => Value::String("<blob>".to_string()),
    }
}

/// Quotes an identifier for interpolation into SQLite statements.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
