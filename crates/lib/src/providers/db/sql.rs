//! # Catalog SQL
//!
//! SQL strings for the metadata catalog, kept apart from the store logic.

use crate::{constants::CATALOG_TABLE, providers::ai::embedding::vector_literal};

/// Creates the catalog table. `embedding` holds a `vector32` blob and may be NULL
/// when no embedding model is configured.
pub fn create_catalog_table() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {CATALOG_TABLE} (
            table_name TEXT PRIMARY KEY,
            display_name TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            domain TEXT NOT NULL DEFAULT '',
            is_dimension INTEGER NOT NULL DEFAULT 0,
            search_text TEXT NOT NULL,
            document TEXT NOT NULL,
            embedding BLOB,
            updated_at TEXT NOT NULL
        );"
    )
}

/// Inserts or replaces one catalog entry. Parameter 8 is the embedding as a
/// `[f32, ...]` literal, or NULL.
pub fn upsert_catalog_entry() -> String {
    format!(
        "INSERT OR REPLACE INTO {CATALOG_TABLE}
            (table_name, display_name, description, domain, is_dimension, search_text, document, embedding, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, CASE WHEN ?8 IS NULL THEN NULL ELSE vector32(?8) END, ?9);"
    )
}

/// Selects every catalog document with its search text, ordered by table name.
pub fn select_catalog_documents() -> String {
    format!("SELECT table_name, search_text, document FROM {CATALOG_TABLE} ORDER BY table_name;")
}

/// Selects the closest catalog documents to a query vector.
///
/// turso's vector functions take the vector as a literal inside the statement.
pub fn vector_search_catalog(query_vector: &[f32], limit: usize) -> String {
    let vector = vector_literal(query_vector);
    format!(
        "SELECT document, vector_distance_cos(embedding, vector32('{vector}')) AS distance
         FROM {CATALOG_TABLE}
         WHERE embedding IS NOT NULL
         ORDER BY distance ASC
         LIMIT {limit};"
    )
}

pub fn delete_catalog_entry() -> String {
    format!("DELETE FROM {CATALOG_TABLE} WHERE table_name = ?1;")
}
