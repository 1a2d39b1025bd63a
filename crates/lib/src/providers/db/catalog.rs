//! # Metadata Catalog
//!
//! The searchable catalog of table documents behind `table_searcher`. Search
//! combines keyword scoring over each table's search text with cosine similarity
//! over stored embeddings, fused by Reciprocal Rank Fusion. Without an embedding
//! model the catalog is keyword-only.

use super::sql;
use crate::{
    config::EmbeddingConfig,
    errors::AgentError,
    providers::ai::{embedding::vector_literal, Embedder, EmbeddingPurpose},
    rerank::reciprocal_rank_fusion,
    tools::TableDescriptor,
    types::TableDocument,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use tracing::{debug, info, warn};
use turso::{Connection, Database, Value as TursoValue};

/// Words that carry no table-selection signal.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "by", "for", "from", "how", "in", "is", "me", "many", "much", "of",
    "on", "or", "show", "tell", "the", "to", "what", "which", "who", "with", "per", "each", "all",
    "list", "give", "get", "find", "do", "does", "we", "have", "there", "about",
];

/// The outcome of a catalog ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub tables_processed: usize,
    pub documents_embedded: usize,
}

#[derive(Clone)]
pub struct CatalogStore {
    db: Database,
    embedder: Option<Embedder>,
}

impl CatalogStore {
    pub fn new(db: Database, embedding: Option<EmbeddingConfig>) -> Self {
        Self {
            db,
            embedder: embedding.map(Embedder::new),
        }
    }

    fn connect(&self) -> Result<Connection, AgentError> {
        self.db
            .connect()
            .map_err(|e| AgentError::StorageConnection(e.to_string()))
    }

    /// Creates the catalog table if it does not exist. Idempotent.
    pub async fn initialize_schema(&self) -> Result<(), AgentError> {
        let conn = self.connect()?;
        conn.execute(&sql::create_catalog_table(), ()).await?;
        Ok(())
    }

    /// Inserts or replaces table documents, embedding each one when a model is configured.
    ///
    /// Re-ingesting a table replaces its entry.
    pub async fn ingest(&self, documents: &[TableDocument]) -> Result<IngestReport, AgentError> {
        let conn = self.connect()?;
        let upsert = sql::upsert_catalog_entry();
        let now = chrono::Utc::now().to_rfc3339();
        let mut documents_embedded = 0;

        for document in documents {
            if document.table_name.trim().is_empty() {
                return Err(AgentError::Catalog(
                    "table_name must not be empty".to_string(),
                ));
            }
            let search_text = document.search_text();
            let embedding = match &self.embedder {
                Some(embedder) => {
                    let vector = embedder
                        .embed(&search_text, EmbeddingPurpose::Document)
                        .await?;
                    documents_embedded += 1;
                    TursoValue::Text(vector_literal(&vector))
                }
                None => TursoValue::Null,
            };

            let params: Vec<TursoValue> = vec![
                TursoValue::Text(document.table_name.clone()),
                TursoValue::Text(document.table_display_name.clone()),
                TursoValue::Text(document.table_desc.clone()),
                TursoValue::Text(document.table_domain.clone()),
                TursoValue::Integer(i64::from(document.is_dimension)),
                TursoValue::Text(search_text),
                TursoValue::Text(serde_json::to_string(document)?),
                embedding,
                TursoValue::Text(now.clone()),
            ];
            conn.execute(&upsert, params).await?;
            debug!(table = %document.table_name, "Catalog entry written");
        }

        info!(
            documents_embedded,
            "Ingested {} table documents into the catalog.",
            documents.len()
        );
        Ok(IngestReport {
            tables_processed: documents.len(),
            documents_embedded,
        })
    }

    /// Removes a table from the catalog. Returns whether an entry existed.
    pub async fn remove(&self, table_name: &str) -> Result<bool, AgentError> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                &sql::delete_catalog_entry(),
                vec![TursoValue::Text(table_name.to_string())],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Returns every catalog document, ordered by table name.
    pub async fn list(&self) -> Result<Vec<TableDocument>, AgentError> {
        Ok(self
            .load_entries()
            .await?
            .into_iter()
            .map(|(document, _)| document)
            .collect())
    }

    /// Searches the catalog for tables relevant to `query`, returning at most `limit` hits.
    ///
    /// A query with no meaningful terms matches nothing. Failing to embed
    /// the query degrades to keyword-only search.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TableDescriptor>, AgentError> {
        let entries = self.load_entries().await?;
        let terms = search_terms(query);

        if terms.is_empty() {
            info!("Catalog search for '{query}' has no usable terms; no tables match.");
            return Ok(Vec::new());
        }

        let mut keyword_results: Vec<TableDescriptor> = entries
            .into_iter()
            .filter_map(|(table, search_text)| {
                let score = keyword_score(&terms, &table, &search_text);
                (score > 0.0).then_some(TableDescriptor { table, score })
            })
            .collect();
        keyword_results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.table.table_name.cmp(&b.table.table_name))
        });
        keyword_results.truncate(limit);

        let vector_results = match &self.embedder {
            Some(embedder) => match self.vector_search(embedder, query, limit).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(error = %e, "Vector search failed; using keyword results only.");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        info!(
            keyword_hits = keyword_results.len(),
            vector_hits = vector_results.len(),
            "Catalog search for '{query}'"
        );

        let mut results = if vector_results.is_empty() {
            keyword_results
        } else {
            reciprocal_rank_fusion(vector_results, keyword_results)
        };
        results.truncate(limit);
        Ok(results)
    }

    async fn vector_search(
        &self,
        embedder: &Embedder,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TableDescriptor>, AgentError> {
        let query_vector = embedder.embed(query, EmbeddingPurpose::Query).await?;

        let conn = self.connect()?;
        let mut rows = conn
            .query(&sql::vector_search_catalog(&query_vector, limit), ())
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let document = match row.get_value(0)? {
                TursoValue::Text(s) => s,
                _ => continue,
            };
            let distance = match row.get_value(1)? {
                TursoValue::Real(f) => f,
                _ => 1.0,
            };
            results.push(TableDescriptor {
                table: parse_document(&document)?,
                score: 1.0 - distance,
            });
        }
        Ok(results)
    }

    async fn load_entries(&self) -> Result<Vec<(TableDocument, String)>, AgentError> {
        let conn = self.connect()?;
        let mut rows = conn.query(&sql::select_catalog_documents(), ()).await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let search_text = match row.get_value(1)? {
                TursoValue::Text(s) => s,
                _ => String::new(),
            };
            let document = match row.get_value(2)? {
                TursoValue::Text(s) => s,
                _ => continue,
            };
            entries.push((parse_document(&document)?, search_text));
        }
        Ok(entries)
    }
}

impl Debug for CatalogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogStore")
            .field("embedding", &self.embedder.as_ref().map(Embedder::model_name))
            .finish_non_exhaustive()
    }
}

fn parse_document(json: &str) -> Result<TableDocument, AgentError> {
    serde_json::from_str(json)
        .map_err(|e| AgentError::Catalog(format!("Malformed catalog document: {e}")))
}

/// Splits a query into lower-cased terms, dropping stopwords and single characters.
pub(crate) fn search_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(&t.as_str()))
        .collect();
    terms.dedup();
    terms
}

/// The fraction of query terms found in the table's search text, with a bonus
/// for terms that hit the table name itself.
fn keyword_score(terms: &[String], table: &TableDocument, search_text: &str) -> f64 {
    let haystack = search_text.to_lowercase();
    let name = table.table_name.to_lowercase();
    let mut hits = 0.0;
    for term in terms {
        let stem = term.trim_end_matches('s');
        let needle = if stem.chars().count() > 2 { stem } else { term };
        if name.contains(needle) {
            hits += 1.5;
        } else if haystack.contains(needle) {
            hits += 1.0;
        }
    }
    hits / (terms.len() as f64 * 1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_drop_stopwords() {
        assert_eq!(
            search_terms("What are the top customers by revenue?"),
            vec!["top", "customers", "revenue"]
        );
        assert!(search_terms("what is the").is_empty());
    }

    #[test]
    fn search_terms_keep_non_latin_words() {
        assert_eq!(search_terms("הזמנות לקוחות"), vec!["הזמנות", "לקוחות"]);
    }
}
