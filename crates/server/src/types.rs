use memento::{providers::db::catalog::IngestReport, types::TableDocument};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omit to open a new thread; the response carries the id to continue it.
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResetRequest {
    pub thread_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResetResponse {
    pub thread_id: String,
    /// Whether the thread existed before the reset.
    pub reset: bool,
}

/// Catalog documents, either as a bare list or wrapped in `tables`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogIngestRequest {
    Wrapped { tables: Vec<TableDocument> },
    List(Vec<TableDocument>),
}

impl CatalogIngestRequest {
    pub fn into_documents(self) -> Vec<TableDocument> {
        match self {
            CatalogIngestRequest::Wrapped { tables } => tables,
            CatalogIngestRequest::List(tables) => tables,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CatalogIngestResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: IngestReport,
}

#[derive(Debug, Deserialize)]
pub struct CatalogSearchParams {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CatalogEntry {
    pub table_name: String,
    pub table_display_name: String,
    pub table_desc: String,
    pub columns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl CatalogEntry {
    pub fn from_document(document: &TableDocument, score: Option<f64>) -> Self {
        Self {
            table_name: document.table_name.clone(),
            table_display_name: document.table_display_name.clone(),
            table_desc: document.table_desc.clone(),
            columns: document.columns.len(),
            score,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
