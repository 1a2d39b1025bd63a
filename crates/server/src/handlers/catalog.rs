//! # Catalog Handlers
//!
//! Ingestion, listing, search and removal of table metadata documents.

use super::{AppError, AppState};
use crate::types::{
    CatalogEntry, CatalogIngestRequest, CatalogIngestResponse, CatalogSearchParams,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use memento::constants::DEFAULT_SEARCH_LIMIT;
use serde_json::{json, Value};
use tracing::info;

/// Upserts table documents into the metadata catalog.
pub async fn catalog_ingest_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<CatalogIngestRequest>,
) -> Result<Json<CatalogIngestResponse>, AppError> {
    let documents = payload.into_documents();
    if documents.is_empty() {
        return Err(AppError::BadRequest(
            "The catalog payload contains no tables.".to_string(),
        ));
    }
    info!("Received catalog ingest request for {} tables", documents.len());

    let report = app_state.catalog.ingest(&documents).await?;
    Ok(Json(CatalogIngestResponse {
        message: "Catalog ingestion successful".to_string(),
        report,
    }))
}

pub async fn catalog_list_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    let documents = app_state.catalog.list().await?;
    Ok(Json(
        documents
            .iter()
            .map(|d| CatalogEntry::from_document(d, None))
            .collect(),
    ))
}

/// Runs `table_searcher`'s catalog search directly, for inspecting discovery.
pub async fn catalog_search_handler(
    State(app_state): State<AppState>,
    Query(params): Query<CatalogSearchParams>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let hits = app_state.catalog.search(&params.q, limit).await?;
    Ok(Json(
        hits.iter()
            .map(|hit| CatalogEntry::from_document(&hit.table, Some(hit.score)))
            .collect(),
    ))
}

pub async fn catalog_remove_handler(
    State(app_state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let removed = app_state.catalog.remove(&table_name).await?;
    info!(table = %table_name, removed, "Catalog removal");
    Ok(Json(json!({ "table_name": table_name, "removed": removed })))
}
