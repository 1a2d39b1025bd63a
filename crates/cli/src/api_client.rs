//! # API Client
//!
//! This module provides a client for interacting with the `memento-server` API.
//! It handles request construction and response parsing.

use anyhow::{bail, Result};
use memento::{
    providers::db::catalog::IngestReport, types::TableDocument, TurnResponse,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Clone, Debug, Deserialize)]
struct ResetResponse {
    reset: bool,
}

/// The client for making API calls to the `memento-server`.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Sends one message on a thread and returns the structured turn.
    pub async fn chat(&self, message: &str, thread_id: &str) -> Result<TurnResponse> {
        let url = format!("{}/chat", self.base_url);
        info!(thread_id, "Sending chat message to: {}", url);

        let payload = json!({ "message": message, "thread_id": thread_id });
        let response = self.client.post(&url).json(&payload).send().await?;
        let response = ensure_success(response, "send message").await?;
        Ok(response.json().await?)
    }

    /// Resets a thread. Returns whether the server knew it.
    pub async fn reset(&self, thread_id: &str) -> Result<bool> {
        let url = format!("{}/reset", self.base_url);
        info!(thread_id, "Resetting thread");

        let payload = json!({ "thread_id": thread_id });
        let response = self.client.post(&url).json(&payload).send().await?;
        let response = ensure_success(response, "reset thread").await?;
        let body: ResetResponse = response.json().await?;
        Ok(body.reset)
    }

    /// Uploads table documents to the metadata catalog.
    pub async fn ingest_catalog(&self, documents: &[TableDocument]) -> Result<IngestReport> {
        let url = format!("{}/catalog/ingest", self.base_url);
        info!("Sending {} table documents to: {}", documents.len(), url);

        let response = self.client.post(&url).json(documents).send().await?;
        let response = ensure_success(response, "ingest catalog").await?;
        Ok(response.json().await?)
    }

    /// Fetches the controller's state machine as Mermaid text.
    pub async fn graph(&self) -> Result<String> {
        let url = format!("{}/graph", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response, "fetch graph").await?;
        Ok(response.text().await?)
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    // The server reports failures as `{"error": "..."}`.
    let message = serde_json::from_str::<serde_json::Value>(&error_text)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(error_text);
    bail!("Failed to {action}. Server responded with {status}: {message}")
}
