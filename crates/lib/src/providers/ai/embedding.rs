//! # Catalog Embeddings
//!
//! Vector embeddings for catalog table documents and for the search queries run
//! against them. Gemini and OpenAI-compatible endpoints are supported; the kind of
//! endpoint is decided once from the configured URL.

use crate::{config::EmbeddingConfig, errors::AgentError};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a text is embedded for. Gemini tunes the vector for each side of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingPurpose {
    /// A table document stored in the catalog.
    Document,
    /// A discovery query compared against stored documents.
    Query,
}

impl EmbeddingPurpose {
    fn gemini_task_type(self) -> &'static str {
        match self {
            EmbeddingPurpose::Document => "RETRIEVAL_DOCUMENT",
            EmbeddingPurpose::Query => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmbeddingApi {
    Gemini,
    OpenAiCompatible,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    model: &'a str,
    content: GeminiContent<'a>,
    task_type: &'static str,
}

#[derive(Serialize, Debug)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize, Debug)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    embedding: GeminiValues,
}

#[derive(Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

#[derive(Serialize, Debug)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

/// An embeddings client bound to one configured model.
#[derive(Clone, Debug)]
pub struct Embedder {
    client: ReqwestClient,
    config: EmbeddingConfig,
    api: EmbeddingApi,
    /// The model as the endpoint expects it; Gemini wants a `models/` prefix.
    request_model: String,
}

impl Embedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        let api = if config.api_url.contains("generativelanguage.googleapis.com") {
            EmbeddingApi::Gemini
        } else {
            EmbeddingApi::OpenAiCompatible
        };
        let request_model = match api {
            EmbeddingApi::Gemini if !config.model_name.starts_with("models/") => {
                format!("models/{}", config.model_name)
            }
            _ => config.model_name.clone(),
        };
        Self {
            client: ReqwestClient::new(),
            config,
            api,
            request_model,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Embeds `text`. An empty vector from the endpoint is an error, since it could
    /// never be compared against stored documents.
    pub async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, AgentError> {
        let mut request = self.client.post(&self.config.api_url);
        request = match self.api {
            EmbeddingApi::Gemini => {
                let body = GeminiRequest {
                    model: &self.request_model,
                    content: GeminiContent {
                        parts: [GeminiPart { text }],
                    },
                    task_type: purpose.gemini_task_type(),
                };
                debug!(payload = ?body, "--> Sending request to Gemini Embeddings API");
                let request = request.json(&body);
                match &self.config.api_key {
                    Some(key) => request.header("x-goog-api-key", key.as_str()),
                    None => request,
                }
            }
            EmbeddingApi::OpenAiCompatible => {
                let body = OpenAiRequest {
                    model: &self.request_model,
                    input: text,
                };
                debug!(payload = ?body, "--> Sending request to embeddings API");
                let request = request.json(&body);
                match &self.config.api_key {
                    Some(key) => request.bearer_auth(key),
                    None => request,
                }
            }
        };

        let response = request.send().await.map_err(AgentError::AiRequest)?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::AiApi(error_text));
        }

        let vector = match self.api {
            EmbeddingApi::Gemini => {
                response
                    .json::<GeminiResponse>()
                    .await
                    .map_err(AgentError::AiDeserialization)?
                    .embedding
                    .values
            }
            EmbeddingApi::OpenAiCompatible => response
                .json::<OpenAiResponse>()
                .await
                .map_err(AgentError::AiDeserialization)?
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .unwrap_or_default(),
        };
        if vector.is_empty() {
            return Err(AgentError::AiApi(format!(
                "embedding model '{}' returned an empty vector",
                self.config.model_name
            )));
        }
        Ok(vector)
    }
}

/// Formats a vector as the `[a, b, ..]` text turso's `vector32()` accepts.
pub fn vector_literal(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(f32::to_string).collect();
    format!("[{}]", values.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str, model_name: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            api_url: api_url.to_string(),
            model_name: model_name.to_string(),
            api_key: None,
        }
    }

    #[test]
    fn gemini_models_get_the_models_prefix_once() {
        let url = "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";
        assert_eq!(Embedder::new(config(url, "text-embedding-004")).request_model, "models/text-embedding-004");
        assert_eq!(Embedder::new(config(url, "models/x")).request_model, "models/x");
        assert_eq!(Embedder::new(config("http://localhost/v1/embeddings", "embed")).request_model, "embed");
    }

    #[test]
    fn vector_literal_is_bracketed() {
        assert_eq!(vector_literal(&[1.0, 0.5]), "[1, 0.5]");
    }
}
