use std::time::Duration;
use thiserror::Error;

/// Infrastructure errors raised by the orchestration core and its providers.
///
/// Failures that belong to a turn's own taxonomy (an ambiguous request, a query
/// that never validates, an executor failure) are not represented here. They are
/// recorded on the finalized turn as a [`crate::types::FailureKind`].
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Request to AI provider failed: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("AI provider is not configured: {0}")]
    MissingAiProvider(String),
    #[error("Storage connection error: {0}")]
    StorageConnection(String),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),
    #[error("Catalog error: {0}")]
    Catalog(String),
    #[error("Query execution timed out after {0:?}")]
    ExecutionTimeout(Duration),
    #[error("Query execution was cancelled")]
    Cancelled,
    #[error("Only a single read-only SELECT query is allowed: {0}")]
    NotReadOnly(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl From<turso::Error> for AgentError {
    fn from(err: turso::Error) -> Self {
        AgentError::StorageOperationFailed(err.to_string())
    }
}
