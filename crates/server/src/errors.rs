use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use memento::AgentError;
use serde_json::json;
use tracing::{error, warn};

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors originating from `memento`.
    Agent(AgentError),
    /// Malformed or missing request input.
    BadRequest(String),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        AppError::Agent(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Agent(err) => {
                // Log the original error for debugging purposes
                error!("AgentError: {:?}", err);
                match err {
                    AgentError::MissingAiProvider(_)
                    | AgentError::Config(_)
                    | AgentError::ReqwestClientBuild(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Server is not configured correctly.".to_string(),
                    ),
                    AgentError::AiRequest(_)
                    | AgentError::AiDeserialization(_)
                    | AgentError::AiApi(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                    AgentError::StorageConnection(_) | AgentError::StorageOperationFailed(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                    }
                    AgentError::Catalog(_)
                    | AgentError::NotReadOnly(_)
                    | AgentError::JsonSerialization(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                    AgentError::ExecutionTimeout(_) => {
                        (StatusCode::GATEWAY_TIMEOUT, err.to_string())
                    }
                    AgentError::Cancelled => (
                        StatusCode::CONFLICT,
                        "The turn was cancelled because its thread was reset.".to_string(),
                    ),
                    AgentError::Regex(e) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Internal regex error: {e}"),
                    ),
                }
            }
            AppError::BadRequest(message) => {
                warn!("Bad request: {message}");
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
