//! # General Route Handlers
//!
//! The service banner, health check, tool listing and state-graph export.

use super::AppState;
use crate::types::{ServiceInfo, ToolInfo};
use axum::{extract::State, Json};
use memento::{state_graph, types::ToolName};

/// The handler for the root (`/`) endpoint.
pub async fn root(State(app_state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "memento server is running.".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools: ToolName::ALL.iter().map(|t| t.as_str().to_string()).collect(),
        model: app_state.synthesis_model().map(String::from),
    })
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Lists the tools the agent can call.
pub async fn tools_handler() -> Json<Vec<ToolInfo>> {
    Json(
        ToolName::ALL
            .iter()
            .map(|tool| ToolInfo {
                name: tool.as_str().to_string(),
                description: tool.description().to_string(),
                arguments: vec!["query".to_string()],
            })
            .collect(),
    )
}

/// The controller's state machine as a Mermaid diagram.
pub async fn graph_handler() -> String {
    state_graph::to_mermaid()
}
