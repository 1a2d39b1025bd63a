//! # General Endpoint Tests
//!
//! Banner, health, tool listing, state-graph export and thread reset.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn test_root_and_health() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;

    let health = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await?;
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await?, "OK");

    let root: Value = app
        .client
        .get(format!("{}/", app.address))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(root["service"], "memento server is running.");
    assert_eq!(root["model"], "mock-chat-model");
    assert_eq!(
        root["tools"],
        json!(["table_searcher", "sql_checker", "sql_runner"])
    );
    Ok(())
}

#[tokio::test]
async fn test_tools_listing() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;

    let tools: Vec<Value> = app
        .client
        .get(format!("{}/tools", app.address))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(tools.len(), 3);
    for tool in &tools {
        assert!(!tool["description"].as_str().unwrap().is_empty());
        assert_eq!(tool["arguments"], json!(["query"]));
    }
    assert_eq!(tools[2]["name"], "sql_runner");
    Ok(())
}

#[tokio::test]
async fn test_graph_is_mermaid() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;

    let graph = app
        .client
        .get(format!("{}/graph", app.address))
        .send()
        .await?
        .text()
        .await?;

    assert!(graph.starts_with("stateDiagram-v2"));
    assert!(graph.contains("[*] --> CLASSIFY"));
    assert!(graph.contains("VALIDATE --> REPAIR"));
    assert!(graph.contains("REPAIR --> SYNTHESIZE"));
    Ok(())
}

#[tokio::test]
async fn test_reset_of_unknown_thread() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;

    let body: Value = app
        .client
        .post(format!("{}/reset", app.address))
        .json(&json!({"thread_id": "never-seen"}))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["thread_id"], "never-seen");
    assert_eq!(body["reset"], false);
    assert!(app.app_state.sessions.is_empty().await);
    Ok(())
}
