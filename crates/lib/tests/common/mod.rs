#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Mocks for the AI provider and the tool port, plus catalog fixtures, so every
//! controller state can be exercised without a live backend.

use async_trait::async_trait;
use dotenvy::dotenv;
use memento::{
    errors::AgentError,
    providers::ai::AiProvider,
    tools::{CheckReport, ResultSet, RunLimits, TableDescriptor, ToolPort},
    types::{ColumnDocument, TableDocument, ToolName},
    AgentConfig, AgentTasks, Controller,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, Once, RwLock};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

// --- Mock AI Provider ---

/// Replays queued responses in order and records every prompt pair.
#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub call_history: Arc<RwLock<Vec<(String, String)>>>,
    pub responses: Arc<RwLock<Vec<String>>>,
}

impl MockAiProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            call_history: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(responses.into_iter().rev().collect())),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.call_history.read().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        self.call_history
            .write()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        match self.responses.write().unwrap().pop() {
            Some(response) => Ok(response),
            None => Err(AgentError::AiApi("no mock response queued".to_string())),
        }
    }
}

/// A classifier reply routing to the full pipeline.
pub fn full_pipeline(search_query: &str, question: &str) -> String {
    serde_json::json!({
        "intent": "full_pipeline",
        "search_query": search_query,
        "question": question,
        "answer": ""
    })
    .to_string()
}

pub fn discovery_only(search_query: &str) -> String {
    serde_json::json!({ "intent": "discovery_only", "search_query": search_query }).to_string()
}

/// A synthesizer reply with a one-line rationale and a fenced query.
pub fn sql_reply(sql: &str) -> String {
    format!("Aggregate the relevant measure.\n```sql\n{sql}\n```")
}

// --- Scripted Tool Port ---

/// A tool port with canned answers that records every call it receives.
#[derive(Clone, Debug)]
pub struct ScriptedTools {
    pub tables: Vec<TableDescriptor>,
    /// Queries containing any of these fragments fail `sql_checker`.
    pub reject_fragments: Vec<String>,
    pub reject_everything: bool,
    pub result: ResultSet,
    pub run_error: Option<String>,
    pub run_delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<(ToolName, String)>>>,
}

impl ScriptedTools {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self {
            tables,
            reject_fragments: Vec::new(),
            reject_everything: false,
            result: ResultSet {
                columns: vec![],
                rows: vec![],
                truncated: false,
            },
            run_error: None,
            run_delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_result(mut self, columns: &[&str], rows: Vec<Vec<Value>>, truncated: bool) -> Self {
        self.result = ResultSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            truncated,
        };
        self
    }

    pub fn rejecting_everything(mut self) -> Self {
        self.reject_everything = true;
        self
    }

    pub fn with_run_error(mut self, message: &str) -> Self {
        self.run_error = Some(message.to_string());
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    pub fn calls_to(&self, tool: ToolName) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == tool)
            .count()
    }

    fn record(&self, tool: ToolName, input: &str) {
        self.calls.lock().unwrap().push((tool, input.to_string()));
    }
}

#[async_trait]
impl ToolPort for ScriptedTools {
    async fn table_searcher(&self, query: &str) -> Result<Vec<TableDescriptor>, AgentError> {
        self.record(ToolName::TableSearcher, query);
        Ok(self.tables.clone())
    }

    async fn sql_checker(&self, query: &str) -> Result<CheckReport, AgentError> {
        self.record(ToolName::SqlChecker, query);
        if self.reject_everything {
            return Ok(CheckReport::failed("the backend refused to compile the query"));
        }
        match self.reject_fragments.iter().find(|f| query.contains(f.as_str())) {
            Some(fragment) => Ok(CheckReport::failed(format!("no such column: {fragment}"))),
            None => Ok(CheckReport::passed()),
        }
    }

    async fn sql_runner(&self, query: &str, _limits: RunLimits) -> Result<ResultSet, AgentError> {
        self.record(ToolName::SqlRunner, query);
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.run_error {
            Some(message) => Err(AgentError::StorageOperationFailed(message.clone())),
            None => Ok(self.result.clone()),
        }
    }
}

// --- Catalog fixtures ---

pub fn column(name: &str, col_type: &str, samples: &[&str]) -> ColumnDocument {
    ColumnDocument {
        col_name: name.to_string(),
        col_type: col_type.to_string(),
        column_display_name: String::new(),
        col_description: String::new(),
        business_attribute: vec![],
        sample_values: samples.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn orders_table() -> TableDocument {
    TableDocument {
        table_name: "orders".to_string(),
        table_display_name: "Orders".to_string(),
        table_desc: "One row per customer order, with its revenue.".to_string(),
        table_domain: "sales".to_string(),
        is_dimension: false,
        columns: vec![
            column("order_id", "INTEGER", &["1", "2"]),
            column("customer_id", "INTEGER", &["7", "3"]),
            column("customer_name", "TEXT", &["Acme", "Globex"]),
            column("revenue", "REAL", &["120.5", "980.25"]),
        ],
        hierarchy: vec![],
    }
}

pub fn customers_table() -> TableDocument {
    TableDocument {
        table_name: "customers".to_string(),
        table_display_name: "Customers".to_string(),
        table_desc: "Customer master data.".to_string(),
        table_domain: "sales".to_string(),
        is_dimension: true,
        columns: vec![
            column("customer_id", "INTEGER", &["7", "3"]),
            column("customer_name", "TEXT", &["Acme", "Globex"]),
            column("segment", "TEXT", &["enterprise", "smb"]),
        ],
        hierarchy: vec![],
    }
}

pub fn hit(table: TableDocument, score: f64) -> TableDescriptor {
    TableDescriptor { table, score }
}

pub fn controller(tools: &ScriptedTools, ai: &MockAiProvider, config: AgentConfig) -> Controller {
    Controller::new(
        Box::new(tools.clone()),
        AgentTasks::with_provider(Box::new(ai.clone())),
        config,
    )
}

/// A cancellation receiver whose sender has gone away; it never fires.
pub fn never_cancelled() -> tokio::sync::watch::Receiver<bool> {
    tokio::sync::watch::channel(false).1
}
