use anyhow::Result;
use async_trait::async_trait;
use memento::errors::AgentError;
use memento::providers::ai::AiProvider;
use memento::providers::db::{catalog::CatalogStore, lake::LakeStore, open_database};
use memento::tools::{CheckReport, LakeTools, ResultSet, RunLimits, TableDescriptor, ToolPort};
use memento::types::{ColumnDocument, TableDocument, ToolName};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Lake Fixture ---

/// A small sales lake: three customers and four orders.
///
/// Revenue per customer: Acme Corp 2000, Initech 990, Globex 450.
pub const SALES_LAKE_SQL: &str = "
CREATE TABLE customers (customer_id INTEGER PRIMARY KEY, customer_name TEXT, segment TEXT);
CREATE TABLE orders (order_id INTEGER PRIMARY KEY, customer_id INTEGER, order_date TEXT, revenue REAL);
INSERT INTO customers VALUES (1, 'Acme Corp', 'enterprise');
INSERT INTO customers VALUES (2, 'Globex', 'smb');
INSERT INTO customers VALUES (3, 'Initech', 'enterprise');
INSERT INTO orders VALUES (1, 1, '2024-01-05', 1200.0);
INSERT INTO orders VALUES (2, 1, '2024-02-10', 800.0);
INSERT INTO orders VALUES (3, 2, '2024-02-11', 450.0);
INSERT INTO orders VALUES (4, 3, '2024-03-01', 990.0);
";

fn column(name: &str, col_type: &str, display: &str, samples: &[&str]) -> ColumnDocument {
    ColumnDocument {
        col_name: name.to_string(),
        col_type: col_type.to_string(),
        column_display_name: display.to_string(),
        col_description: String::new(),
        business_attribute: vec![],
        sample_values: samples.iter().map(|s| s.to_string()).collect(),
    }
}

/// Catalog documents describing [`SALES_LAKE_SQL`].
pub fn sales_catalog() -> Vec<TableDocument> {
    vec![
        TableDocument {
            table_name: "orders".to_string(),
            table_display_name: "Orders".to_string(),
            table_desc: "One row per customer order, with its revenue.".to_string(),
            table_domain: "sales".to_string(),
            is_dimension: false,
            columns: vec![
                column("order_id", "INTEGER", "Order", &["1", "2"]),
                column("customer_id", "INTEGER", "Customer", &["1", "2"]),
                column("order_date", "TEXT", "Order date", &["2024-01-05"]),
                column("revenue", "REAL", "Revenue", &["1200.0", "450.0"]),
            ],
            hierarchy: vec![],
        },
        TableDocument {
            table_name: "customers".to_string(),
            table_display_name: "Customers".to_string(),
            table_desc: "Customer master data with segment.".to_string(),
            table_domain: "sales".to_string(),
            is_dimension: true,
            columns: vec![
                column("customer_id", "INTEGER", "Customer", &["1", "2"]),
                column("customer_name", "TEXT", "Customer name", &["Acme Corp", "Globex"]),
                column("segment", "TEXT", "Segment", &["enterprise", "smb"]),
            ],
            hierarchy: vec![],
        },
    ]
}

/// An isolated in-memory lake and catalog loaded with the sales fixture.
pub struct TestLake {
    pub lake: LakeStore,
    pub catalog: CatalogStore,
}

impl TestLake {
    pub async fn new() -> Result<Self> {
        let db = open_database(":memory:").await?;
        let lake = LakeStore::new(db.clone());
        let catalog = CatalogStore::new(db, None);
        catalog.initialize_schema().await?;
        seed_sales(&lake, &catalog).await?;
        Ok(Self { lake, catalog })
    }

    /// The production tool port over this fixture.
    pub fn tools(&self) -> LakeTools {
        LakeTools::new(self.catalog.clone(), self.lake.clone(), 10)
    }
}

/// Loads the sales tables into `lake` and their documents into `catalog`.
pub async fn seed_sales(lake: &LakeStore, catalog: &CatalogStore) -> Result<()> {
    lake.execute_batch(SALES_LAKE_SQL).await?;
    catalog.ingest(&sales_catalog()).await?;
    Ok(())
}

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    responses: Arc<Mutex<Vec<(String, String)>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pre-programs a response for a specific prompt.
    /// The key should be a unique substring of the system prompt. Keys are tried
    /// in the order they were added.
    pub fn add_response(&self, key: &str, response: &str) {
        let mut responses = self.responses.lock().unwrap();
        responses.push((key.to_string(), response.to_string()));
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((system_prompt.to_string(), user_prompt.to_string()));

        let responses = self.responses.lock().unwrap();
        for (key, response) in responses.iter() {
            if system_prompt.contains(key.as_str()) {
                return Ok(response.clone());
            }
        }

        Err(AgentError::AiApi(format!(
            "MockAiProvider: No response programmed for system prompt. Got: '{system_prompt}'"
        )))
    }
}

// --- Scripted Tool Port ---

/// A tool port that searches and checks against a real lake but answers
/// `sql_runner` with a canned result after an optional delay.
#[derive(Clone, Debug)]
pub struct ScriptedTools {
    inner: LakeTools,
    result: ResultSet,
    run_delay: Option<Duration>,
    calls: Arc<Mutex<Vec<(ToolName, String)>>>,
}

impl ScriptedTools {
    pub fn new(inner: LakeTools) -> Self {
        Self {
            inner,
            result: ResultSet {
                columns: vec![],
                rows: vec![],
                truncated: false,
            },
            run_delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_result(mut self, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.result = ResultSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            truncated: false,
        };
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
        self.inner.table_searcher(query).await
    }

    async fn sql_checker(&self, query: &str) -> Result<CheckReport, AgentError> {
        self.record(ToolName::SqlChecker, query);
        self.inner.sql_checker(query).await
    }

    async fn sql_runner(&self, query: &str, _limits: RunLimits) -> Result<ResultSet, AgentError> {
        self.record(ToolName::SqlRunner, query);
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.result.clone())
    }
}
