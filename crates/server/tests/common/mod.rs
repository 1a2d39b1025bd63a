//! # Common Test Utilities
//!
//! `TestApp` spawns the real server on a random port with a temporary SQLite
//! database seeded with the sales fixture. The `local` AI provider points at an
//! `httpmock::MockServer`, so each test scripts the model's replies.

// Not every test file uses every helper.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use httpmock::{Method, Mock, MockServer};
use memento::Controller;
use memento_server::{
    config, router,
    state::{build_app_state, AppState},
};
use memento_test_utils::seed_sales;
use reqwest::Client;
use serde_json::{json, Value};
use std::{fs::File, io::Write, net::SocketAddr, sync::Arc};
use tempfile::{tempdir, NamedTempFile, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

/// Substrings of each task's system prompt, for routing mocked replies.
pub const CLASSIFY_KEY: &str = "router of a data assistant";
pub const SYNTHESIS_KEY: &str = "Write exactly one read-only";
pub const DIRECT_ANSWER_KEY: &str = "helpful data assistant";
pub const NARRATION_KEY: &str = "strict data reporter";

pub const TOP_CUSTOMERS_SQL: &str = "SELECT c.customer_name, SUM(o.revenue) AS total_revenue FROM orders o JOIN customers c ON c.customer_id = o.customer_id GROUP BY c.customer_name ORDER BY total_revenue DESC LIMIT 5";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub mock_server: MockServer,
    pub app_state: AppState,
    _db_file: NamedTempFile,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the application server with the default controller.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| None).await
    }

    /// Spawns the server, letting `replace` swap in a custom controller built
    /// against the seeded state.
    pub async fn spawn_with<F>(replace: F) -> Result<Self>
    where
        F: FnOnce(&AppState) -> Option<Controller>,
    {
        dotenvy::dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let mock_server = MockServer::start();
        let db_file = NamedTempFile::new()?;
        let db_path = db_file.path().to_path_buf();

        let config_dir = tempdir()?;
        let config_path = config_dir.path().join("config.yml");
        let config_content = format!(
            r#"
port: 0
db_url: "{}"
providers:
  default:
    provider: "local"
    api_url: "{}"
    api_key: null
    model_name: "mock-chat-model"
agent:
  max_repair_attempts: 3
  execution_timeout_secs: 5
"#,
            db_path.display(),
            mock_server.url("/v1/chat/completions")
        );
        let mut file = File::create(&config_path)?;
        file.write_all(config_content.as_bytes())?;

        let config_path = config_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("config path is not UTF-8"))?;
        let config = config::get_config(Some(config_path))?;
        let mut app_state = build_app_state(config).await?;
        seed_sales(&app_state.lake, &app_state.catalog).await?;
        if let Some(controller) = replace(&app_state) {
            app_state.controller = Arc::new(controller);
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let app = router::create_router(app_state.clone());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::new(),
            mock_server,
            app_state,
            _db_file: db_file,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Programs the model's reply for requests whose body contains `key`.
    pub fn mock_reply(&self, key: &str, content: &str) -> Mock<'_> {
        let key = key.to_string();
        let content = content.to_string();
        self.mock_server.mock(|when, then| {
            when.method(Method::POST)
                .path("/v1/chat/completions")
                .body_contains(&key);
            then.status(200).json_body(
                json!({"choices": [{"message": {"role": "assistant", "content": content}}]}),
            );
        })
    }

    pub async fn chat(&self, message: &str, thread_id: Option<&str>) -> Result<reqwest::Response> {
        let mut payload = json!({ "message": message });
        if let Some(thread_id) = thread_id {
            payload["thread_id"] = json!(thread_id);
        }
        Ok(self
            .client
            .post(format!("{}/chat", self.address))
            .json(&payload)
            .send()
            .await?)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A classifier reply routing to the full pipeline.
pub fn full_pipeline(search_query: &str, question: &str) -> String {
    json!({
        "intent": "full_pipeline",
        "search_query": search_query,
        "question": question,
        "answer": ""
    })
    .to_string()
}

pub fn sql_reply(sql: &str) -> String {
    format!("Join orders to customers and rank by revenue.\n```sql\n{sql}\n```")
}

pub fn tool_names(body: &Value) -> Vec<String> {
    body["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| c["tool"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
