//! # Agent Policy Configuration
//!
//! Policy knobs for the turn controller. Every field has a default so a partially
//! specified `agent:` section in the server's `config.yml` still deserializes.

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{Dialect, GenericDialect, PostgreSqlDialect, SQLiteDialect};
use std::time::Duration;

/// The SQL dialect the validator parses with and the synthesizer is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    #[default]
    Sqlite,
    Postgres,
    Generic,
}

impl SqlDialect {
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SQLite",
            SqlDialect::Postgres => "PostgreSQL",
            SqlDialect::Generic => "ANSI SQL",
        }
    }

    pub(crate) fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::Generic => Box::new(GenericDialect {}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum synthesis attempts per turn before giving up (R).
    #[serde(default = "default_max_repair_attempts")]
    pub max_repair_attempts: u32,
    /// Hard cap on rows read back from the executor.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
    /// Number of tables kept from discovery.
    #[serde(default = "default_discovery_top_k")]
    pub discovery_top_k: usize,
    /// Sample values kept per column in the schema context.
    #[serde(default = "default_max_sample_values")]
    pub max_sample_values: usize,
    #[serde(default = "default_max_context_tables")]
    pub max_context_tables: usize,
    /// Budget for the rendered schema context, in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Finalized turns given to the classifier and synthesizer as conversation history.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Whether validation also asks the backend to compile the statement.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub sql_dialect: SqlDialect,
    #[serde(default = "default_summary_top_n")]
    pub summary_top_n: usize,
    #[serde(default = "default_max_highlights")]
    pub max_highlights: usize,
    /// Whether the renderer asks the AI provider to narrate the summary.
    #[serde(default = "default_true")]
    pub narrate_results: bool,
}

impl AgentConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: default_max_repair_attempts(),
            row_cap: default_row_cap(),
            execution_timeout_secs: default_execution_timeout_secs(),
            discovery_top_k: default_discovery_top_k(),
            max_sample_values: default_max_sample_values(),
            max_context_tables: default_max_context_tables(),
            max_context_chars: default_max_context_chars(),
            history_turns: default_history_turns(),
            dry_run: true,
            sql_dialect: SqlDialect::default(),
            summary_top_n: default_summary_top_n(),
            max_highlights: default_max_highlights(),
            narrate_results: true,
        }
    }
}

fn default_max_repair_attempts() -> u32 {
    3
}
fn default_row_cap() -> usize {
    500
}
fn default_execution_timeout_secs() -> u64 {
    30
}
fn default_discovery_top_k() -> usize {
    5
}
fn default_max_sample_values() -> usize {
    5
}
fn default_max_context_tables() -> usize {
    8
}
fn default_max_context_chars() -> usize {
    12_000
}
fn default_history_turns() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_summary_top_n() -> usize {
    3
}
fn default_max_highlights() -> usize {
    8
}

/// A reusable configuration for one AI provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The type of provider: `gemini` or `local`.
    pub provider: String,
    /// Optional for Gemini, where it is derived from the model name.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}

/// Configuration for the text embedding model used by the metadata catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
}
