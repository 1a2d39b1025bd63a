//! # Application Configuration
//!
//! This module defines the configuration structure for `memento-server` and the
//! logic for loading it from layered YAML files and environment variables.

use config::{
    Config as ConfigBuilder, Environment, File, FileFormat, Value as ConfigValue,
    ValueKind as ConfigValueKind,
};
use memento::{
    constants::DEFAULT_DB_FILE,
    prompts::{default_task_prompts, TASK_NAMES},
    AgentConfig, EmbeddingConfig, ProviderConfig,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use tracing::info;

/// The provider every default task is routed to.
pub const DEFAULT_PROVIDER: &str = "default";

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The path to the SQLite database file holding the lake and the catalog.
    /// Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// The embedding model for catalog search. Keyword-only search without it.
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    /// A map of named, reusable AI provider configurations.
    pub providers: HashMap<String, ProviderConfig>,
    /// A map of tasks, each specifying a provider and prompts.
    pub tasks: HashMap<String, TaskConfig>,
    /// Controller policy: repair budget, row cap, timeout and friends.
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_port() -> u16 {
    9090
}

fn default_db_url() -> String {
    DEFAULT_DB_FILE.to_string()
}

/// Defines the prompts and provider for a specific agent task.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaskConfig {
    /// The key of the provider to use from the `providers` map.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

/// Constructs a `config::Value` map of the default tasks from the library.
/// This serves as the base layer of configuration.
fn build_default_tasks() -> HashMap<String, ConfigValue> {
    TASK_NAMES
        .iter()
        .filter_map(|name| default_task_prompts(name).map(|prompts| (*name, prompts)))
        .map(|(name, (sys, user))| {
            let mut table = HashMap::new();
            table.insert("provider".to_string(), ConfigValue::from(DEFAULT_PROVIDER));
            table.insert("system_prompt".to_string(), ConfigValue::from(sys));
            table.insert("user_prompt".to_string(), ConfigValue::from(user));
            (
                name.to_string(),
                ConfigValue::new(None, ConfigValueKind::Table(table)),
            )
        })
        .collect()
}

/// Replaces `${VAR}` with the value of the environment variable, or nothing.
pub fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Invalid substitution pattern: {e}")))?;
    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });
    Ok(expanded.to_string())
}

// Reads a file and substitutes env vars. Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    substitute_env_vars(&content).map(Some)
}

/// Loads the application configuration from files and environment variables.
///
/// - Top-level keys like `port` and `db_url` are overridden by `PORT` and `DB_URL`.
/// - Nested keys are overridden by `MEMENTO_...` variables (e.g. `MEMENTO_AGENT__ROW_CAP`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let mut builder = ConfigBuilder::builder()
        // Layer 1: Programmatic defaults from the library.
        .set_default("tasks", build_default_tasks())?;

    // Layer 2: Main Config (with Fallback)
    let main_config_path = if let Some(override_path) = config_path_override {
        override_path.to_string()
    } else {
        let user_config_path = format!("{base_path}/config.yml");
        if std::path::Path::new(&user_config_path).exists() {
            info!("Loading user-defined configuration from '{user_config_path}'.");
            user_config_path
        } else {
            let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "local".to_string());
            let fallback_path = format!("{base_path}/config.{provider}.yml");
            info!("'{user_config_path}' not found. Falling back to '{fallback_path}' based on AI_PROVIDER='{provider}'.");
            fallback_path
        }
    };

    let main_content = read_and_substitute(&main_config_path)?
        .ok_or_else(|| ConfigError::NotFound(format!("Main config file not found at '{main_config_path}'. Please ensure 'config.yml' exists or your AI_PROVIDER is set to load a valid template ('local' or 'gemini').")))?;
    builder = builder.add_source(File::from_str(&main_content, FileFormat::Yaml));

    // Layer 3: User Prompt Overrides (Optional)
    let user_prompt_path = format!("{base_path}/prompt.yml");
    if let Some(user_prompts_content) = read_and_substitute(&user_prompt_path)? {
        info!("Loading user prompt overrides from '{user_prompt_path}'.");
        builder = builder.add_source(File::from_str(&user_prompts_content, FileFormat::Yaml));
    }

    let settings = builder
        // Layer 4: Plain environment variables for the top-level keys.
        .add_source(Environment::default().try_parsing(true))
        // Layer 5: Prefixed environment variables for nested overrides.
        .add_source(
            Environment::with_prefix("MEMENTO")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    Ok(config)
}
