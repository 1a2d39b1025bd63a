//! # Configuration Tests
//!
//! Layering of the YAML file, `${VAR}` substitution and environment overrides.

use memento::SqlDialect;
use memento_server::config::{get_config, ConfigError, DEFAULT_PROVIDER};
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

// Environment variables are process-global, so tests that touch them run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const OVERRIDE_VARS: [&str; 5] = [
    "PORT",
    "DB_URL",
    "MEMENTO_AGENT__ROW_CAP",
    "MEMENTO_AGENT__SQL_DIALECT",
    "TEST_LOCAL_AI_URL",
];

fn clear_env_vars() {
    for var in OVERRIDE_VARS {
        env::remove_var(var);
    }
}

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.yml");
    let mut file = File::create(&path).expect("Failed to create config file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config file");
    (dir, path)
}

const BASE_CONFIG: &str = r#"
port: 8080
db_url: "db/test.db"
providers:
  default:
    provider: "local"
    api_url: "${TEST_LOCAL_AI_URL}"
    model_name: "test-model"
"#;

#[test]
fn test_file_values_and_substitution() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("TEST_LOCAL_AI_URL", "http://localhost:1234/v1/chat/completions");

    let (_dir, path) = write_config(BASE_CONFIG);
    let config = get_config(path.to_str()).expect("Configuration should load successfully");

    assert_eq!(config.port, 8080);
    assert_eq!(config.db_url, "db/test.db");
    assert!(config.embedding.is_none());
    let provider = &config.providers[DEFAULT_PROVIDER];
    assert_eq!(provider.provider, "local");
    assert_eq!(
        provider.api_url.as_deref(),
        Some("http://localhost:1234/v1/chat/completions")
    );

    clear_env_vars();
}

#[test]
fn test_default_tasks_and_agent_policy() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let (_dir, path) = write_config(BASE_CONFIG);
    let config = get_config(path.to_str()).expect("Configuration should load successfully");

    for task in [
        "intent_classification",
        "query_synthesis",
        "direct_answer",
        "result_narration",
    ] {
        let task_config = &config.tasks[task];
        assert_eq!(task_config.provider.as_deref(), Some(DEFAULT_PROVIDER));
        assert!(task_config.system_prompt.is_some());
        assert!(task_config.user_prompt.is_some());
    }

    assert_eq!(config.agent.max_repair_attempts, 3);
    assert_eq!(config.agent.row_cap, 500);
    assert_eq!(config.agent.execution_timeout_secs, 30);
    assert_eq!(config.agent.sql_dialect, SqlDialect::Sqlite);

    clear_env_vars();
}

#[test]
fn test_file_prompt_overrides_default_prompt() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let content = format!(
        "{BASE_CONFIG}tasks:\n  query_synthesis:\n    system_prompt: \"Write SQL for {{dialect}} only.\"\n"
    );
    let (_dir, path) = write_config(&content);
    let config = get_config(path.to_str()).expect("Configuration should load successfully");

    let synthesis = &config.tasks["query_synthesis"];
    assert_eq!(
        synthesis.system_prompt.as_deref(),
        Some("Write SQL for {dialect} only.")
    );
    // Untouched fields keep their defaults.
    assert_eq!(synthesis.provider.as_deref(), Some(DEFAULT_PROVIDER));
    assert!(synthesis.user_prompt.is_some());

    clear_env_vars();
}

#[test]
fn test_environment_overrides() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("PORT", "9999");
    env::set_var("DB_URL", "/tmp/override.db");
    env::set_var("MEMENTO_AGENT__ROW_CAP", "100");
    env::set_var("MEMENTO_AGENT__SQL_DIALECT", "postgres");

    let (_dir, path) = write_config(BASE_CONFIG);
    let config = get_config(path.to_str()).expect("Configuration should load successfully");

    assert_eq!(config.port, 9999);
    assert_eq!(config.db_url, "/tmp/override.db");
    assert_eq!(config.agent.row_cap, 100);
    assert_eq!(config.agent.sql_dialect, SqlDialect::Postgres);
    // Fields not overridden keep their defaults.
    assert_eq!(config.agent.max_repair_attempts, 3);

    clear_env_vars();
}

#[test]
fn test_missing_config_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let result = get_config(Some("/nonexistent/memento/config.yml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));

    clear_env_vars();
}

#[test]
fn test_invalid_port() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("PORT", "not-a-number");

    let (_dir, path) = write_config(BASE_CONFIG);
    let result = get_config(path.to_str());
    assert!(matches!(result, Err(ConfigError::General(_))));

    clear_env_vars();
}
