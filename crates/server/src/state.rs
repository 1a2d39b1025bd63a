//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The `AppState` holds the turn controller, the
//! session store and both storage providers, making them accessible to all
//! request handlers.

use crate::config::AppConfig;
use memento::{
    constants::DEFAULT_SEARCH_LIMIT,
    prompts::{AgentTask, AgentTasks},
    providers::{
        ai::AiProvider,
        db::{catalog::CatalogStore, lake::LakeStore, open_database},
        factory::create_providers,
    },
    Controller, LakeTools, ResponseRenderer, SessionStore,
};
use std::{collections::HashMap, path::Path, sync::Arc};
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration, loaded from `config.yml`.
    pub config: Arc<AppConfig>,
    pub controller: Arc<Controller>,
    pub renderer: Arc<ResponseRenderer>,
    /// Open conversations keyed by thread id.
    pub sessions: Arc<SessionStore>,
    pub catalog: Arc<CatalogStore>,
    /// The lake the agent queries. Also used to seed local data.
    pub lake: Arc<LakeStore>,
}

impl AppState {
    /// The model serving query synthesis, for the service banner.
    pub fn synthesis_model(&self) -> Option<&str> {
        let provider = self.config.tasks.get("query_synthesis")?.provider.as_deref()?;
        self.config
            .providers
            .get(provider)
            .map(|p| p.model_name.as_str())
    }
}

/// Resolves one task against the instantiated providers.
fn resolve_task(
    name: &str,
    config: &AppConfig,
    providers: &HashMap<String, Box<dyn AiProvider>>,
) -> anyhow::Result<AgentTask> {
    let task = config
        .tasks
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("Task '{name}' is not configured"))?;
    let provider_name = task
        .provider
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Resolved task '{name}' is missing required 'provider' field"))?;
    let provider = providers.get(provider_name).ok_or_else(|| {
        anyhow::anyhow!("Task '{name}' refers to unknown provider '{provider_name}'")
    })?;
    let system_prompt = task.system_prompt.clone().ok_or_else(|| {
        anyhow::anyhow!("Resolved task '{name}' is missing required 'system_prompt' field")
    })?;
    let user_prompt = task.user_prompt.clone().ok_or_else(|| {
        anyhow::anyhow!("Resolved task '{name}' is missing required 'user_prompt' field")
    })?;
    Ok(AgentTask::new(provider.clone(), system_prompt, user_prompt))
}

/// Builds the shared application state from the configuration.
///
/// This function initializes all necessary services:
/// - an AI provider client for each entry of the `providers` section,
/// - the four agent tasks routed to those providers,
/// - the Turso database shared by the metadata catalog and the lake,
/// - the controller, the renderer and an empty session store.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let providers = create_providers(&config.providers)?;

    let tasks = AgentTasks {
        intent_classification: resolve_task("intent_classification", &config, &providers)?,
        query_synthesis: resolve_task("query_synthesis", &config, &providers)?,
        direct_answer: resolve_task("direct_answer", &config, &providers)?,
        result_narration: resolve_task("result_narration", &config, &providers)?,
    };

    if config.db_url != ":memory:" {
        if let Some(parent) = Path::new(&config.db_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    let db = open_database(&config.db_url).await?;
    let catalog = CatalogStore::new(db.clone(), config.embedding.clone());
    // Ensure the catalog schema is in place on startup.
    catalog.initialize_schema().await?;
    let lake = LakeStore::new(db);
    info!(db_path = %config.db_url, "Initialized lake and catalog storage.");

    let tools = LakeTools::new(catalog.clone(), lake.clone(), DEFAULT_SEARCH_LIMIT);
    let narration = config
        .agent
        .narrate_results
        .then(|| tasks.result_narration.clone());
    let controller = Controller::new(Box::new(tools), tasks, config.agent.clone());

    Ok(AppState {
        config: Arc::new(config),
        controller: Arc::new(controller),
        renderer: Arc::new(ResponseRenderer::new(narration)),
        sessions: Arc::new(SessionStore::new()),
        catalog: Arc::new(catalog),
        lake: Arc::new(lake),
    })
}
