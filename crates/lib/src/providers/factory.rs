//! # AI Provider Factory
//!
//! Builds AI provider instances from their configuration. Keeping this in the
//! library lets the server and any other consumer instantiate providers the same way.

use crate::{
    config::ProviderConfig,
    errors::AgentError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider},
};
use std::collections::HashMap;
use tracing::info;

/// The Gemini `generateContent` endpoint for a model.
pub fn gemini_generate_url(model_name: &str) -> String {
    format!("https://generativelanguage.googleapis.com/v1beta/models/{model_name}:generateContent")
}

/// Creates one provider from its named configuration.
pub fn create_provider(
    name: &str,
    config: &ProviderConfig,
) -> Result<Box<dyn AiProvider>, AgentError> {
    let provider: Box<dyn AiProvider> = match config.provider.as_str() {
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    AgentError::MissingAiProvider(format!(
                        "api_key is required for gemini provider '{name}'"
                    ))
                })?;
            let api_url = config
                .api_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| gemini_generate_url(&config.model_name));
            info!(provider = %name, api_url = %api_url, "Configuring Gemini provider");
            Box::new(GeminiProvider::new(api_url, api_key)?)
        }
        "local" => {
            let api_url = config
                .api_url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    AgentError::MissingAiProvider(format!(
                        "api_url is required for local provider '{name}'. Please set LOCAL_AI_API_URL in your .env file."
                    ))
                })?;
            info!(provider = %name, api_url = %api_url, "Configuring local AI provider");
            Box::new(LocalAiProvider::new(
                api_url,
                config.api_key.clone().filter(|k| !k.is_empty()),
                Some(config.model_name.clone()),
            )?)
        }
        other => {
            return Err(AgentError::MissingAiProvider(format!(
                "Unsupported AI provider type '{other}' for provider '{name}'"
            )))
        }
    };
    Ok(provider)
}

/// Creates every provider in the `providers` map, keyed by name.
pub fn create_providers(
    configs: &HashMap<String, ProviderConfig>,
) -> Result<HashMap<String, Box<dyn AiProvider>>, AgentError> {
    configs
        .iter()
        .map(|(name, config)| Ok((name.clone(), create_provider(name, config)?)))
        .collect()
}
