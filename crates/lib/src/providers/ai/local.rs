//! # Local AI Provider
//!
//! Chat completions against a local or OpenAI-compatible server. Agent tasks want
//! reproducible verdicts and SQL, so requests are sent at temperature zero, and the
//! reasoning preamble some local models emit (`<think>..</think>`) is removed before
//! the reply reaches the classifier or the synthesizer.

use crate::{errors::AgentError, providers::ai::AiProvider};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, warn};

const REASONING_END: &str = "</think>";

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// A provider for a local or OpenAI-compatible chat completions API.
#[derive(Clone, Debug)]
pub struct LocalAiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl LocalAiProvider {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, AgentError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(AgentError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

/// Drops a leading reasoning block, keeping only the final answer.
fn strip_reasoning(content: &str) -> &str {
    match content.rfind(REASONING_END) {
        Some(end) => content[end + REASONING_END.len()..].trim(),
        None => content.trim(),
    }
}

#[async_trait]
impl AiProvider for LocalAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AgentError> {
        let request_body = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            model: self.model.as_deref(),
            temperature: 0.0,
        };

        let mut request_builder = self.client.post(&self.api_url).json(&request_body);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        debug!(api_url = %self.api_url, model = ?self.model, "--> Sending chat completion request");
        let response = request_builder
            .send()
            .await
            .map_err(AgentError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::AiApi(error_text));
        }

        let choice = response
            .json::<ChatResponse>()
            .await
            .map_err(AgentError::AiDeserialization)?
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::AiApi("chat completion returned no choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!(model = ?self.model, "Chat completion was cut at the token limit");
        }
        let content = choice.message.content.unwrap_or_default();
        debug!(reply = %content, "<-- Received chat completion");
        Ok(strip_reasoning(&content).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_block_is_removed() {
        assert_eq!(
            strip_reasoning("<think>orders has revenue</think>\n SELECT 1"),
            "SELECT 1"
        );
        assert_eq!(strip_reasoning("  {\"intent\": \"direct_answer\"} "), "{\"intent\": \"direct_answer\"}");
    }
}
