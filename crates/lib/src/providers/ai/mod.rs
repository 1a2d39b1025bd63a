pub mod embedding;
pub mod gemini;
pub mod local;

use crate::errors::AgentError;
use async_trait::async_trait;
use dyn_clone::DynClone;
pub use embedding::{Embedder, EmbeddingPurpose};
use std::fmt::Debug;

/// A trait for interacting with an AI provider.
///
/// The controller uses it for intent classification, SQL synthesis, direct answers
/// and result narration. Each task supplies its own system and user prompt.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, AgentError>;
}

dyn_clone::clone_trait_object!(AiProvider);
