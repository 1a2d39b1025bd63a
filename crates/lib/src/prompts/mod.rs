//! # Prompt Templates
//!
//! Prompt templates for the agent's LLM tasks, and the routing of each task to
//! an AI provider.

pub mod tasks;
pub mod vocabulary;

use crate::providers::ai::AiProvider;
use tasks::*;

/// A prompt pair and the provider that serves it.
#[derive(Clone, Debug)]
pub struct AgentTask {
    pub provider: Box<dyn AiProvider>,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl AgentTask {
    pub fn new(
        provider: Box<dyn AiProvider>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// The four LLM tasks of a turn.
#[derive(Clone, Debug)]
pub struct AgentTasks {
    pub intent_classification: AgentTask,
    pub query_synthesis: AgentTask,
    pub direct_answer: AgentTask,
    pub result_narration: AgentTask,
}

impl AgentTasks {
    /// Routes every task to `provider` with the default prompts.
    pub fn with_provider(provider: Box<dyn AiProvider>) -> Self {
        Self {
            intent_classification: AgentTask::new(
                provider.clone(),
                INTENT_CLASSIFICATION_SYSTEM_PROMPT,
                INTENT_CLASSIFICATION_USER_PROMPT,
            ),
            query_synthesis: AgentTask::new(
                provider.clone(),
                QUERY_SYNTHESIS_SYSTEM_PROMPT,
                QUERY_SYNTHESIS_USER_PROMPT,
            ),
            direct_answer: AgentTask::new(
                provider.clone(),
                DIRECT_ANSWER_SYSTEM_PROMPT,
                DIRECT_ANSWER_USER_PROMPT,
            ),
            result_narration: AgentTask::new(
                provider,
                RESULT_NARRATION_SYSTEM_PROMPT,
                RESULT_NARRATION_USER_PROMPT,
            ),
        }
    }
}

/// The names under which the tasks appear in configuration.
pub const TASK_NAMES: [&str; 4] = [
    "intent_classification",
    "query_synthesis",
    "direct_answer",
    "result_narration",
];

/// The default `(system, user)` prompts for a task name.
pub fn default_task_prompts(task: &str) -> Option<(&'static str, &'static str)> {
    match task {
        "intent_classification" => Some((
            INTENT_CLASSIFICATION_SYSTEM_PROMPT,
            INTENT_CLASSIFICATION_USER_PROMPT,
        )),
        "query_synthesis" => Some((QUERY_SYNTHESIS_SYSTEM_PROMPT, QUERY_SYNTHESIS_USER_PROMPT)),
        "direct_answer" => Some((DIRECT_ANSWER_SYSTEM_PROMPT, DIRECT_ANSWER_USER_PROMPT)),
        "result_narration" => Some((
            RESULT_NARRATION_SYSTEM_PROMPT,
            RESULT_NARRATION_USER_PROMPT,
        )),
        _ => None,
    }
}
