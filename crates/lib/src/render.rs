//! # Response Rendering
//!
//! Turns a finalized [`Turn`] into the structured response shown to the user.
//! This is the only place where the user's language matters: the controller and
//! its components never branch on it.

use crate::{
    prompts::AgentTask,
    session::Turn,
    summarizer::format_value,
    types::{
        FailureKind, Intent, ResultSummary, TableCandidate, ToolCallRecord, TurnOutcome,
        TurnState,
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Hebrew,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hebrew => "Hebrew",
        }
    }
}

/// Hebrew if the text contains any character of the Hebrew block, else English.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c)) {
        Language::Hebrew
    } else {
        Language::English
    }
}

/// The structured turn returned to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub thread_id: String,
    pub turn_id: Uuid,
    pub language: Language,
    pub states: Vec<TurnState>,
    pub plan: Vec<String>,
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub tables: Vec<TableCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ResultSummary>,
    pub truncated: bool,
    pub outcome: TurnOutcome,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct ResponseRenderer {
    narration: Option<AgentTask>,
}

impl ResponseRenderer {
    /// `narration` is the result-narration task, or `None` for deterministic text only.
    pub fn new(narration: Option<AgentTask>) -> Self {
        Self { narration }
    }

    pub async fn render(&self, thread_id: &str, turn: &Turn) -> TurnResponse {
        let language = detect_language(&turn.utterance);
        let outcome = turn.outcome.clone().unwrap_or(TurnOutcome::Failed {
            kind: FailureKind::InvalidQuery,
            message: "The turn did not finish.".to_string(),
            diagnostics: vec![],
        });
        let truncated = turn.execution.as_ref().is_some_and(|e| e.truncated);

        let text = match &outcome {
            TurnOutcome::Answered { text } => text.clone(),
            TurnOutcome::TablesListed => tables_text(&turn.tables, language),
            TurnOutcome::QueryAnswered => {
                let mut text = match self.narrate(turn, language).await {
                    Some(text) => text,
                    None => summary_text(turn.summary.as_ref(), language),
                };
                if truncated {
                    let rows = turn.execution.as_ref().map_or(0, |e| e.row_count);
                    text.push_str("\n\n");
                    text.push_str(&truncation_notice(rows, language));
                }
                text
            }
            TurnOutcome::Failed {
                message,
                diagnostics,
                ..
            } => {
                let mut text = match language {
                    Language::Hebrew => format!("לא הצלחתי להשלים את הבקשה: {message}"),
                    Language::English => message.clone(),
                };
                for diagnostic in diagnostics {
                    text.push_str(&format!("\n- {}", diagnostic.message));
                }
                text
            }
        };

        TurnResponse {
            thread_id: thread_id.to_string(),
            turn_id: turn.id,
            language,
            states: turn.states.clone(),
            plan: turn.plan.clone(),
            tool_calls: turn.tool_calls.clone(),
            sql: turn.sql.clone(),
            tables: turn.tables.clone(),
            summary: turn.summary.clone(),
            truncated,
            outcome,
            text,
        }
    }

    /// Asks the AI provider to phrase the summary. `None` means use the fallback.
    async fn narrate(&self, turn: &Turn, language: Language) -> Option<String> {
        let task = self.narration.as_ref()?;
        let summary = turn.summary.as_ref()?;
        let question = match &turn.intent {
            Some(Intent::FullPipeline { question, .. }) => question.as_str(),
            _ => turn.utterance.as_str(),
        };
        let metrics = summary
            .key_metrics
            .iter()
            .map(|(k, v)| format!("- {k}: {}", format_value(v)))
            .collect::<Vec<_>>()
            .join("\n");
        let highlights = summary
            .highlights
            .iter()
            .map(|h| format!("- {h}"))
            .collect::<Vec<_>>()
            .join("\n");

        let system_prompt = task.system_prompt.replace("{language}", language.name());
        let user_prompt = task
            .user_prompt
            .replace("{language}", language.name())
            .replace("{question}", question)
            .replace("{sql}", turn.sql.as_deref().unwrap_or_default())
            .replace("{highlights}", &highlights)
            .replace("{metrics}", &metrics);

        debug!(user_prompt = %user_prompt, "--> Sending prompts for result narration");
        match task.provider.generate(&system_prompt, &user_prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Result narration failed; using the plain summary");
                None
            }
        }
    }
}

fn tables_text(tables: &[TableCandidate], language: Language) -> String {
    let lead = match language {
        Language::Hebrew => format!("מצאתי {} טבלאות רלוונטיות:", tables.len()),
        Language::English => format!(
            "I found {} relevant table{}:",
            tables.len(),
            if tables.len() == 1 { "" } else { "s" }
        ),
    };
    let lines = tables
        .iter()
        .map(|t| {
            if t.description.is_empty() {
                format!("- {}", t.name)
            } else {
                format!("- {}: {}", t.name, t.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{lead}\n{lines}")
}

fn summary_text(summary: Option<&ResultSummary>, language: Language) -> String {
    let lead = match language {
        Language::Hebrew => "תוצאות:",
        Language::English => "Results:",
    };
    let lines = summary
        .map(|s| {
            s.highlights
                .iter()
                .map(|h| format!("- {h}"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    format!("{lead}\n{lines}")
}

fn truncation_notice(rows: usize, language: Language) -> String {
    match language {
        Language::Hebrew => format!("שימו לב: התוצאה הוגבלה ל-{rows} שורות ואינה מלאה."),
        Language::English => {
            format!("Note: the result was capped at {rows} rows and is not complete.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionResult;
    use serde_json::json;

    #[test]
    fn detects_hebrew_by_script() {
        assert_eq!(detect_language("מי הלקוח המוביל?"), Language::Hebrew);
        assert_eq!(detect_language("top customer?"), Language::English);
        assert_eq!(detect_language("top לקוח"), Language::Hebrew);
    }

    #[tokio::test]
    async fn truncation_is_always_disclosed() {
        let mut turn = Turn::new("list all orders");
        turn.sql = Some("SELECT * FROM orders LIMIT 900".to_string());
        turn.execution = Some(ExecutionResult {
            columns: vec!["order_id".to_string()],
            rows: vec![vec![json!(1)], vec![json!(2)]],
            row_count: 2,
            truncated: true,
            elapsed_ms: 3,
        });
        turn.summary = Some(ResultSummary {
            highlights: vec!["2 rows returned.".to_string()],
            key_metrics: Default::default(),
        });
        turn.finalize(TurnOutcome::QueryAnswered);

        let response = ResponseRenderer::new(None).render("t1", &turn).await;
        assert!(response.truncated);
        assert!(response.text.contains("capped at 2 rows"));
        assert!(response.text.contains("2 rows returned."));
    }

    #[tokio::test]
    async fn hebrew_turns_get_hebrew_framing() {
        let mut turn = Turn::new("אילו טבלאות יש על לקוחות?");
        turn.tables = vec![TableCandidate {
            name: "customers".to_string(),
            description: "Customer master data.".to_string(),
            columns: vec![],
            sample_values: Default::default(),
            relevance_score: 1.0,
        }];
        turn.finalize(TurnOutcome::TablesListed);

        let response = ResponseRenderer::new(None).render("t1", &turn).await;
        assert_eq!(response.language, Language::Hebrew);
        assert!(response.text.starts_with("מצאתי 1"));
        assert!(response.text.contains("- customers: Customer master data."));
    }
}
