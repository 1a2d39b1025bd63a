//! # SQL Synthesis
//!
//! Asks the AI provider for one query grounded in the schema context. On repair
//! attempts the accumulated attempt history is passed forward, and a reply that
//! repeats a rejected query is challenged once before being reported as repeated.

use crate::{
    classifier::history_or_none,
    config::SqlDialect,
    errors::AgentError,
    prompts::{
        tasks::{QUERY_DUPLICATE_INSTRUCTION, QUERY_REPAIR_INSTRUCTION},
        AgentTask,
    },
    types::{AttemptRecord, QueryCandidate, SchemaContext},
};
use regex::Regex;
use tracing::{debug, info, warn};

/// The attempt history of one turn, fed back into synthesis on repair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairContext {
    attempts: Vec<AttemptRecord>,
}

impl RepairContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attempt: AttemptRecord) {
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn next_attempt_number(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    /// The attempt number of an earlier attempt with the same normalized text.
    pub fn find_repeat(&self, sql: &str) -> Option<u32> {
        let normalized = normalize_sql(sql);
        self.attempts
            .iter()
            .find(|a| normalize_sql(&a.candidate.sql_text) == normalized)
            .map(|a| a.candidate.attempt_number)
    }

    /// Renders the rejected attempts and their error diagnostics as prompt text.
    pub fn render(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                let issues = a
                    .validation
                    .errors()
                    .map(|d| format!("  - {}", d.message))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "## Attempt {}\n```sql\n{}\n```\nIssues:\n{}",
                    a.candidate.attempt_number, a.candidate.sql_text, issues
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// What synthesis produced for an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    /// A query not tried before in this turn.
    Fresh(QueryCandidate),
    /// The provider insisted on a query already rejected as `previous_attempt`.
    Repeated {
        candidate: QueryCandidate,
        previous_attempt: u32,
    },
}

impl Synthesis {
    pub fn candidate(&self) -> &QueryCandidate {
        match self {
            Synthesis::Fresh(candidate) => candidate,
            Synthesis::Repeated { candidate, .. } => candidate,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlSynthesizer {
    task: AgentTask,
    dialect: SqlDialect,
}

impl SqlSynthesizer {
    pub fn new(task: AgentTask, dialect: SqlDialect) -> Self {
        Self { task, dialect }
    }

    /// Produces the candidate for the next attempt of this turn.
    pub async fn synthesize(
        &self,
        question: &str,
        history: &str,
        context: &SchemaContext,
        repair: &RepairContext,
    ) -> Result<Synthesis, AgentError> {
        let attempt_number = repair.next_attempt_number();
        let system_prompt = self.task.system_prompt.replace("{dialect}", self.dialect.name());
        let repair_text = if repair.is_empty() {
            String::new()
        } else {
            QUERY_REPAIR_INSTRUCTION.replace("{attempts}", &repair.render())
        };
        let user_prompt = self
            .task
            .user_prompt
            .replace("{dialect}", self.dialect.name())
            .replace("{question}", question)
            .replace("{history}", history_or_none(history))
            .replace("{schema}", &context.render())
            .replace("{repair}", &repair_text);

        let candidate = self
            .request(&system_prompt, &user_prompt, attempt_number)
            .await?;

        let Some(previous_attempt) = repair.find_repeat(&candidate.sql_text) else {
            info!(attempt = attempt_number, "Synthesized query candidate");
            return Ok(Synthesis::Fresh(candidate));
        };

        warn!(
            attempt = attempt_number,
            previous_attempt, "Synthesizer repeated a rejected query; re-prompting once"
        );
        let challenge = QUERY_DUPLICATE_INSTRUCTION.replace("{attempt}", &previous_attempt.to_string());
        let candidate = self
            .request(
                &system_prompt,
                &format!("{user_prompt}\n{challenge}"),
                attempt_number,
            )
            .await?;

        match repair.find_repeat(&candidate.sql_text) {
            Some(previous_attempt) => Ok(Synthesis::Repeated {
                candidate,
                previous_attempt,
            }),
            None => Ok(Synthesis::Fresh(candidate)),
        }
    }

    async fn request(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        attempt_number: u32,
    ) -> Result<QueryCandidate, AgentError> {
        debug!(system_prompt = %system_prompt, user_prompt = %user_prompt, "--> Sending prompts for query synthesis");
        let response = self
            .task
            .provider
            .generate(system_prompt, user_prompt)
            .await?;
        debug!("<-- Query synthesis response: {}", response);

        let (sql_text, rationale) = extract_sql(&response)?;
        Ok(QueryCandidate {
            sql_text,
            rationale,
            attempt_number,
        })
    }
}

/// Splits a reply into the SQL of its first code block and the prose before it.
///
/// A reply without a code block is taken as bare SQL.
pub fn extract_sql(response: &str) -> Result<(String, String), AgentError> {
    let re = Regex::new(r"```(?:sql|query)?\n?([\s\S]*?)```")?;
    match re.captures(response) {
        Some(caps) => {
            let sql = caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let rationale = caps
                .get(0)
                .map(|m| response[..m.start()].trim().to_string())
                .unwrap_or_default();
            Ok((sql, rationale))
        }
        None => Ok((response.trim().to_string(), String::new())),
    }
}

/// Lower-cases, collapses whitespace and drops a trailing `;`.
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_sql_and_rationale() {
        let (sql, rationale) = extract_sql(
            "Sum revenue per customer.\n```sql\nSELECT customer_id FROM orders\n```",
        )
        .unwrap();
        assert_eq!(sql, "SELECT customer_id FROM orders");
        assert_eq!(rationale, "Sum revenue per customer.");

        let (sql, rationale) = extract_sql("SELECT 1").unwrap();
        assert_eq!(sql, "SELECT 1");
        assert!(rationale.is_empty());
    }

    #[test]
    fn normalization_ignores_case_spacing_and_semicolon() {
        assert_eq!(
            normalize_sql("SELECT  a\nFROM t;"),
            normalize_sql("select a from t")
        );
    }
}
