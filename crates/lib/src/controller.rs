//! # Turn Controller
//!
//! The orchestration state machine. One call to [`Controller::handle_turn`] drives a
//! single utterance from `CLASSIFY` to `DONE` or `FAILED`:
//!
//! ```text
//! CLASSIFY -> DIRECT_ANSWER -> DONE
//! CLASSIFY -> DISCOVER -> DONE                         (discovery only)
//! CLASSIFY -> DISCOVER -> SYNTHESIZE -> VALIDATE -> EXECUTE -> SUMMARIZE -> DONE
//!                           ^              |
//!                           +--- REPAIR <--+           (at most R attempts)
//! ```
//!
//! Only `EXECUTE` has side effects, and it is entered at most once per turn with a
//! [`ValidatedQuery`].

use crate::{
    classifier::{history_or_none, IntentClassifier},
    config::AgentConfig,
    context::SchemaContextBuilder,
    discovery::TableDiscovery,
    errors::AgentError,
    prompts::{AgentTask, AgentTasks},
    session::{Session, Turn},
    summarizer::ResultSummarizer,
    synthesizer::{RepairContext, SqlSynthesizer, Synthesis},
    tools::{RunLimits, ToolPort},
    types::{
        AttemptRecord, Diagnostic, ExecutionResult, FailureKind, Intent, QueryCandidate,
        SchemaContext, ToolCallRecord, ToolName, TurnOutcome, TurnState, ValidatedQuery,
        ValidationResult,
    },
    validator::SqlValidator,
};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Working state of the turn being handled. Dropped when the turn is finalized.
#[derive(Default)]
struct TurnWork {
    search_query: String,
    question: String,
    context: SchemaContext,
    repair: RepairContext,
    pending: Option<QueryCandidate>,
    validated: Option<ValidatedQuery>,
    execution: Option<ExecutionResult>,
}

#[derive(Clone, Debug)]
pub struct Controller {
    tools: Box<dyn ToolPort>,
    classifier: IntentClassifier,
    discovery: TableDiscovery,
    context_builder: SchemaContextBuilder,
    synthesizer: SqlSynthesizer,
    validator: SqlValidator,
    summarizer: ResultSummarizer,
    direct_answer: AgentTask,
    config: AgentConfig,
}

impl Controller {
    pub fn new(tools: Box<dyn ToolPort>, tasks: AgentTasks, config: AgentConfig) -> Self {
        Self {
            discovery: TableDiscovery::new(tools.clone()),
            classifier: IntentClassifier::new(tasks.intent_classification),
            context_builder: SchemaContextBuilder::from_config(&config),
            synthesizer: SqlSynthesizer::new(tasks.query_synthesis, config.sql_dialect),
            validator: SqlValidator::new(config.sql_dialect, config.dry_run),
            summarizer: ResultSummarizer::new(config.summary_top_n, config.max_highlights),
            direct_answer: tasks.direct_answer,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Handles one utterance and appends the finalized turn to `session`.
    ///
    /// Turn-level failures (ambiguity, no tables, exhausted repairs, executor
    /// failures) are recorded on the returned turn. `Err` is reserved for
    /// infrastructure failures and for cancellation through `cancel`, in which
    /// case the session is left unchanged.
    pub async fn handle_turn<'s>(
        &self,
        session: &'s mut Session,
        utterance: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<&'s Turn, AgentError> {
        let history = session.history_text(self.config.history_turns);
        let mut turn = Turn::new(utterance.trim());
        let mut work = TurnWork::default();
        let mut state = TurnState::Classify;

        info!(turn_id = %turn.id, thread_id = session.id(), "Handling turn");
        loop {
            turn.enter(state);
            debug!(turn_id = %turn.id, state = %state, "Entering state");
            if state.is_terminal() {
                break;
            }

            let next = match state {
                TurnState::Classify => self.classify(&mut turn, &mut work, &history).await?,
                TurnState::DirectAnswer => self.answer_directly(&mut turn, &history).await?,
                TurnState::Discover => self.discover(session, &mut turn, &mut work).await?,
                TurnState::Synthesize => self.synthesize(&mut turn, &mut work, &history).await?,
                TurnState::Validate => self.validate(&mut turn, &mut work).await?,
                TurnState::Repair => self.plan_repair(&mut turn, &work),
                TurnState::Execute => self.execute(&mut turn, &mut work, &mut cancel).await?,
                TurnState::Summarize => self.summarize(&mut turn, &mut work),
                TurnState::Done | TurnState::Failed => break,
            };
            debug_assert!(
                state.successors().contains(&next),
                "illegal transition {state} -> {next}"
            );
            state = next;
        }

        info!(
            turn_id = %turn.id,
            states = ?turn.states.iter().map(TurnState::name).collect::<Vec<_>>(),
            "Turn finalized"
        );
        Ok(session.push_turn(turn))
    }

    async fn classify(
        &self,
        turn: &mut Turn,
        work: &mut TurnWork,
        history: &str,
    ) -> Result<TurnState, AgentError> {
        let intent = self.classifier.classify(&turn.utterance, history).await?;
        turn.intent = Some(intent.clone());

        let next = match intent {
            Intent::DirectAnswer { .. } => {
                turn.plan.push("Answer directly; no data lookup is needed.".to_string());
                TurnState::DirectAnswer
            }
            Intent::DiscoveryOnly { search_query } => {
                turn.plan.push(format!(
                    "Search the catalog for tables matching \"{search_query}\"."
                ));
                work.search_query = search_query;
                TurnState::Discover
            }
            Intent::FullPipeline {
                search_query,
                question,
            } => {
                turn.plan.push(format!(
                    "Find tables for \"{search_query}\", write and validate a query, run it and summarize the result."
                ));
                work.search_query = search_query;
                work.question = question;
                TurnState::Discover
            }
            Intent::NeedsClarification { question } => {
                turn.plan.push("Ask for clarification before using any tool.".to_string());
                return Ok(fail(turn, FailureKind::IntentAmbiguous, question, vec![]));
            }
        };
        Ok(next)
    }

    async fn answer_directly(&self, turn: &mut Turn, history: &str) -> Result<TurnState, AgentError> {
        let prepared = match &turn.intent {
            Some(Intent::DirectAnswer {
                answer: Some(answer),
            }) => Some(answer.clone()),
            _ => None,
        };
        let text = match prepared {
            Some(text) => text,
            None => {
                let user_prompt = self
                    .direct_answer
                    .user_prompt
                    .replace("{history}", history_or_none(history))
                    .replace("{utterance}", &turn.utterance);
                self.direct_answer
                    .provider
                    .generate(&self.direct_answer.system_prompt, &user_prompt)
                    .await?
                    .trim()
                    .to_string()
            }
        };
        turn.finalize(TurnOutcome::Answered { text });
        Ok(TurnState::Done)
    }

    async fn discover(
        &self,
        session: &mut Session,
        turn: &mut Turn,
        work: &mut TurnWork,
    ) -> Result<TurnState, AgentError> {
        let key = normalize_search(&work.search_query);
        let cached = session
            .discovery()
            .filter(|cache| cache.search_query == key)
            .map(|cache| cache.tables.clone());

        let tables = match cached {
            Some(tables) => {
                info!(turn_id = %turn.id, search_query = %key, "Reusing discovery from the previous turn");
                turn.tool_calls.push(ToolCallRecord {
                    tool: ToolName::TableSearcher,
                    input: work.search_query.clone(),
                    ok: true,
                    detail: format!("reused {} tables from the previous turn", tables.len()),
                    elapsed_ms: 0,
                    cached: true,
                });
                tables
            }
            None => {
                let started = Instant::now();
                let tables = self
                    .discovery
                    .discover(&work.search_query, self.config.discovery_top_k)
                    .await?;
                turn.tool_calls.push(ToolCallRecord {
                    tool: ToolName::TableSearcher,
                    input: work.search_query.clone(),
                    ok: true,
                    detail: format!("{} tables found", tables.len()),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    cached: false,
                });
                session.remember_discovery(key, tables.clone());
                tables
            }
        };
        turn.tables = tables;

        if turn.tables.is_empty() {
            let message = format!(
                "No tables matching \"{}\" were found in the catalog.",
                work.search_query
            );
            return Ok(fail(turn, FailureKind::NoRelevantTables, message, vec![]));
        }

        if matches!(turn.intent, Some(Intent::DiscoveryOnly { .. })) {
            turn.finalize(TurnOutcome::TablesListed);
            return Ok(TurnState::Done);
        }

        work.context = self.context_builder.build(turn.tables.clone());
        turn.plan.push(format!(
            "Ground the query on: {}.",
            work.context.table_names().join(", ")
        ));
        Ok(TurnState::Synthesize)
    }

    async fn synthesize(
        &self,
        turn: &mut Turn,
        work: &mut TurnWork,
        history: &str,
    ) -> Result<TurnState, AgentError> {
        let synthesis = self
            .synthesizer
            .synthesize(&work.question, history, &work.context, &work.repair)
            .await?;

        match synthesis {
            Synthesis::Fresh(candidate) => {
                work.pending = Some(candidate);
                Ok(TurnState::Validate)
            }
            Synthesis::Repeated {
                candidate,
                previous_attempt,
            } => {
                let validation = ValidationResult::for_candidate(
                    &candidate,
                    vec![Diagnostic::error(format!(
                        "the query is identical to attempt {previous_attempt}, which was rejected"
                    ))
                    .at("repair")],
                );
                Ok(self.reject(turn, work, candidate, validation))
            }
        }
    }

    async fn validate(&self, turn: &mut Turn, work: &mut TurnWork) -> Result<TurnState, AgentError> {
        let Some(candidate) = work.pending.take() else {
            return Ok(fail(
                turn,
                FailureKind::InvalidQuery,
                "No query was produced to validate.".to_string(),
                vec![],
            ));
        };

        let validation = self
            .validator
            .validate(&candidate, &work.context, self.tools.as_ref())
            .await?;
        turn.tool_calls.extend(validation.dry_run);
        let result = validation.result;

        if !result.is_valid {
            return Ok(self.reject(turn, work, candidate, result));
        }

        turn.attempts.push(AttemptRecord {
            candidate: candidate.clone(),
            validation: result.clone(),
        });
        match ValidatedQuery::new(candidate, &result) {
            Some(validated) => {
                work.validated = Some(validated);
                Ok(TurnState::Execute)
            }
            None => Ok(fail(
                turn,
                FailureKind::InvalidQuery,
                "The validated query did not match its candidate.".to_string(),
                vec![],
            )),
        }
    }

    /// Records an invalid attempt and decides between another repair and giving up.
    fn reject(
        &self,
        turn: &mut Turn,
        work: &mut TurnWork,
        candidate: QueryCandidate,
        validation: ValidationResult,
    ) -> TurnState {
        let record = AttemptRecord {
            candidate,
            validation,
        };
        turn.attempts.push(record.clone());
        work.repair.push(record);

        let attempts = turn.attempts.len() as u32;
        let limit = self.config.max_repair_attempts.max(1);
        if attempts < limit {
            return TurnState::Repair;
        }

        let diagnostics: Vec<Diagnostic> = turn
            .attempts
            .last()
            .map(|a| a.validation.errors().cloned().collect())
            .unwrap_or_default();
        warn!(turn_id = %turn.id, attempts, "Repair attempts exhausted");
        fail(
            turn,
            FailureKind::RepairExhausted,
            format!("Could not produce a valid query after {attempts} attempts."),
            diagnostics,
        )
    }

    fn plan_repair(&self, turn: &mut Turn, work: &TurnWork) -> TurnState {
        if let Some(last) = work.repair.attempts().last() {
            let first_error = last
                .validation
                .errors()
                .next()
                .map(|d| d.message.clone())
                .unwrap_or_default();
            info!(
                turn_id = %turn.id,
                attempt = last.candidate.attempt_number,
                "Repairing rejected query: {first_error}"
            );
            turn.plan.push(format!(
                "Attempt {} was rejected ({first_error}); revise the query.",
                last.candidate.attempt_number
            ));
        }
        TurnState::Synthesize
    }

    async fn execute(
        &self,
        turn: &mut Turn,
        work: &mut TurnWork,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<TurnState, AgentError> {
        let Some(query) = work.validated.take() else {
            return Ok(fail(
                turn,
                FailureKind::InvalidQuery,
                "No validated query is available to run.".to_string(),
                vec![],
            ));
        };
        if *cancel.borrow() {
            return Err(AgentError::Cancelled);
        }

        let limits = RunLimits {
            row_cap: self.config.row_cap,
            timeout: self.config.execution_timeout(),
        };
        turn.sql = Some(query.sql().to_string());
        info!(turn_id = %turn.id, row_cap = limits.row_cap, timeout = ?limits.timeout, "Executing validated query");

        let started = Instant::now();
        let run = tokio::time::timeout(limits.timeout, self.tools.sql_runner(query.sql(), limits));
        let outcome = tokio::select! {
            outcome = run => outcome,
            _ = cancelled(cancel) => {
                warn!(turn_id = %turn.id, "Execution cancelled");
                return Err(AgentError::Cancelled);
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (kind, message) = match outcome {
            Ok(Ok(rows)) => {
                let execution = ExecutionResult {
                    columns: rows.columns,
                    row_count: rows.rows.len(),
                    rows: rows.rows,
                    truncated: rows.truncated,
                    elapsed_ms,
                };
                turn.tool_calls.push(ToolCallRecord {
                    tool: ToolName::SqlRunner,
                    input: query.sql().to_string(),
                    ok: true,
                    detail: format!(
                        "{} rows{}",
                        execution.row_count,
                        if execution.truncated { " (truncated)" } else { "" }
                    ),
                    elapsed_ms,
                    cached: false,
                });
                work.execution = Some(execution);
                return Ok(TurnState::Summarize);
            }
            Ok(Err(AgentError::ExecutionTimeout(after))) => {
                (FailureKind::ExecutionTimeout, timeout_message(after))
            }
            Err(_) => (FailureKind::ExecutionTimeout, timeout_message(limits.timeout)),
            Ok(Err(e)) => (FailureKind::ExecutionError, e.to_string()),
        };

        turn.tool_calls.push(ToolCallRecord {
            tool: ToolName::SqlRunner,
            input: query.sql().to_string(),
            ok: false,
            detail: message.clone(),
            elapsed_ms,
            cached: false,
        });
        Ok(fail(turn, kind, message, vec![]))
    }

    fn summarize(&self, turn: &mut Turn, work: &mut TurnWork) -> TurnState {
        if let Some(execution) = work.execution.take() {
            turn.summary = Some(self.summarizer.summarize(&execution));
            turn.execution = Some(execution);
        }
        turn.finalize(TurnOutcome::QueryAnswered);
        TurnState::Done
    }
}

fn fail(turn: &mut Turn, kind: FailureKind, message: String, diagnostics: Vec<Diagnostic>) -> TurnState {
    info!(turn_id = %turn.id, ?kind, "Turn failed: {message}");
    turn.finalize(TurnOutcome::Failed {
        kind,
        message,
        diagnostics,
    });
    TurnState::Failed
}

/// Resolves once the session signals cancellation. Never resolves if the
/// sender is gone without signalling.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn timeout_message(after: Duration) -> String {
    format!("The query did not finish within {} seconds.", after.as_secs())
}

fn normalize_search(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
