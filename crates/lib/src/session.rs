//! # Sessions and Turns
//!
//! A [`Session`] is one conversation: its finalized turns in order, plus the
//! discovery cache of the previous turn. [`SessionStore`] maps thread ids to
//! sessions and owns the cancellation signal of each thread.

use crate::{
    summarizer::NO_RECORDS,
    types::{
        AttemptRecord, ExecutionResult, Intent, ResultSummary, TableCandidate, ToolCallRecord,
        TurnOutcome, TurnState,
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// One user utterance and everything the agent did for it.
///
/// A turn is assembled by the controller and handed to its session once it has
/// an outcome; the session only gives out shared references afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub id: Uuid,
    pub utterance: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Every state the controller entered, in order.
    pub states: Vec<TurnState>,
    /// Human-readable plan steps, for transparency.
    pub plan: Vec<String>,
    pub intent: Option<Intent>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub tables: Vec<TableCandidate>,
    pub attempts: Vec<AttemptRecord>,
    /// The query that was executed, if any.
    pub sql: Option<String>,
    pub execution: Option<ExecutionResult>,
    pub summary: Option<ResultSummary>,
    pub outcome: Option<TurnOutcome>,
}

impl Turn {
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            utterance: utterance.into(),
            started_at: Utc::now(),
            finished_at: None,
            states: Vec::new(),
            plan: Vec::new(),
            intent: None,
            tool_calls: Vec::new(),
            tables: Vec::new(),
            attempts: Vec::new(),
            sql: None,
            execution: None,
            summary: None,
            outcome: None,
        }
    }

    pub fn enter(&mut self, state: TurnState) {
        self.states.push(state);
    }

    pub fn current_state(&self) -> Option<TurnState> {
        self.states.last().copied()
    }

    pub fn visited(&self, state: TurnState) -> bool {
        self.states.contains(&state)
    }

    pub fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn finalize(&mut self, outcome: TurnOutcome) {
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    /// A language-neutral one-paragraph account of the answer, used as history.
    pub fn brief(&self) -> String {
        match &self.outcome {
            Some(TurnOutcome::Answered { text }) => text.clone(),
            Some(TurnOutcome::TablesListed) => format!(
                "Listed tables: {}",
                self.tables
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Some(TurnOutcome::QueryAnswered) => {
                let highlights = self
                    .summary
                    .as_ref()
                    .map(|s| s.highlights.join(" "))
                    .unwrap_or_else(|| NO_RECORDS.to_string());
                match &self.sql {
                    Some(sql) => format!("Ran `{sql}`. {highlights}"),
                    None => highlights,
                }
            }
            Some(TurnOutcome::Failed { message, .. }) => format!("Failed: {message}"),
            None => String::new(),
        }
    }
}

/// Discovery output kept for reuse by the next turn of the same session.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryCache {
    pub search_query: String,
    pub tables: Vec<TableCandidate>,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: Vec<Turn>,
    discovery: Option<DiscoveryCache>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            discovery: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Appends a finalized turn and returns a shared reference to it.
    pub(crate) fn push_turn(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub(crate) fn discovery(&self) -> Option<&DiscoveryCache> {
        self.discovery.as_ref()
    }

    pub(crate) fn remember_discovery(&mut self, search_query: String, tables: Vec<TableCandidate>) {
        self.discovery = Some(DiscoveryCache {
            search_query,
            tables,
        });
    }

    /// The last `n` turns as `User:`/`Assistant:` lines.
    pub fn history_text(&self, n: usize) -> String {
        let skip = self.turns.len().saturating_sub(n);
        self.turns
            .iter()
            .skip(skip)
            .map(|t| format!("User: {}\nAssistant: {}", t.utterance, t.brief()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A live session and the sender that cancels its in-flight execution.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session: Arc<Mutex<Session>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    fn new(thread_id: &str) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            session: Arc::new(Mutex::new(Session::new(thread_id))),
            cancel: Arc::new(cancel),
        }
    }

    /// A receiver that flips to `true` when the thread is reset.
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }
}

/// All open conversations, keyed by thread id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, thread_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(thread_id) {
            return handle.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                info!(thread_id, "Opening new session");
                SessionHandle::new(thread_id)
            })
            .clone()
    }

    /// Drops a thread and cancels any execution it has in flight.
    /// Returns whether the thread existed.
    pub async fn reset(&self, thread_id: &str) -> bool {
        match self.sessions.write().await.remove(thread_id) {
            Some(handle) => {
                handle.cancel.send_replace(true);
                info!(thread_id, "Session reset");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered(utterance: &str, text: &str) -> Turn {
        let mut turn = Turn::new(utterance);
        turn.finalize(TurnOutcome::Answered {
            text: text.to_string(),
        });
        turn
    }

    #[test]
    fn history_keeps_only_the_last_turns() {
        let mut session = Session::new("t1");
        session.push_turn(answered("hi", "Hello!"));
        session.push_turn(answered("thanks", "You're welcome."));
        assert_eq!(
            session.history_text(1),
            "User: thanks\nAssistant: You're welcome."
        );
        assert_eq!(session.history_text(10).lines().count(), 4);
    }

    #[tokio::test]
    async fn reset_cancels_and_forgets_the_thread() {
        let store = SessionStore::new();
        let handle = store.get_or_create("t1").await;
        let cancel = handle.cancellation();
        assert!(!*cancel.borrow());

        assert!(store.reset("t1").await);
        assert!(*cancel.borrow());
        assert!(store.is_empty().await);
        assert!(!store.reset("t1").await);
    }
}
