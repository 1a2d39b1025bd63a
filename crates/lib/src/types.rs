//! # Core Data Model
//!
//! Types shared by every stage of a turn: catalog documents, table candidates,
//! the schema context, query candidates and their validation, execution results
//! and summaries, and the controller's state and outcome enums.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// --- Catalog documents (ingestion shape) ---

/// A column entry of a catalog table document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDocument {
    pub col_name: String,
    #[serde(default)]
    pub col_type: String,
    #[serde(default)]
    pub column_display_name: String,
    #[serde(default)]
    pub col_description: String,
    #[serde(default)]
    pub business_attribute: Vec<String>,
    #[serde(default)]
    pub sample_values: Vec<String>,
}

/// A table entry of the metadata catalog, in the semantic-JSON layout used for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub table_name: String,
    #[serde(default)]
    pub table_display_name: String,
    #[serde(default)]
    pub table_desc: String,
    #[serde(default)]
    pub table_domain: String,
    #[serde(default)]
    pub is_dimension: bool,
    #[serde(default)]
    pub columns: Vec<ColumnDocument>,
    #[serde(default)]
    pub hierarchy: Vec<String>,
}

impl TableDocument {
    /// The text used for keyword matching and embedding of this table.
    pub fn search_text(&self) -> String {
        let mut text = format!(
            "{} {} {} {}",
            self.table_display_name, self.table_name, self.table_desc, self.table_domain
        );
        for column in &self.columns {
            text.push(' ');
            text.push_str(&format!(
                "{} {} {} {}",
                column.column_display_name,
                column.col_name,
                column.col_description,
                column.business_attribute.join(" ")
            ));
        }
        text
    }
}

// --- Discovery and schema context ---

/// A column of a discovered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub description: String,
}

/// A table returned by discovery, ranked by relevance to the user's request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCandidate {
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnInfo>,
    pub sample_values: BTreeMap<String, Vec<String>>,
    pub relevance_score: f64,
}

impl TableCandidate {
    /// The identity used for deduplication: the case-folded table name.
    pub fn identity(&self) -> String {
        self.name.to_lowercase()
    }

    /// Looks up a column by name, ignoring case.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// The bounded, deduplicated set of tables that grounds synthesis and validation for one turn.
///
/// A context is built once per turn by the `SchemaContextBuilder` and replaced wholesale
/// on re-discovery; it exposes no mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaContext {
    tables: Vec<TableCandidate>,
    dropped: Vec<String>,
}

impl SchemaContext {
    pub(crate) fn new(tables: Vec<TableCandidate>, dropped: Vec<String>) -> Self {
        Self { tables, dropped }
    }

    /// The selected tables, in descending relevance order.
    pub fn tables(&self) -> &[TableCandidate] {
        &self.tables
    }

    /// Names of tables that were discovered but left out to respect the context budget.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Finds a table by name. Qualified names (`schema.table`) also match on their last segment.
    pub fn table(&self, name: &str) -> Option<&TableCandidate> {
        let last = name.rsplit('.').next().unwrap_or(name);
        self.tables.iter().find(|t| {
            t.name.eq_ignore_ascii_case(name)
                || t.name.eq_ignore_ascii_case(last)
                || t.name.rsplit('.').next().is_some_and(|n| n.eq_ignore_ascii_case(last))
        })
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Renders the context as prompt text for the synthesizer.
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(render_table)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub(crate) fn render_table(table: &TableCandidate) -> String {
    let mut out = format!("## Table `{}`\n{}\nColumns:", table.name, table.description);
    for column in &table.columns {
        out.push_str(&format!("\n- `{}` ({})", column.name, column.data_type));
        if !column.description.is_empty() {
            out.push_str(&format!(": {}", column.description));
        }
        if let Some(samples) = table.sample_values.get(&column.name) {
            if !samples.is_empty() {
                out.push_str(&format!(" | samples: {}", samples.join(", ")));
            }
        }
    }
    out
}

// --- Synthesis and validation ---

/// One synthesized SQL statement for a turn. A turn holds one candidate per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCandidate {
    pub sql_text: String,
    pub rationale: String,
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding, specific enough to drive a repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.location {
            Some(location) => write!(f, "{level} ({location}): {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

/// The validator's verdict on exactly one [`QueryCandidate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub attempt_number: u32,
    pub sql_text: String,
    pub is_valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Builds the result for `candidate`; it is valid iff no diagnostic has error severity.
    pub fn for_candidate(candidate: &QueryCandidate, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            attempt_number: candidate.attempt_number,
            sql_text: candidate.sql_text.clone(),
            is_valid: !diagnostics.iter().any(Diagnostic::is_error),
            diagnostics,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// A candidate whose own validation passed. This is the only input EXECUTE accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    candidate: QueryCandidate,
}

impl ValidatedQuery {
    /// Returns `None` unless `validation` belongs to `candidate` and is valid.
    pub fn new(candidate: QueryCandidate, validation: &ValidationResult) -> Option<Self> {
        let belongs = validation.attempt_number == candidate.attempt_number
            && validation.sql_text == candidate.sql_text;
        (belongs && validation.is_valid).then_some(Self { candidate })
    }

    pub fn sql(&self) -> &str {
        &self.candidate.sql_text
    }

    pub fn candidate(&self) -> &QueryCandidate {
        &self.candidate
    }
}

// --- Execution and summary ---

/// Rows returned by EXECUTE, bounded by the row cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
}

/// A bounded, presentation-ready reduction of an [`ExecutionResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub highlights: Vec<String>,
    pub key_metrics: BTreeMap<String, Value>,
}

// --- Controller ---

/// The classifier's decision for a turn, evaluated exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// No tool is needed. `answer` holds the reply when the classifier already produced one.
    DirectAnswer { answer: Option<String> },
    /// The user wants to know what data exists.
    DiscoveryOnly { search_query: String },
    /// The user wants query results.
    FullPipeline {
        search_query: String,
        question: String,
    },
    /// Not enough information to proceed; `question` asks the user for what is missing.
    NeedsClarification { question: String },
}

/// The states of the turn controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    Classify,
    DirectAnswer,
    Discover,
    Synthesize,
    Validate,
    Repair,
    Execute,
    Summarize,
    Done,
    Failed,
}

impl TurnState {
    pub const ALL: [TurnState; 10] = [
        TurnState::Classify,
        TurnState::DirectAnswer,
        TurnState::Discover,
        TurnState::Synthesize,
        TurnState::Validate,
        TurnState::Repair,
        TurnState::Execute,
        TurnState::Summarize,
        TurnState::Done,
        TurnState::Failed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Classify => "CLASSIFY",
            TurnState::DirectAnswer => "DIRECT_ANSWER",
            TurnState::Discover => "DISCOVER",
            TurnState::Synthesize => "SYNTHESIZE",
            TurnState::Validate => "VALIDATE",
            TurnState::Repair => "REPAIR",
            TurnState::Execute => "EXECUTE",
            TurnState::Summarize => "SUMMARIZE",
            TurnState::Done => "DONE",
            TurnState::Failed => "FAILED",
        }
    }

    /// The states reachable from this one.
    pub fn successors(&self) -> &'static [TurnState] {
        use TurnState::*;
        match self {
            Classify => &[DirectAnswer, Discover, Failed],
            DirectAnswer => &[Done],
            Discover => &[Synthesize, Done, Failed],
            Synthesize => &[Validate, Repair, Failed],
            Validate => &[Execute, Repair, Failed],
            Repair => &[Synthesize],
            Execute => &[Summarize, Failed],
            Summarize => &[Done],
            Done | Failed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a turn ended in `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    IntentAmbiguous,
    NoRelevantTables,
    InvalidQuery,
    RepairExhausted,
    ExecutionTimeout,
    ExecutionError,
}

/// How a finalized turn ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Answered without tools.
    Answered { text: String },
    /// Discovery-only request; the tables are on the turn.
    TablesListed,
    /// Full pipeline completed; execution and summary are on the turn.
    QueryAnswered,
    Failed {
        kind: FailureKind,
        message: String,
        diagnostics: Vec<Diagnostic>,
    },
}

/// The three tools the controller can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    TableSearcher,
    SqlChecker,
    SqlRunner,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::TableSearcher,
        ToolName::SqlChecker,
        ToolName::SqlRunner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::TableSearcher => "table_searcher",
            ToolName::SqlChecker => "sql_checker",
            ToolName::SqlRunner => "sql_runner",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::TableSearcher => "Search for relevant tables based on a query. Returns table descriptions, columns and sample values.",
            ToolName::SqlChecker => "Validate a read-only SQL query without running it. Never mutates data.",
            ToolName::SqlRunner => "Run a validated read-only SQL query under a row cap and timeout.",
        }
    }
}

/// A record of one tool call made during a turn, kept for transparency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: ToolName,
    pub input: String,
    pub ok: bool,
    pub detail: String,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub cached: bool,
}

/// One synthesis attempt together with its validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub candidate: QueryCandidate,
    pub validation: ValidationResult,
}
