//! # Tool Capability Interface
//!
//! The controller reaches the outside world only through [`ToolPort`], which exposes
//! exactly three tools. The production implementation, [`LakeTools`], composes the
//! metadata catalog with the lake store; tests inject scripted implementations.

use crate::{
    errors::AgentError,
    providers::db::{catalog::CatalogStore, lake::LakeStore},
    types::TableDocument,
};
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlparser::{ast::Statement, dialect::SQLiteDialect, parser::Parser};
use std::fmt::Debug;
use std::time::Duration;

/// A catalog hit returned by `table_searcher`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(flatten)]
    pub table: TableDocument,
    pub score: f64,
}

/// The outcome of `sql_checker`. `ok == false` carries the backend's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub ok: bool,
    pub message: Option<String>,
}

impl CheckReport {
    pub fn passed() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// The caller-specified bounds for `sql_runner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub row_cap: usize,
    pub timeout: Duration,
}

/// Rows produced by `sql_runner`. `truncated` is set when more rows than `row_cap` existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub truncated: bool,
}

/// The three tool-call boundaries the controller depends on.
///
/// Implementations must be safe for concurrent use from independent controllers.
#[async_trait]
pub trait ToolPort: Send + Sync + Debug + DynClone {
    /// Semantic/keyword search over table metadata. Read-only and idempotent.
    async fn table_searcher(&self, query: &str) -> Result<Vec<TableDescriptor>, AgentError>;

    /// Checks a query without mutating data or returning rows.
    async fn sql_checker(&self, query: &str) -> Result<CheckReport, AgentError>;

    /// Runs a query, honouring `limits`. The only side-effecting tool.
    async fn sql_runner(&self, query: &str, limits: RunLimits) -> Result<ResultSet, AgentError>;
}

dyn_clone::clone_trait_object!(ToolPort);

/// Rejects anything other than a single query statement (`SELECT`, `WITH`, `VALUES`).
///
/// The text is parsed with the SQLite dialect of the lake, so literals, comments and
/// parenthesised queries are handled the way the backend sees them.
pub fn ensure_read_only(query: &str) -> Result<(), AgentError> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, query)
        .map_err(|e| AgentError::NotReadOnly(e.to_string()))?;
    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [] => Err(AgentError::NotReadOnly("the query text is empty".to_string())),
        [_] => Err(AgentError::NotReadOnly(
            "the statement is not a query".to_string(),
        )),
        _ => Err(AgentError::NotReadOnly(format!(
            "expected one statement, found {}",
            statements.len()
        ))),
    }
}

/// The production tool port: catalog search plus the lake store.
#[derive(Clone, Debug)]
pub struct LakeTools {
    catalog: CatalogStore,
    lake: LakeStore,
    search_limit: usize,
}

impl LakeTools {
    pub fn new(catalog: CatalogStore, lake: LakeStore, search_limit: usize) -> Self {
        Self {
            catalog,
            lake,
            search_limit,
        }
    }
}

#[async_trait]
impl ToolPort for LakeTools {
    async fn table_searcher(&self, query: &str) -> Result<Vec<TableDescriptor>, AgentError> {
        self.catalog.search(query, self.search_limit).await
    }

    async fn sql_checker(&self, query: &str) -> Result<CheckReport, AgentError> {
        self.lake.check(query).await
    }

    async fn sql_runner(&self, query: &str, limits: RunLimits) -> Result<ResultSet, AgentError> {
        self.lake.run(query, limits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_guard_accepts_select_and_with() {
        assert!(ensure_read_only("SELECT 1").is_ok());
        assert!(ensure_read_only("  with t as (select 1) select * from t;").is_ok());
        assert!(ensure_read_only("-- top rows\n(SELECT 1)").is_ok());
    }

    #[test]
    fn read_only_guard_ignores_semicolons_inside_literals() {
        assert!(ensure_read_only(
            "SELECT customer_name FROM customers WHERE region = 'a;b' LIMIT 5"
        )
        .is_ok());
    }

    #[test]
    fn read_only_guard_rejects_writes_and_stacked_statements() {
        assert!(ensure_read_only("DELETE FROM orders").is_err());
        assert!(ensure_read_only("").is_err());
        assert!(matches!(
            ensure_read_only("SELECT 1; DROP TABLE orders"),
            Err(AgentError::NotReadOnly(msg)) if msg.contains("found 2")
        ));
    }
}
