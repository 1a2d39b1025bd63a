//! # Lake Store
//!
//! Read-only access to the business tables: the backend behind `sql_checker`
//! and `sql_runner`, plus introspection used to seed the metadata catalog.

use super::{quote_ident, turso_value_to_json};
use crate::{
    constants::CATALOG_TABLE,
    errors::AgentError,
    tools::{ensure_read_only, CheckReport, ResultSet, RunLimits},
    types::{ColumnDocument, TableDocument},
};
use std::fmt::{self, Debug};
use tracing::{debug, info, warn};
use turso::{Connection, Database, Value as TursoValue};

/// A store over the lake database.
///
/// Cloning shares the underlying `Database`, so clones see the same file or
/// in-memory instance.
#[derive(Clone)]
pub struct LakeStore {
    db: Database,
}

impl LakeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn connect(&self) -> Result<Connection, AgentError> {
        self.db
            .connect()
            .map_err(|e| AgentError::StorageConnection(e.to_string()))
    }

    /// Executes a batch of `;`-separated statements. Used to load fixtures and
    /// seed local lakes; never reachable from the tool port.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), AgentError> {
        let conn = self.connect()?;
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }

    /// Compiles a query without running it.
    ///
    /// A statement the backend rejects is reported in the `CheckReport`; only
    /// connection problems surface as errors.
    pub async fn check(&self, query: &str) -> Result<CheckReport, AgentError> {
        if let Err(e) = ensure_read_only(query) {
            return Ok(CheckReport::failed(e.to_string()));
        }
        let conn = self.connect()?;
        match conn.prepare(query).await {
            Ok(_) => Ok(CheckReport::passed()),
            Err(e) => {
                debug!(error = %e, "sql_checker rejected statement");
                Ok(CheckReport::failed(e.to_string()))
            }
        }
    }

    /// Runs a read-only query, reading at most `row_cap` rows, under `timeout`.
    pub async fn run(&self, query: &str, limits: RunLimits) -> Result<ResultSet, AgentError> {
        ensure_read_only(query)?;
        match tokio::time::timeout(limits.timeout, self.fetch(query, limits.row_cap)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?limits.timeout, "Lake query timed out");
                Err(AgentError::ExecutionTimeout(limits.timeout))
            }
        }
    }

    async fn fetch(&self, query: &str, row_cap: usize) -> Result<ResultSet, AgentError> {
        debug!(query = %query, row_cap, "--> Executing lake query");
        let conn = self.connect()?;
        let mut stmt = conn.prepare(query).await?;

        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = stmt.query(()).await?;
        let mut out = Vec::new();
        let mut truncated = false;

        // One look-ahead row tells us whether the cap cut anything off.
        while let Some(row) = rows.next().await? {
            if out.len() == row_cap {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(turso_value_to_json(row.get_value(i)?));
            }
            out.push(values);
        }

        info!(rows = out.len(), truncated, "<-- Lake query finished");
        Ok(ResultSet {
            columns,
            rows: out,
            truncated,
        })
    }

    /// Lists the user tables of the lake, excluding the metadata catalog.
    pub async fn list_tables(&self) -> Result<Vec<String>, AgentError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name;",
                (),
            )
            .await?;

        let mut tables = Vec::new();
        while let Some(row) = rows.next().await? {
            if let Ok(TursoValue::Text(name)) = row.get_value(0) {
                if name != CATALOG_TABLE {
                    tables.push(name);
                }
            }
        }
        Ok(tables)
    }

    /// Builds catalog documents from the lake's own schema, with up to
    /// `max_samples` distinct sample values per column.
    ///
    /// Descriptions are left empty; they come from curated ingestion.
    pub async fn describe_tables(
        &self,
        max_samples: usize,
    ) -> Result<Vec<TableDocument>, AgentError> {
        let conn = self.connect()?;
        let mut documents = Vec::new();

        for table in self.list_tables().await? {
            let mut rows = conn
                .query(&format!("PRAGMA table_info({});", quote_ident(&table)), ())
                .await?;

            let mut columns = Vec::new();
            // PRAGMA table_info columns: cid, name, type, notnull, dflt_value, pk
            while let Some(row) = rows.next().await? {
                if let Ok(TursoValue::Text(name)) = row.get_value(1) {
                    let col_type = match row.get_value(2) {
                        Ok(TursoValue::Text(t)) => t,
                        _ => String::new(),
                    };
                    columns.push(ColumnDocument {
                        col_name: name,
                        col_type,
                        column_display_name: String::new(),
                        col_description: String::new(),
                        business_attribute: Vec::new(),
                        sample_values: Vec::new(),
                    });
                }
            }

            for column in &mut columns {
                column.sample_values =
                    sample_values(&conn, &table, &column.col_name, max_samples).await?;
            }

            documents.push(TableDocument {
                table_display_name: table.clone(),
                table_name: table,
                table_desc: String::new(),
                table_domain: String::new(),
                is_dimension: false,
                columns,
                hierarchy: Vec::new(),
            });
        }

        info!("Described {} lake tables.", documents.len());
        Ok(documents)
    }
}

async fn sample_values(
    conn: &Connection,
    table: &str,
    column: &str,
    limit: usize,
) -> Result<Vec<String>, AgentError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let col = quote_ident(column);
    let sql = format!(
        "SELECT DISTINCT {col} FROM {} WHERE {col} IS NOT NULL LIMIT {limit};",
        quote_ident(table)
    );
    let mut rows = conn.query(&sql, ()).await?;
    let mut samples = Vec::new();
    while let Some(row) = rows.next().await? {
        match row.get_value(0)? {
            TursoValue::Text(s) => samples.push(s),
            TursoValue::Integer(i) => samples.push(i.to_string()),
            TursoValue::Real(f) => samples.push(f.to_string()),
            TursoValue::Null | TursoValue::Blob(_) => {}
        }
    }
    Ok(samples)
}

impl Debug for LakeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LakeStore").finish_non_exhaustive()
    }
}
