//! # Table Discovery
//!
//! Ranked retrieval of table metadata over `table_searcher`. Catalog hits are
//! converted to [`TableCandidate`]s, deduplicated by table name, ordered by
//! descending relevance and cut to `k`.

use crate::{
    errors::AgentError,
    tools::{TableDescriptor, ToolPort},
    types::{ColumnDocument, ColumnInfo, TableCandidate},
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const CODED_SUFFIXES: &[&str] = &["_id", "_code", "_key"];
const READABLE_SUFFIXES: &[&str] = &["_name", "_label", "_title", "_desc"];

#[derive(Clone, Debug)]
pub struct TableDiscovery {
    tools: Box<dyn ToolPort>,
}

impl TableDiscovery {
    pub fn new(tools: Box<dyn ToolPort>) -> Self {
        Self { tools }
    }

    /// Returns at most `k` distinct tables for `query`, most relevant first.
    ///
    /// An empty result is not an error.
    pub async fn discover(&self, query: &str, k: usize) -> Result<Vec<TableCandidate>, AgentError> {
        let hits = self.tools.table_searcher(query).await?;
        debug!(hits = hits.len(), "table_searcher returned");
        let candidates = rank_candidates(hits.into_iter().map(to_candidate).collect(), k);
        info!(
            tables = ?candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Discovered tables for '{query}'"
        );
        Ok(candidates)
    }
}

/// Dedupes by table identity keeping the best score, sorts by descending score
/// (stable, so equal scores keep retrieval order) and truncates to `k`.
pub fn rank_candidates(candidates: Vec<TableCandidate>, k: usize) -> Vec<TableCandidate> {
    let mut best: Vec<TableCandidate> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        match index.get(&candidate.identity()) {
            Some(&i) => {
                if candidate.relevance_score > best[i].relevance_score {
                    best[i] = candidate;
                }
            }
            None => {
                index.insert(candidate.identity(), best.len());
                best.push(candidate);
            }
        }
    }

    best.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    best.truncate(k);
    best
}

fn to_candidate(hit: TableDescriptor) -> TableCandidate {
    let table = hit.table;

    let mut description = if !table.table_display_name.is_empty()
        && !table.table_display_name.eq_ignore_ascii_case(&table.table_name)
    {
        format!("{}: {}", table.table_display_name, table.table_desc)
    } else {
        table.table_desc.clone()
    };
    if !table.table_domain.is_empty() {
        description.push_str(&format!(" Domain: {}.", table.table_domain));
    }
    if table.is_dimension {
        description.push_str(" Dimension table.");
    }
    if !table.hierarchy.is_empty() {
        description.push_str(&format!(" Hierarchy: {}.", table.hierarchy.join(" > ")));
    }
    if let Some(hint) = readable_column_hint(&table.columns) {
        description.push(' ');
        description.push_str(&hint);
    }

    let sample_values: BTreeMap<String, Vec<String>> = table
        .columns
        .iter()
        .filter(|c| !c.sample_values.is_empty())
        .map(|c| (c.col_name.clone(), c.sample_values.clone()))
        .collect();

    let columns = table.columns.into_iter().map(to_column_info).collect();

    TableCandidate {
        name: table.table_name,
        description: description.trim().to_string(),
        columns,
        sample_values,
        relevance_score: hit.score,
    }
}

fn to_column_info(column: ColumnDocument) -> ColumnInfo {
    let mut parts = Vec::new();
    if !column.column_display_name.is_empty() {
        parts.push(column.column_display_name);
    }
    if !column.col_description.is_empty() {
        parts.push(column.col_description);
    }
    if !column.business_attribute.is_empty() {
        parts.push(format!("[{}]", column.business_attribute.join(", ")));
    }
    ColumnInfo {
        name: column.col_name,
        data_type: column.col_type,
        description: parts.join(" - "),
    }
}

/// Names the readable columns to prefer over coded identifiers with the same stem,
/// e.g. `customer_name` over `customer_id`.
pub fn readable_column_hint(columns: &[ColumnDocument]) -> Option<String> {
    let names: Vec<String> = columns.iter().map(|c| c.col_name.to_lowercase()).collect();
    let mut pairs = Vec::new();

    for (i, name) in names.iter().enumerate() {
        let Some(stem) = CODED_SUFFIXES.iter().find_map(|s| name.strip_suffix(s)) else {
            continue;
        };
        let readable = names.iter().position(|other| {
            READABLE_SUFFIXES
                .iter()
                .any(|s| other.strip_suffix(s) == Some(stem))
        });
        if let Some(j) = readable {
            pairs.push(format!(
                "`{}` over `{}`",
                columns[j].col_name, columns[i].col_name
            ));
        }
    }

    (!pairs.is_empty()).then(|| format!("Prefer readable columns: {}.", pairs.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> ColumnDocument {
        ColumnDocument {
            col_name: name.to_string(),
            col_type: "TEXT".to_string(),
            column_display_name: String::new(),
            col_description: String::new(),
            business_attribute: vec![],
            sample_values: vec![],
        }
    }

    fn candidate(name: &str, score: f64) -> TableCandidate {
        TableCandidate {
            name: name.to_string(),
            description: String::new(),
            columns: vec![],
            sample_values: BTreeMap::new(),
            relevance_score: score,
        }
    }

    #[test]
    fn ranking_dedupes_and_sorts_descending() {
        let ranked = rank_candidates(
            vec![
                candidate("orders", 0.4),
                candidate("customers", 0.9),
                candidate("ORDERS", 0.7),
                candidate("products", 0.1),
            ],
            2,
        );
        let names: Vec<_> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "ORDERS"]);
    }

    #[test]
    fn hint_prefers_names_over_codes() {
        let hint = readable_column_hint(&[
            column("customer_id"),
            column("customer_name"),
            column("region_code"),
            column("revenue"),
        ]);
        assert_eq!(
            hint.as_deref(),
            Some("Prefer readable columns: `customer_name` over `customer_id`.")
        );
        assert_eq!(readable_column_hint(&[column("order_id")]), None);
    }
}
