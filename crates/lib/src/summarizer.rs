//! # Result Summarization
//!
//! Reduces an [`ExecutionResult`] to a few highlights and key metrics without
//! re-querying. Empty and truncated results are summarized like any other.

use crate::types::{ExecutionResult, ResultSummary};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const NO_RECORDS: &str = "No matching records were found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSummarizer {
    top_n: usize,
    max_highlights: usize,
}

impl ResultSummarizer {
    pub fn new(top_n: usize, max_highlights: usize) -> Self {
        Self {
            top_n,
            max_highlights: max_highlights.max(1),
        }
    }

    pub fn summarize(&self, execution: &ExecutionResult) -> ResultSummary {
        let mut highlights = Vec::new();
        let mut key_metrics = BTreeMap::new();
        key_metrics.insert("row_count".to_string(), json!(execution.row_count));

        if execution.rows.is_empty() {
            highlights.push(NO_RECORDS.to_string());
            return ResultSummary {
                highlights,
                key_metrics,
            };
        }

        if execution.truncated {
            highlights.push(format!(
                "Only the first {} rows are shown; the full result is larger.",
                execution.row_count
            ));
        }

        let measures = measure_columns(execution);
        let label = label_column(execution, &measures);

        // A single value answers the question on its own.
        if execution.rows.len() == 1 && execution.columns.len() == 1 {
            let value = &execution.rows[0][0];
            highlights.push(format!("{}: {}", execution.columns[0], format_value(value)));
            key_metrics.insert(execution.columns[0].clone(), value.clone());
            return self.bounded(highlights, key_metrics);
        }

        if let Some(&measure) = measures.first() {
            if let Some(top) = top_row(execution, measure) {
                let value = format_value(&execution.rows[top][measure]);
                let measure_name = &execution.columns[measure];
                match label {
                    Some(label) => highlights.push(format!(
                        "Top {}: {} with {} of {}",
                        execution.columns[label],
                        format_value(&execution.rows[top][label]),
                        measure_name,
                        value
                    )),
                    None => highlights.push(format!("Highest {measure_name}: {value}")),
                }
            }
        } else {
            highlights.push(format!(
                "{} row{} returned.",
                execution.row_count,
                if execution.row_count == 1 { "" } else { "s" }
            ));
        }

        for &measure in &measures {
            let name = &execution.columns[measure];
            let values: Vec<f64> = execution
                .rows
                .iter()
                .filter_map(|row| row.get(measure).and_then(as_f64))
                .collect();
            if values.is_empty() {
                continue;
            }
            let total: f64 = values.iter().sum();
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            key_metrics.insert(format!("total_{name}"), number(total));
            key_metrics.insert(format!("max_{name}"), number(max));
            key_metrics.insert(format!("min_{name}"), number(min));
            key_metrics.insert(
                format!("avg_{name}"),
                number(round2(total / values.len() as f64)),
            );
        }

        let rows = ranked_rows(execution, measures.first().copied());
        for (rank, &row) in rows.iter().take(self.top_n).enumerate() {
            let cells = execution
                .columns
                .iter()
                .zip(&execution.rows[row])
                .map(|(c, v)| format!("{c}={}", format_value(v)))
                .collect::<Vec<_>>()
                .join(", ");
            highlights.push(format!("#{} {cells}", rank + 1));
        }

        self.bounded(highlights, key_metrics)
    }

    fn bounded(
        &self,
        mut highlights: Vec<String>,
        key_metrics: BTreeMap<String, Value>,
    ) -> ResultSummary {
        highlights.truncate(self.max_highlights);
        ResultSummary {
            highlights,
            key_metrics,
        }
    }
}

/// Identifier-like columns are labels, never measures.
fn is_identifier(column: &str) -> bool {
    let c = column.to_lowercase();
    c == "id" || c.ends_with("_id") || c.ends_with("_code") || c.ends_with("_key")
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Numeric, non-identifier columns, in column order.
fn measure_columns(execution: &ExecutionResult) -> Vec<usize> {
    (0..execution.columns.len())
        .filter(|&i| !is_identifier(&execution.columns[i]))
        .filter(|&i| {
            let mut non_null = execution.rows.iter().filter_map(|r| r.get(i)).filter(|v| !v.is_null());
            let mut any = false;
            let all_numeric = non_null.all(|v| {
                any = true;
                v.is_number()
            });
            any && all_numeric
        })
        .collect()
}

/// The first non-measure column, preferring text over identifiers.
fn label_column(execution: &ExecutionResult, measures: &[usize]) -> Option<usize> {
    let candidates: Vec<usize> = (0..execution.columns.len())
        .filter(|i| !measures.contains(i))
        .collect();
    candidates
        .iter()
        .copied()
        .find(|&i| !is_identifier(&execution.columns[i]))
        .or_else(|| candidates.first().copied())
}

fn top_row(execution: &ExecutionResult, measure: usize) -> Option<usize> {
    ranked_rows(execution, Some(measure)).first().copied()
}

/// Row indices ordered by `measure` descending (stable), or in result order.
fn ranked_rows(execution: &ExecutionResult, measure: Option<usize>) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..execution.rows.len()).collect();
    if let Some(m) = measure {
        let key = |i: usize| execution.rows[i].get(m).and_then(as_f64).unwrap_or(f64::MIN);
        rows.sort_by(|&a, &b| {
            key(b)
                .partial_cmp(&key(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    rows
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        json!(v as i64)
    } else {
        json!(round2(v))
    }
}

/// Integers print without decimals, other numbers with two.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            (None, Some(f)) => format!("{f:.2}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
