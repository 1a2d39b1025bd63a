//! # Terminal Output
//!
//! Formats a structured turn for the terminal: the answer first, then the
//! transparency block (plan, tool calls, SQL) when verbose.

use memento::{summarizer::format_value, types::TurnOutcome, TurnResponse};

pub fn format_turn(turn: &TurnResponse, verbose: bool) -> String {
    let mut out = turn.text.clone();
    if !verbose {
        return out;
    }

    if !turn.plan.is_empty() {
        out.push_str("\n\nPlan:");
        for (i, step) in turn.plan.iter().enumerate() {
            out.push_str(&format!("\n  {}. {step}", i + 1));
        }
    }
    if !turn.tool_calls.is_empty() {
        out.push_str("\n\nTool calls:");
        for call in &turn.tool_calls {
            let status = if call.ok { "ok" } else { "failed" };
            let cached = if call.cached { ", cached" } else { "" };
            out.push_str(&format!(
                "\n  - {} ({status}{cached}, {} ms): {}",
                call.tool.as_str(),
                call.elapsed_ms,
                call.detail
            ));
        }
    }
    if let Some(sql) = &turn.sql {
        out.push_str(&format!("\n\nSQL:\n  {sql}"));
    }
    if let Some(summary) = &turn.summary {
        if !summary.key_metrics.is_empty() {
            out.push_str("\n\nMetrics:");
            for (name, value) in &summary.key_metrics {
                out.push_str(&format!("\n  {name}: {}", format_value(value)));
            }
        }
    }
    if let TurnOutcome::Failed { kind, .. } = &turn.outcome {
        out.push_str(&format!("\n\n[failed: {kind:?}]"));
    }
    out
}
