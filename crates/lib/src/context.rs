//! # Schema Context Builder
//!
//! Turns discovery output into the bounded [`SchemaContext`] that grounds
//! synthesis and validation.

use crate::{
    config::AgentConfig,
    types::{render_table, SchemaContext, TableCandidate},
};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaContextBuilder {
    max_sample_values: usize,
    max_tables: usize,
    max_chars: usize,
}

impl SchemaContextBuilder {
    pub fn new(max_sample_values: usize, max_tables: usize, max_chars: usize) -> Self {
        Self {
            max_sample_values,
            max_tables,
            max_chars,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.max_sample_values,
            config.max_context_tables,
            config.max_context_chars,
        )
    }

    /// Builds a context from candidates given in relevance order.
    ///
    /// Duplicates are dropped (first occurrence wins), samples are capped per
    /// column, and tables are admitted in order until the table or character
    /// budget is spent. The first table is always admitted. Tables that did not
    /// fit are recorded as dropped.
    pub fn build(&self, candidates: Vec<TableCandidate>) -> SchemaContext {
        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        let mut dropped = Vec::new();
        let mut used_chars = 0;

        for mut candidate in candidates {
            if !seen.insert(candidate.identity()) {
                debug!(table = %candidate.name, "Skipping duplicate table");
                continue;
            }

            for samples in candidate.sample_values.values_mut() {
                samples.truncate(self.max_sample_values);
            }
            candidate.sample_values.retain(|_, samples| !samples.is_empty());

            let size = render_table(&candidate).chars().count();
            let fits = tables.len() < self.max_tables && used_chars + size <= self.max_chars;
            if tables.is_empty() || fits {
                used_chars += size;
                tables.push(candidate);
            } else {
                dropped.push(candidate.name);
            }
        }

        if !dropped.is_empty() {
            info!(?dropped, "Schema context budget reached");
        }
        SchemaContext::new(tables, dropped)
    }
}
