//! # Rerank Logic
//!
//! Reciprocal Rank Fusion of the catalog's vector and keyword result lists.

use crate::tools::TableDescriptor;
use std::collections::HashMap;
use tracing::debug;

const RRF_K: f64 = 60.0;
const KEYWORD_BOOST: f64 = 1.2;

/// Fuses two ranked lists of catalog hits into one.
///
/// Hits are identified by case-folded table name. Each list contributes
/// `1 / (k + rank)` per hit, with keyword hits boosted, and the fused score
/// replaces the original one. The output is sorted by fused score, descending,
/// with ties broken by table name so the order is stable.
pub fn reciprocal_rank_fusion(
    vector_results: Vec<TableDescriptor>,
    keyword_results: Vec<TableDescriptor>,
) -> Vec<TableDescriptor> {
    let mut rrf_scores: HashMap<String, f64> = HashMap::new();

    for (i, result) in vector_results.iter().enumerate() {
        let rank = (i + 1) as f64;
        *rrf_scores.entry(key(result)).or_insert(0.0) += 1.0 / (RRF_K + rank);
    }

    for (i, result) in keyword_results.iter().enumerate() {
        let rank = (i + 1) as f64;
        *rrf_scores.entry(key(result)).or_insert(0.0) += (1.0 / (RRF_K + rank)) * KEYWORD_BOOST;
    }

    let mut combined: Vec<TableDescriptor> = vector_results
        .into_iter()
        .chain(keyword_results)
        .map(|res| (key(&res), res))
        .collect::<HashMap<_, _>>()
        .into_values()
        .collect();

    for result in &mut combined {
        result.score = *rrf_scores.get(&key(result)).unwrap_or(&0.0);
    }

    combined.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.table.table_name.cmp(&b.table.table_name))
    });

    debug!(
        "RRF order: {:?}",
        combined
            .iter()
            .map(|r| r.table.table_name.as_str())
            .collect::<Vec<_>>()
    );
    combined
}

fn key(result: &TableDescriptor) -> String {
    result.table.table_name.to_lowercase()
}
