//! Rank aggregation across jurors

use super::label::LabelMap;
use super::stage::Stage2Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Average position of one model across all jurors that ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRanking {
    pub model: String,
    /// Mean of 1-indexed positions, rounded to two decimals
    pub average_rank: f64,
    /// Number of jurors that ranked this model
    pub rankings_count: usize,
}

/// Aggregate juror rankings into per-model average ranks, best first.
///
/// Labels the jurors invented that are not in `label_to_model` are ignored.
/// A model's count reflects distinct jurors, even if one juror repeats a
/// label.
pub fn aggregate_rankings(
    stage2: &[Stage2Result],
    label_to_model: &LabelMap,
) -> Vec<AggregateRanking> {
    let mut positions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut juror_counts: BTreeMap<&str, usize> = BTreeMap::new();

    for juror in stage2 {
        let mut seen_this_juror: BTreeSet<&str> = BTreeSet::new();
        for (index, label) in juror.parsed_ranking.iter().enumerate() {
            let Some(model) = label_to_model.get(label) else {
                continue;
            };
            let model = model.as_str();
            positions.entry(model).or_default().push(index + 1);
            if seen_this_juror.insert(model) {
                *juror_counts.entry(model).or_default() += 1;
            }
        }
    }

    let mut rankings: Vec<AggregateRanking> = positions
        .into_iter()
        .map(|(model, positions)| {
            let mean = positions.iter().sum::<usize>() as f64 / positions.len() as f64;
            AggregateRanking {
                model: model.to_string(),
                average_rank: (mean * 100.0).round() / 100.0,
                rankings_count: juror_counts.get(model).copied().unwrap_or(0),
            }
        })
        .collect();

    rankings.sort_by(|a, b| {
        a.average_rank
            .partial_cmp(&b.average_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rankings
}
