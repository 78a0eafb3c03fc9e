//! Per-example label quality scores. Lower means more suspicious.

use label_core::{stats, ProbabilityMatrix};
use rayon::prelude::*;

use crate::config::{ScoreMethod, ScoreTieBreak};

/// Score one example from its probability row and noisy label.
pub fn label_quality(row: &[f64], label: usize, method: ScoreMethod) -> f64 {
    match method {
        ScoreMethod::SelfConfidence => row[label],
        ScoreMethod::NormalizedMargin => {
            let margin = row[label] - stats::max_excluding(row, label);
            (margin + 1.0) / 2.0
        }
    }
}

/// Score every example. Pure per-example work, evaluated in parallel.
pub fn label_quality_scores(
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
    method: ScoreMethod,
) -> Vec<f64> {
    labels
        .par_iter()
        .enumerate()
        .map(|(idx, &label)| label_quality(pred_probs.row(idx), label, method))
        .collect()
}

/// Sort example indices by ascending score; equal scores follow `tie_break`.
pub fn order_by_quality(indices: &mut [usize], scores: &[f64], tie_break: ScoreTieBreak) {
    indices.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| match tie_break {
                ScoreTieBreak::IndexAscending => a.cmp(&b),
                ScoreTieBreak::IndexDescending => b.cmp(&a),
            })
    });
}

/// Rank a set of flagged examples, most suspicious first.
pub fn rank_by_quality<I>(issues: I, scores: &[f64], tie_break: ScoreTieBreak) -> Vec<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut ranked: Vec<usize> = issues.into_iter().collect();
    order_by_quality(&mut ranked, scores, tie_break);
    ranked
}

/// Examples scoring strictly below `cutoff`, most suspicious first.
pub fn issues_below(scores: &[f64], cutoff: f64) -> Vec<usize> {
    let below = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s < cutoff)
        .map(|(idx, _)| idx);
    rank_by_quality(below, scores, ScoreTieBreak::IndexAscending)
}
