//! Confident joint estimation.
//!
//! The confident joint counts, for every (noisy label, true label) pair, the
//! examples whose predicted probability for the true label clears that
//! class's threshold. Thresholds are per class, not one global cutoff.

use label_core::{stats, LabelMatrix, ProbabilityMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClassTieBreak;
use crate::threshold::ClassThresholds;

/// K×K (weighted) counts plus the per-example class assignments behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidentJoint {
    /// `counts[i][j]`: examples labelled `i` confidently predicted as `j`.
    pub counts: LabelMatrix,
    /// Class each example was counted under; `None` when no class cleared its
    /// threshold and the example stayed out of the joint.
    pub confident_class: Vec<Option<usize>>,
    /// Most confident class per example: the confident class when there is
    /// one, otherwise the plain argmax of its probabilities.
    pub predicted_class: Vec<usize>,
}

impl ConfidentJoint {
    pub fn num_classes(&self) -> usize {
        self.counts.size()
    }

    /// Indices of examples that contributed to no cell.
    pub fn excluded_examples(&self) -> Vec<usize> {
        self.confident_class
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Total (weighted) mass counted in the joint.
    pub fn total(&self) -> f64 {
        self.counts.total()
    }
}

/// Classes whose probability clears their threshold: J(x).
pub fn confident_classes(row: &[f64], thresholds: &ClassThresholds) -> Vec<usize> {
    row.iter()
        .enumerate()
        .filter(|(class, p)| thresholds.admits(*class, **p))
        .map(|(class, _)| class)
        .collect()
}

/// The class an example is counted under: the most probable member of J(x),
/// or `None` when J(x) is empty.
pub fn pick_confident_class(
    row: &[f64],
    thresholds: &ClassThresholds,
    tie_break: ClassTieBreak,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for class in confident_classes(row, thresholds) {
        best = match best {
            None => Some(class),
            Some(current) if row[class] > row[current] => Some(class),
            Some(current)
                if row[class] == row[current] && tie_break == ClassTieBreak::HighestClass =>
            {
                Some(class)
            }
            keep => keep,
        };
    }
    best
}

/// Build the confident joint.
///
/// Each example adds its weight (1 when unweighted) to
/// `counts[noisy label][confident class]`; examples with an empty J(x) add
/// nothing but remain in the dataset.
pub fn compute_confident_joint(
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
    thresholds: &ClassThresholds,
    sample_weights: Option<&[f64]>,
    tie_break: ClassTieBreak,
) -> ConfidentJoint {
    let num_classes = pred_probs.num_classes();

    let confident_class: Vec<Option<usize>> = (0..pred_probs.num_rows())
        .into_par_iter()
        .map(|idx| pick_confident_class(pred_probs.row(idx), thresholds, tie_break))
        .collect();

    let predicted_class: Vec<usize> = confident_class
        .iter()
        .enumerate()
        .map(|(idx, class)| class.unwrap_or_else(|| stats::argmax(pred_probs.row(idx))))
        .collect();

    let mut counts = LabelMatrix::zeros(num_classes);
    for (idx, class) in confident_class.iter().enumerate() {
        if let Some(j) = class {
            counts.add(labels[idx], *j, sample_weights.map_or(1.0, |w| w[idx]));
        }
    }

    let excluded = confident_class.iter().filter(|c| c.is_none()).count();
    tracing::debug!(
        classes = num_classes,
        examples = labels.len(),
        excluded,
        off_diagonal = counts.off_diagonal_sum(),
        "computed confident joint"
    );

    ConfidentJoint {
        counts,
        confident_class,
        predicted_class,
    }
}
