//! Joint Calibration
//!
//! Rescales the confident joint so that each row matches the observed count of
//! its noisy label, turning raw confident counts into an estimate of how the
//! whole dataset splits across (noisy label, true label) pairs.

use label_core::{stats, LabelMatrix, ProbabilityMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// The calibrated joint and everything derived from it in the same pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedJoint {
    /// Calibrated counts: row `i` sums to the observed count of label `i`.
    pub matrix: LabelMatrix,
    /// Observed (weighted) count of every noisy label.
    pub observed_counts: Vec<f64>,
    /// Rows whose confident joint row was empty and therefore stay zero.
    /// When such a class does have examples, its mass is missing from the
    /// total; callers can spot this here.
    pub zero_rows: Vec<usize>,
    /// Dataset size (total sample weight).
    pub num_examples: f64,
    /// Per-example probability that the noisy label is wrong.
    pub error_likelihoods: Vec<f64>,
}

/// Summary of how well the calibrated joint meets its marginals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationStats {
    /// Sum of all calibrated entries
    pub total_mass: f64,
    /// Largest absolute gap between a non-zero row and its observed count
    pub max_row_error: f64,
    /// Observed mass sitting in rows left at zero
    pub unmatched_mass: f64,
    /// Estimated fraction of mislabeled data (off-diagonal share)
    pub noise_fraction: f64,
}

impl CalibratedJoint {
    pub fn num_classes(&self) -> usize {
        self.matrix.size()
    }

    /// Joint distribution P(noisy label, true label): the calibrated counts
    /// divided by the dataset size.
    pub fn joint_distribution(&self) -> LabelMatrix {
        if self.num_examples > 0.0 {
            self.matrix.scaled(1.0 / self.num_examples)
        } else {
            LabelMatrix::zeros(self.matrix.size())
        }
    }

    /// Integer counts, rounded so that every row keeps its total.
    pub fn rounded_counts(&self) -> Vec<Vec<i64>> {
        stats::round_preserving_row_totals(&self.matrix)
    }

    /// Does class `i` have observed examples but an all-zero row?
    pub fn is_degenerate(&self, class: usize) -> bool {
        self.zero_rows.contains(&class) && self.observed_counts[class] > 0.0
    }

    pub fn stats(&self) -> CalibrationStats {
        let total_mass = self.matrix.total();
        let mut max_row_error: f64 = 0.0;
        let mut unmatched_mass = 0.0;

        for i in 0..self.matrix.size() {
            if self.zero_rows.contains(&i) {
                unmatched_mass += self.observed_counts[i];
            } else {
                let error = (self.matrix.row_sum(i) - self.observed_counts[i]).abs();
                max_row_error = max_row_error.max(error);
            }
        }

        let noise_fraction = if total_mass > 0.0 {
            self.matrix.off_diagonal_sum() / total_mass
        } else {
            0.0
        };

        CalibrationStats {
            total_mass,
            max_row_error,
            unmatched_mass,
            noise_fraction,
        }
    }
}

/// Rescale a confident joint to the observed label counts.
///
/// The joint is first normalised to a proportion matrix and multiplied by the
/// dataset size; each non-empty row is then scaled to its observed count.
/// Columns are not forced: the noisy-label marginal is the only one trusted.
/// Returns the calibrated matrix and the indices of rows left at zero.
pub fn calibrate_joint(
    counts: &LabelMatrix,
    observed_counts: &[f64],
) -> (LabelMatrix, Vec<usize>) {
    let num_classes = counts.size();
    let num_examples: f64 = observed_counts.iter().sum();
    let joint_total = counts.total();

    let mut calibrated = if joint_total > 0.0 {
        counts.scaled(num_examples / joint_total)
    } else {
        LabelMatrix::zeros(num_classes)
    };

    let mut zero_rows = Vec::new();
    for i in 0..num_classes {
        let row_sum = calibrated.row_sum(i);
        if row_sum > 0.0 {
            calibrated.scale_row(i, observed_counts[i] / row_sum);
        } else {
            zero_rows.push(i);
        }
    }

    (calibrated, zero_rows)
}

/// Probability that each example's noisy label is wrong.
///
/// Uses the row-normalised calibrated joint P(true = j | noisy = i) as a prior
/// and the example's predicted probabilities as the likelihood:
/// `e(x) = Σ_{j≠i} Q[i][j]·p[j] / Σ_j Q[i][j]·p[j]`, 0 when the denominator
/// vanishes.
pub fn error_likelihoods(
    calibrated: &LabelMatrix,
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
) -> Vec<f64> {
    let row_sums = calibrated.row_sums();

    labels
        .par_iter()
        .enumerate()
        .map(|(idx, &label)| {
            if row_sums[label] <= 0.0 {
                return 0.0;
            }
            let row = pred_probs.row(idx);
            let mut total = 0.0;
            let mut off_diagonal = 0.0;
            for (j, p) in row.iter().enumerate() {
                let mass = calibrated.get(label, j) / row_sums[label] * p;
                total += mass;
                if j != label {
                    off_diagonal += mass;
                }
            }
            if total > 0.0 {
                off_diagonal / total
            } else {
                0.0
            }
        })
        .collect()
}

/// Calibrate the confident joint and derive per-example error likelihoods.
pub fn calibrate(
    counts: &LabelMatrix,
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
    sample_weights: Option<&[f64]>,
) -> CalibratedJoint {
    let observed_counts = stats::weighted_counts(labels, sample_weights, counts.size());
    let num_examples: f64 = observed_counts.iter().sum();
    let (matrix, zero_rows) = calibrate_joint(counts, &observed_counts);

    let degenerate: Vec<usize> = zero_rows
        .iter()
        .copied()
        .filter(|&i| observed_counts[i] > 0.0)
        .collect();
    if !degenerate.is_empty() {
        tracing::warn!(
            classes = ?degenerate,
            "classes have examples but no confident predictions; their calibrated rows stay zero"
        );
    }

    let error_likelihoods = error_likelihoods(&matrix, labels, pred_probs);

    CalibratedJoint {
        matrix,
        observed_counts,
        zero_rows,
        num_examples,
        error_likelihoods,
    }
}
