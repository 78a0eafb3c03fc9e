//! Latent noise estimates derived from the calibrated joint.
//!
//! Rows of the joint are noisy labels `s`, columns are true labels `y`:
//! - `py[j]`: prior of true label j (column marginal),
//! - noise matrix `P(s = i | y = j)`: columns sum to 1,
//! - inverse noise matrix `P(y = j | s = i)`: rows sum to 1.

use label_core::LabelMatrix;
use serde::{Deserialize, Serialize};

use crate::calibration::CalibratedJoint;

/// Upper bound for a single noise rate after clipping.
const MAX_NOISE_RATE: f64 = 0.9999;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentEstimate {
    /// Prior over true labels.
    pub py: Vec<f64>,
    /// Prior over noisy labels.
    pub ps: Vec<f64>,
    /// `P(noisy | true)`, columns sum to 1.
    pub noise_matrix: LabelMatrix,
    /// `P(true | noisy)`, rows sum to 1.
    pub inverse_noise_matrix: LabelMatrix,
}

impl LatentEstimate {
    /// Probability that an example of true class `class` keeps its label.
    pub fn retention_rate(&self, class: usize) -> f64 {
        self.noise_matrix.get(class, class)
    }
}

/// Noise matrix from a joint: each column divided by its sum. An empty column
/// becomes the identity column (no evidence of noise).
pub fn noise_matrix(joint: &LabelMatrix) -> LabelMatrix {
    let size = joint.size();
    let col_sums = joint.col_sums();
    let mut out = LabelMatrix::zeros(size);
    for j in 0..size {
        for i in 0..size {
            let value = if col_sums[j] > 0.0 {
                joint.get(i, j) / col_sums[j]
            } else if i == j {
                1.0
            } else {
                0.0
            };
            out.set(i, j, value);
        }
    }
    out
}

/// Inverse noise matrix from a joint: each row divided by its sum. An empty
/// row becomes the identity row.
pub fn inverse_noise_matrix(joint: &LabelMatrix) -> LabelMatrix {
    let size = joint.size();
    let mut out = LabelMatrix::zeros(size);
    for i in 0..size {
        let row_sum = joint.row_sum(i);
        for j in 0..size {
            let value = if row_sum > 0.0 {
                joint.get(i, j) / row_sum
            } else if i == j {
                1.0
            } else {
                0.0
            };
            out.set(i, j, value);
        }
    }
    out
}

/// Priors and noise matrices implied by a calibrated joint.
pub fn estimate_latent(calibrated: &CalibratedJoint) -> LatentEstimate {
    let distribution = calibrated.joint_distribution();
    LatentEstimate {
        py: distribution.col_sums(),
        ps: distribution.row_sums(),
        noise_matrix: noise_matrix(&distribution),
        inverse_noise_matrix: inverse_noise_matrix(&distribution),
    }
}

/// Clip off-diagonal noise rates into `[0, 0.9999]` and renormalise columns.
/// Diagonal entries are not noise rates and are left alone before the
/// renormalisation.
pub fn clip_noise_rates(noise_matrix: &LabelMatrix) -> LabelMatrix {
    let size = noise_matrix.size();
    let mut clipped = noise_matrix.clone();
    for i in 0..size {
        for j in 0..size {
            if i != j {
                clipped.set(i, j, noise_matrix.get(i, j).clamp(0.0, MAX_NOISE_RATE));
            }
        }
    }
    for j in 0..size {
        let col_sum = clipped.col_sum(j);
        if col_sum > 0.0 {
            for i in 0..size {
                clipped.set(i, j, clipped.get(i, j) / col_sum);
            }
        }
    }
    clipped
}

/// Declare one class noise-free (the positive class in PU learning): nothing
/// of another true class is labelled as it. Diagonals absorb the removed mass
/// so columns still sum to 1.
pub fn remove_noise_from_class(
    noise_matrix: &LabelMatrix,
    class_without_noise: usize,
) -> LabelMatrix {
    let size = noise_matrix.size();
    let mut out = noise_matrix.clone();
    for j in 0..size {
        if j != class_without_noise {
            out.set(class_without_noise, j, 0.0);
        }
    }
    for i in 0..size {
        let off_diagonal = out.col_sum(i) - out.get(i, i);
        out.set(i, i, 1.0 - off_diagonal);
    }
    out
}

/// Estimated number of label issues: the off-diagonal total of the calibrated
/// joint after rounding it to integers row by row.
pub fn estimate_num_issues(calibrated: &CalibratedJoint) -> usize {
    calibrated
        .rounded_counts()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, v)| (*v).max(0) as usize)
                .sum::<usize>()
        })
        .sum()
}
