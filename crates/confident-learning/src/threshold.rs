//! Per-class confidence thresholds.
//!
//! A class's threshold is the average self-confidence of the examples that
//! carry it as their noisy label: the confidence a correctly labelled member of
//! that class is expected to have.

use label_core::ProbabilityMatrix;
use serde::{Deserialize, Serialize};

/// One threshold per class, plus whether the class takes part in the joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub values: Vec<f64>,
    /// False for classes no example carries (and that were not overridden).
    /// Inactive classes never count as confidently predicted.
    pub active: Vec<bool>,
}

impl ClassThresholds {
    pub fn num_classes(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, class: usize) -> f64 {
        self.values[class]
    }

    pub fn is_active(&self, class: usize) -> bool {
        self.active[class]
    }

    /// Does probability `p` for `class` clear the bar?
    pub fn admits(&self, class: usize, p: f64) -> bool {
        self.active[class] && p >= self.values[class]
    }

    pub fn inactive_classes(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, active)| !**active)
            .map(|(class, _)| class)
            .collect()
    }
}

/// Estimate thresholds from the data.
///
/// `threshold[j]` is the (weighted) mean of `p[j]` over examples labelled `j`;
/// a class with no examples gets 0 and is marked inactive.
pub fn estimate_thresholds(
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
    sample_weights: Option<&[f64]>,
) -> ClassThresholds {
    let num_classes = pred_probs.num_classes();
    let mut sums = vec![0.0; num_classes];
    let mut totals = vec![0.0; num_classes];

    for (idx, &label) in labels.iter().enumerate() {
        let w = sample_weights.map_or(1.0, |ws| ws[idx]);
        sums[label] += w * pred_probs.get(idx, label);
        totals[label] += w;
    }

    let mut values = Vec::with_capacity(num_classes);
    let mut active = Vec::with_capacity(num_classes);
    for (sum, total) in sums.into_iter().zip(totals) {
        if total > 0.0 {
            values.push(sum / total);
            active.push(true);
        } else {
            values.push(0.0);
            active.push(false);
        }
    }

    ClassThresholds { values, active }
}

/// Thresholds to use for a run: explicit overrides when configured,
/// otherwise estimated.
pub fn resolve_thresholds(
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
    sample_weights: Option<&[f64]>,
    overrides: Option<&[f64]>,
) -> ClassThresholds {
    match overrides {
        Some(values) => ClassThresholds {
            values: values.to_vec(),
            active: vec![true; values.len()],
        },
        None => estimate_thresholds(labels, pred_probs, sample_weights),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario() -> (Vec<usize>, ProbabilityMatrix) {
        let probs = ProbabilityMatrix::from_rows(vec![
            vec![0.9, 0.1],
            vec![0.4, 0.6],
            vec![0.2, 0.8],
            vec![0.3, 0.7],
        ])
        .unwrap();
        (vec![0, 0, 1, 1], probs)
    }

    #[test]
    fn test_mean_self_confidence() {
        let (labels, probs) = scenario();
        let t = estimate_thresholds(&labels, &probs, None);
        assert_relative_eq!(t.get(0), 0.65, epsilon = 1e-12);
        assert_relative_eq!(t.get(1), 0.75, epsilon = 1e-12);
        assert!(t.inactive_classes().is_empty());
    }

    #[test]
    fn test_weighted_threshold() {
        let (labels, probs) = scenario();
        let t = estimate_thresholds(&labels, &probs, Some(&[3.0, 1.0, 1.0, 1.0]));
        assert_relative_eq!(t.get(0), (3.0 * 0.9 + 0.4) / 4.0, epsilon = 1e-12);
        assert_relative_eq!(t.get(1), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_unobserved_class_is_zero_and_inactive() {
        let probs = ProbabilityMatrix::from_rows(vec![
            vec![0.7, 0.2, 0.1],
            vec![0.5, 0.3, 0.2],
        ])
        .unwrap();
        let t = estimate_thresholds(&[0, 0], &probs, None);
        assert_eq!(t.get(1), 0.0);
        assert_eq!(t.get(2), 0.0);
        assert_eq!(t.inactive_classes(), vec![1, 2]);
        assert!(!t.admits(1, 0.9));
    }

    #[test]
    fn test_overrides_win() {
        let (labels, probs) = scenario();
        let t = resolve_thresholds(&labels, &probs, None, Some(&[0.1, 0.2]));
        assert_eq!(t.values, vec![0.1, 0.2]);
        assert!(t.admits(1, 0.2));
    }
}
