//! Error selection.
//!
//! Turns estimated error volumes into a concrete set of flagged examples. The
//! budgets come from the (calibrated or raw) joint; which examples fill a
//! budget is decided by label quality score, lowest first.

use std::collections::BTreeSet;

use label_core::{stats, LabelMatrix};
use rayon::prelude::*;

use crate::config::{EngineConfig, SelectionPolicy, ROUNDING_EPSILON};
use crate::quality::order_by_quality;

/// Everything the selector reads. Nothing here is modified.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub labels: &'a [usize],
    /// Most confident class per example (see `ConfidentJoint::predicted_class`).
    pub predicted_class: &'a [usize],
    pub scores: &'a [f64],
    pub sample_weights: Option<&'a [f64]>,
    /// Raw confident joint, used by `ConfidentLearning`.
    pub confident_joint: &'a LabelMatrix,
    /// Calibrated joint, used by every other policy.
    pub calibrated_joint: &'a LabelMatrix,
}

impl SelectionInput<'_> {
    fn num_classes(&self) -> usize {
        self.calibrated_joint.size()
    }

    fn weight(&self, idx: usize) -> f64 {
        self.sample_weights.map_or(1.0, |w| w[idx])
    }
}

/// Chooses flagged examples according to the configured policy.
pub struct ErrorSelector<'a> {
    config: &'a EngineConfig,
}

impl<'a> ErrorSelector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn select(&self, input: &SelectionInput<'_>) -> BTreeSet<usize> {
        match self.config.filter_by {
            SelectionPolicy::PruneByClass => self.prune_by_class(input),
            SelectionPolicy::PruneByNoiseRate => {
                self.prune_by_noise_rate(input, input.calibrated_joint)
            }
            SelectionPolicy::Both => {
                let by_class = self.prune_by_class(input);
                let by_noise_rate = self.prune_by_noise_rate(input, input.calibrated_joint);
                by_class.intersection(&by_noise_rate).copied().collect()
            }
            SelectionPolicy::ConfidentLearning => {
                self.prune_by_noise_rate(input, input.confident_joint)
            }
        }
    }

    /// For each noisy class, flag up to its off-diagonal calibrated mass among
    /// the examples predicted to belong elsewhere.
    pub fn prune_by_class(&self, input: &SelectionInput<'_>) -> BTreeSet<usize> {
        let num_classes = input.num_classes();
        let class_counts =
            stats::weighted_counts(input.labels, input.sample_weights, num_classes);
        let candidates = self.group_candidates(
            input,
            |label, predicted| (predicted != label).then_some(label),
            num_classes,
        );

        let flagged: Vec<Vec<usize>> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(class, members)| {
                let estimate = match &self.config.num_to_remove_per_class {
                    Some(budgets) => budgets[class] as f64,
                    None => {
                        input.calibrated_joint.row_off_diagonal(class) * self.config.frac_noise
                    }
                };
                let budget = self
                    .config
                    .rounding
                    .apply(estimate.min(self.removable(class_counts[class])));
                self.take_lowest(members, budget, input)
            })
            .collect();

        flagged.into_iter().flatten().collect()
    }

    /// For each (noisy i, true j) pair with i ≠ j, flag up to `budget[i][j]`
    /// examples labelled i whose most confident class is j.
    pub fn prune_by_noise_rate(
        &self,
        input: &SelectionInput<'_>,
        budgets: &LabelMatrix,
    ) -> BTreeSet<usize> {
        let num_classes = input.num_classes();
        let class_counts =
            stats::weighted_counts(input.labels, input.sample_weights, num_classes);
        let candidates = self.group_candidates(
            input,
            |label, predicted| (predicted != label).then_some(label * num_classes + predicted),
            num_classes * num_classes,
        );

        // Scale each row down if keeping `min_examples_per_class` requires it.
        let row_scale: Vec<f64> = (0..num_classes)
            .map(|i| {
                let wanted = budgets.row_off_diagonal(i) * self.config.frac_noise;
                let allowed = self.removable(class_counts[i]);
                if wanted > allowed && wanted > 0.0 {
                    allowed / wanted
                } else {
                    1.0
                }
            })
            .collect();

        let flagged: Vec<Vec<usize>> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(cell, members)| {
                let (i, j) = (cell / num_classes, cell % num_classes);
                if i == j || members.is_empty() {
                    return Vec::new();
                }
                let estimate = budgets.get(i, j) * self.config.frac_noise * row_scale[i];
                let budget = self.config.rounding.apply(estimate);
                self.take_lowest(members, budget, input)
            })
            .collect();

        flagged.into_iter().flatten().collect()
    }

    /// Most mass that may be flagged in a class while still leaving
    /// `min_examples_per_class` behind.
    fn removable(&self, class_count: f64) -> f64 {
        (class_count - self.config.min_examples_per_class as f64).max(0.0)
    }

    /// Bucket example indices (ascending) by the key `bucket` assigns them.
    fn group_candidates<F>(
        &self,
        input: &SelectionInput<'_>,
        bucket: F,
        num_buckets: usize,
    ) -> Vec<Vec<usize>>
    where
        F: Fn(usize, usize) -> Option<usize>,
    {
        let mut groups = vec![Vec::new(); num_buckets];
        for (idx, (&label, &predicted)) in input
            .labels
            .iter()
            .zip(input.predicted_class)
            .enumerate()
        {
            if let Some(key) = bucket(label, predicted) {
                groups[key].push(idx);
            }
        }
        groups
    }

    /// Lowest-scoring candidates while their accumulated weight stays within
    /// `budget`. Stops at the first candidate that would overshoot it, so
    /// with unit weights this takes exactly `budget` examples.
    fn take_lowest(
        &self,
        mut candidates: Vec<usize>,
        budget: f64,
        input: &SelectionInput<'_>,
    ) -> Vec<usize> {
        if budget <= 0.0 || candidates.is_empty() {
            return Vec::new();
        }
        order_by_quality(&mut candidates, input.scores, self.config.score_tie_break);

        let mut taken = Vec::new();
        let mut used = 0.0;
        for idx in candidates {
            let weight = input.weight(idx);
            if used + weight > budget + ROUNDING_EPSILON {
                break;
            }
            used += weight;
            taken.push(idx);
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Rounding, ScoreTieBreak};

    struct Fixture {
        labels: Vec<usize>,
        predicted: Vec<usize>,
        scores: Vec<f64>,
        raw: LabelMatrix,
        calibrated: LabelMatrix,
    }

    impl Fixture {
        fn input(&self) -> SelectionInput<'_> {
            SelectionInput {
                labels: &self.labels,
                predicted_class: &self.predicted,
                scores: &self.scores,
                sample_weights: None,
                confident_joint: &self.raw,
                calibrated_joint: &self.calibrated,
            }
        }
    }

    /// Six class-0 examples, three predicted as class 1; three class-1
    /// examples, one predicted as class 0.
    fn fixture() -> Fixture {
        Fixture {
            labels: vec![0, 0, 0, 0, 0, 0, 1, 1, 1],
            predicted: vec![0, 1, 1, 0, 1, 0, 1, 0, 1],
            scores: vec![0.9, 0.2, 0.1, 0.8, 0.3, 0.7, 0.9, 0.4, 0.8],
            raw: LabelMatrix::from_rows(vec![vec![3.0, 1.0], vec![1.0, 2.0]]).unwrap(),
            calibrated: LabelMatrix::from_rows(vec![vec![4.0, 2.0], vec![1.0, 2.0]]).unwrap(),
        }
    }

    fn select(config: &EngineConfig, f: &Fixture) -> Vec<usize> {
        ErrorSelector::new(config).select(&f.input()).into_iter().collect()
    }

    #[test]
    fn test_prune_by_noise_rate_takes_lowest_scores() {
        let f = fixture();
        let config = EngineConfig::default().with_policy(SelectionPolicy::PruneByNoiseRate);
        // Budget 2 for (0, 1): examples 2 (0.1) and 1 (0.2); budget 1 for (1, 0): example 7.
        assert_eq!(select(&config, &f), vec![1, 2, 7]);
    }

    #[test]
    fn test_confident_learning_uses_raw_joint() {
        let f = fixture();
        let config = EngineConfig::default().with_policy(SelectionPolicy::ConfidentLearning);
        assert_eq!(select(&config, &f), vec![2, 7]);
    }

    #[test]
    fn test_prune_by_class_and_both() {
        let f = fixture();
        let config = EngineConfig::default().with_policy(SelectionPolicy::PruneByClass);
        assert_eq!(select(&config, &f), vec![1, 2, 7]);

        let both = select(&EngineConfig::default(), &f);
        let by_class = select(
            &EngineConfig::default().with_policy(SelectionPolicy::PruneByClass),
            &f,
        );
        let by_rate = select(
            &EngineConfig::default().with_policy(SelectionPolicy::PruneByNoiseRate),
            &f,
        );
        assert!(both.iter().all(|i| by_class.contains(i) && by_rate.contains(i)));
    }

    #[test]
    fn test_fractional_budgets_round_down() {
        let mut f = fixture();
        f.calibrated = LabelMatrix::from_rows(vec![vec![4.2, 1.8], vec![2.1, 0.9]]).unwrap();
        let config = EngineConfig::default().with_policy(SelectionPolicy::PruneByNoiseRate);
        assert_eq!(select(&config, &f), vec![2, 7]);

        let config = config.with_rounding(Rounding::Nearest);
        assert_eq!(select(&config, &f), vec![1, 2, 7]);
    }

    #[test]
    fn test_equal_scores_flag_lowest_index_first() {
        let mut f = fixture();
        f.scores = vec![0.9, 0.5, 0.5, 0.8, 0.5, 0.7, 0.9, 0.4, 0.8];
        f.calibrated = LabelMatrix::from_rows(vec![vec![5.0, 1.0], vec![0.0, 3.0]]).unwrap();
        let config = EngineConfig::default().with_policy(SelectionPolicy::PruneByNoiseRate);
        assert_eq!(select(&config, &f), vec![1]);

        let config = EngineConfig {
            score_tie_break: ScoreTieBreak::IndexDescending,
            ..config
        };
        assert_eq!(select(&config, &f), vec![4]);
    }

    #[test]
    fn test_frac_noise_and_min_examples() {
        let f = fixture();
        let config = EngineConfig {
            filter_by: SelectionPolicy::PruneByNoiseRate,
            frac_noise: 0.5,
            ..EngineConfig::default()
        };
        assert_eq!(select(&config, &f), vec![2]);

        let config = EngineConfig {
            filter_by: SelectionPolicy::PruneByClass,
            min_examples_per_class: 3,
            ..EngineConfig::default()
        };
        // Class 1 has 3 examples, so nothing of it may be flagged.
        assert_eq!(select(&config, &f), vec![1, 2]);
    }

    #[test]
    fn test_explicit_class_budgets() {
        let f = fixture();
        let config = EngineConfig {
            filter_by: SelectionPolicy::PruneByClass,
            num_to_remove_per_class: Some(vec![1, 0]),
            ..EngineConfig::default()
        };
        assert_eq!(select(&config, &f), vec![2]);
    }

    #[test]
    fn test_weighted_budget_is_never_exceeded() {
        let f = fixture();
        let weights = vec![1.0, 1.5, 1.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let input = SelectionInput {
            sample_weights: Some(&weights),
            ..f.input()
        };
        let config = EngineConfig::default().with_policy(SelectionPolicy::PruneByNoiseRate);
        let flagged: Vec<usize> = ErrorSelector::new(&config)
            .select(&input)
            .into_iter()
            .collect();
        // Budget 2 for (0, 1): example 2 (1.5) fits, example 1 would reach 3.0.
        assert_eq!(flagged, vec![2, 7]);

        let class0_weight: f64 = flagged
            .iter()
            .filter(|&&i| f.labels[i] == 0)
            .map(|&i| weights[i])
            .sum();
        assert!(class0_weight <= 2.0);
    }

    #[test]
    fn test_weighted_budget_takes_everything_that_fits() {
        let f = fixture();
        let weights = vec![1.0, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let input = SelectionInput {
            sample_weights: Some(&weights),
            ..f.input()
        };
        let config = EngineConfig::default().with_policy(SelectionPolicy::PruneByNoiseRate);
        let flagged: Vec<usize> = ErrorSelector::new(&config)
            .select(&input)
            .into_iter()
            .collect();
        // 0.5 + 0.5 + 1.0 lands exactly on the budget of 2.
        assert_eq!(flagged, vec![1, 2, 4, 7]);
    }
}
