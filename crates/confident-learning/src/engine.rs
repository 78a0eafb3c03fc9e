//! Label Issue Engine
//!
//! Runs the whole pipeline on one dataset: thresholds, confident joint,
//! calibration, quality scores, selection. Every call is self-contained; the
//! engine holds only its configuration.

use std::collections::BTreeSet;

use label_core::{stats, LabelResult, ProbabilityMatrix};
use serde::{Deserialize, Serialize};

use crate::calibration::{self, CalibratedJoint};
use crate::config::{EngineConfig, ScoreMethod, ScoreTieBreak, SelectionPolicy};
use crate::joint::{self, ConfidentJoint};
use crate::noise::{self, LatentEstimate};
use crate::quality;
use crate::selector::{ErrorSelector, SelectionInput};
use crate::threshold::{self, ClassThresholds};
use crate::validation::validate_inputs;

/// Everything one run produces, each part usable on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelIssueReport {
    pub num_examples: usize,
    pub num_classes: usize,
    pub policy: SelectionPolicy,
    pub score_method: ScoreMethod,
    pub thresholds: ClassThresholds,
    pub confident_joint: ConfidentJoint,
    pub calibrated_joint: CalibratedJoint,
    pub latent: LatentEstimate,
    /// One score per example, in input order; never altered by selection.
    pub quality_scores: Vec<f64>,
    /// Flagged example indices.
    pub label_issues: BTreeSet<usize>,
}

impl LabelIssueReport {
    pub fn num_issues(&self) -> usize {
        self.label_issues.len()
    }

    pub fn is_issue(&self, idx: usize) -> bool {
        self.label_issues.contains(&idx)
    }

    /// `mask[i]` is true when example `i` was flagged.
    pub fn issue_mask(&self) -> Vec<bool> {
        (0..self.num_examples).map(|i| self.is_issue(i)).collect()
    }

    /// Flagged examples, most suspicious (lowest score) first.
    pub fn ranked_issues(&self) -> Vec<usize> {
        quality::rank_by_quality(
            self.label_issues.iter().copied(),
            &self.quality_scores,
            ScoreTieBreak::IndexAscending,
        )
    }

    /// Share of examples not flagged, in [0, 1].
    pub fn health_score(&self) -> f64 {
        if self.num_examples == 0 {
            return 1.0;
        }
        1.0 - self.num_issues() as f64 / self.num_examples as f64
    }

    /// Indices of examples that were not flagged.
    pub fn clean_indices(&self) -> Vec<usize> {
        (0..self.num_examples).filter(|i| !self.is_issue(*i)).collect()
    }
}

/// Confident-learning label issue finder.
#[derive(Debug, Clone, Default)]
pub struct LabelIssueEngine {
    config: EngineConfig,
}

impl LabelIssueEngine {
    /// Create an engine; fails on configuration that is invalid for any dataset.
    pub fn new(config: EngineConfig) -> LabelResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline.
    pub fn find_label_issues(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
        sample_weights: Option<&[f64]>,
    ) -> LabelResult<LabelIssueReport> {
        validate_inputs(labels, pred_probs, sample_weights, &self.config)?;

        tracing::debug!(
            examples = labels.len(),
            classes = pred_probs.num_classes(),
            observed_classes = stats::num_unique_classes(labels),
            policy = %self.config.filter_by,
            score_method = %self.config.score_method,
            weighted = sample_weights.is_some(),
            "finding label issues"
        );

        let thresholds = self.thresholds_unchecked(labels, pred_probs, sample_weights);
        let confident_joint = joint::compute_confident_joint(
            labels,
            pred_probs,
            &thresholds,
            sample_weights,
            self.config.class_tie_break,
        );
        let calibrated_joint =
            calibration::calibrate(&confident_joint.counts, labels, pred_probs, sample_weights);
        let latent = noise::estimate_latent(&calibrated_joint);
        let quality_scores =
            quality::label_quality_scores(labels, pred_probs, self.config.score_method);

        let input = SelectionInput {
            labels,
            predicted_class: &confident_joint.predicted_class,
            scores: &quality_scores,
            sample_weights,
            confident_joint: &confident_joint.counts,
            calibrated_joint: &calibrated_joint.matrix,
        };
        let label_issues = ErrorSelector::new(&self.config).select(&input);

        tracing::info!(
            examples = labels.len(),
            issues = label_issues.len(),
            estimated = noise::estimate_num_issues(&calibrated_joint),
            policy = %self.config.filter_by,
            "label issue search complete"
        );

        Ok(LabelIssueReport {
            num_examples: labels.len(),
            num_classes: pred_probs.num_classes(),
            policy: self.config.filter_by,
            score_method: self.config.score_method,
            thresholds,
            confident_joint,
            calibrated_joint,
            latent,
            quality_scores,
            label_issues,
        })
    }

    /// Only the flagged set.
    pub fn label_issue_set(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
        sample_weights: Option<&[f64]>,
    ) -> LabelResult<BTreeSet<usize>> {
        Ok(self.find_label_issues(labels, pred_probs, sample_weights)?.label_issues)
    }

    /// Per-class thresholds (overrides applied).
    pub fn compute_thresholds(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
        sample_weights: Option<&[f64]>,
    ) -> LabelResult<ClassThresholds> {
        validate_inputs(labels, pred_probs, sample_weights, &self.config)?;
        Ok(self.thresholds_unchecked(labels, pred_probs, sample_weights))
    }

    /// Confident joint for the data.
    pub fn compute_confident_joint(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
        sample_weights: Option<&[f64]>,
    ) -> LabelResult<ConfidentJoint> {
        let thresholds = self.compute_thresholds(labels, pred_probs, sample_weights)?;
        Ok(joint::compute_confident_joint(
            labels,
            pred_probs,
            &thresholds,
            sample_weights,
            self.config.class_tie_break,
        ))
    }

    /// Calibrated joint for the data.
    pub fn calibrate(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
        sample_weights: Option<&[f64]>,
    ) -> LabelResult<CalibratedJoint> {
        let confident_joint = self.compute_confident_joint(labels, pred_probs, sample_weights)?;
        Ok(calibration::calibrate(
            &confident_joint.counts,
            labels,
            pred_probs,
            sample_weights,
        ))
    }

    /// Label quality scores only.
    pub fn quality_scores(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
    ) -> LabelResult<Vec<f64>> {
        validate_inputs(labels, pred_probs, None, &self.config)?;
        Ok(quality::label_quality_scores(
            labels,
            pred_probs,
            self.config.score_method,
        ))
    }

    fn thresholds_unchecked(
        &self,
        labels: &[usize],
        pred_probs: &ProbabilityMatrix,
        sample_weights: Option<&[f64]>,
    ) -> ClassThresholds {
        threshold::resolve_thresholds(
            labels,
            pred_probs,
            sample_weights,
            self.config.thresholds.as_deref(),
        )
    }
}

/// Run the pipeline with the default configuration.
pub fn find_label_issues(
    labels: &[usize],
    pred_probs: &ProbabilityMatrix,
) -> LabelResult<LabelIssueReport> {
    LabelIssueEngine::default().find_label_issues(labels, pred_probs, None)
}
