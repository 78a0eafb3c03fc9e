//! Training on cleaned data.
//!
//! `CleanLearning` wraps any [`Classifier`]: it produces out-of-sample
//! probabilities by cross-validation, finds label issues with the engine,
//! drops the flagged examples and fits the classifier on what remains.

use anyhow::{Context, Result};
use confident_learning::{LabelIssueEngine, LabelIssueReport};
use label_core::{
    stats, Classifier, LabelError, LabelMatrix, LabelResult, ProbabilityMatrix, TrainedModel,
};
use tracing::info;

use crate::config::CleanLearningConfig;
use crate::cross_validation::cross_val_pred_probs;

/// A model fitted on the examples that survived issue filtering.
#[derive(Debug)]
pub struct CleanModel<M> {
    pub model: M,
    pub report: LabelIssueReport,
    /// Indices (into the original data) the model was trained on.
    pub kept_indices: Vec<usize>,
    /// Weights used for the final fit, aligned with `kept_indices`.
    pub sample_weights: Option<Vec<f64>>,
}

impl<M: TrainedModel> CleanModel<M> {
    pub fn predict_proba(&self, samples: &[M::Sample]) -> LabelResult<ProbabilityMatrix> {
        self.model.predict_proba(samples)
    }

    pub fn predict(&self, samples: &[M::Sample]) -> LabelResult<Vec<usize>> {
        self.model.predict(samples)
    }

    /// Counts of (given label, predicted class) over `samples`.
    pub fn confusion_matrix(
        &self,
        samples: &[M::Sample],
        labels: &[usize],
    ) -> LabelResult<LabelMatrix> {
        if samples.len() != labels.len() || labels.is_empty() {
            return Err(LabelError::ShapeMismatch(format!(
                "{} samples but {} labels",
                samples.len(),
                labels.len()
            )));
        }
        let predicted = self.predict(samples)?;
        let num_classes = labels
            .iter()
            .chain(&predicted)
            .max()
            .map_or(0, |m| m + 1);
        Ok(stats::confusion_matrix(labels, &predicted, num_classes))
    }

    /// Accuracy against `labels`.
    pub fn score(&self, samples: &[M::Sample], labels: &[usize]) -> LabelResult<f64> {
        let confusion = self.confusion_matrix(samples, labels)?;
        Ok(confusion.trace() / labels.len() as f64)
    }
}

pub struct CleanLearning<C: Classifier> {
    classifier: C,
    config: CleanLearningConfig,
    engine: LabelIssueEngine,
}

impl<C: Classifier> CleanLearning<C> {
    pub fn new(classifier: C, config: CleanLearningConfig) -> LabelResult<Self> {
        config.validate()?;
        let engine = LabelIssueEngine::new(config.engine.clone())?;
        Ok(Self {
            classifier,
            config,
            engine,
        })
    }

    pub fn config(&self) -> &CleanLearningConfig {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Find label issues. When `pred_probs` is `None` they are computed by
    /// cross-validation first.
    pub fn find_label_issues(
        &self,
        samples: &[C::Sample],
        labels: &[usize],
        pred_probs: Option<&ProbabilityMatrix>,
        sample_weights: Option<&[f64]>,
    ) -> Result<LabelIssueReport> {
        let computed;
        let pred_probs = match pred_probs {
            Some(p) => p,
            None => {
                let num_classes = labels.iter().max().map_or(0, |m| m + 1).max(2);
                computed = cross_val_pred_probs(
                    &self.classifier,
                    samples,
                    labels,
                    sample_weights,
                    num_classes,
                    self.config.cv_folds,
                    self.config.seed,
                )
                .with_context(|| {
                    format!("cross-validation with {} folds failed", self.config.cv_folds)
                })?;
                &computed
            }
        };

        self.engine
            .find_label_issues(labels, pred_probs, sample_weights)
            .context("label issue search failed")
    }

    /// Find issues, drop them and fit the classifier on the remaining data.
    pub fn fit(
        &self,
        samples: &[C::Sample],
        labels: &[usize],
        pred_probs: Option<&ProbabilityMatrix>,
        sample_weights: Option<&[f64]>,
    ) -> Result<CleanModel<C::Model>> {
        if samples.len() != labels.len() {
            return Err(LabelError::ShapeMismatch(format!(
                "{} samples but {} labels",
                samples.len(),
                labels.len()
            ))
            .into());
        }

        let report = self.find_label_issues(samples, labels, pred_probs, sample_weights)?;
        let kept_indices = report.clean_indices();

        let kept_samples: Vec<C::Sample> =
            kept_indices.iter().map(|&i| samples[i].clone()).collect();
        let kept_labels: Vec<usize> = kept_indices.iter().map(|&i| labels[i]).collect();
        let weights = self.final_weights(&report, &kept_indices, labels, sample_weights);

        info!(
            examples = labels.len(),
            dropped = report.num_issues(),
            reweighted = self.config.reweight_by_noise,
            "fitting on cleaned data"
        );

        let model = self
            .classifier
            .fit(&kept_samples, &kept_labels, weights.as_deref())
            .context("final fit on cleaned data failed")?;

        Ok(CleanModel {
            model,
            report,
            kept_indices,
            sample_weights: weights,
        })
    }

    /// Caller weights for the kept examples, multiplied by the inverse
    /// retention rate of each label when reweighting is on.
    fn final_weights(
        &self,
        report: &LabelIssueReport,
        kept_indices: &[usize],
        labels: &[usize],
        sample_weights: Option<&[f64]>,
    ) -> Option<Vec<f64>> {
        if !self.config.reweight_by_noise && sample_weights.is_none() {
            return None;
        }
        Some(
            kept_indices
                .iter()
                .map(|&i| {
                    let base = sample_weights.map_or(1.0, |w| w[i]);
                    if !self.config.reweight_by_noise {
                        return base;
                    }
                    let retention = report.latent.retention_rate(labels[i]);
                    if retention > 0.0 {
                        base / retention
                    } else {
                        base
                    }
                })
                .collect(),
        )
    }
}
