//! Out-of-sample predicted probabilities by cross-validation.
//!
//! Every example's probability row comes from a model that never saw that
//! example, which is what the confident-learning engine assumes.

use label_core::{Classifier, LabelError, LabelResult, ProbabilityMatrix, TrainedModel};
use rayon::prelude::*;

use crate::folds::{stratified_folds, Fold};

fn gather<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}

/// Fit on each fold's training part and predict its holdout part. Folds run
/// in parallel; rows are written back in example order.
pub fn out_of_sample_pred_probs<C: Classifier>(
    classifier: &C,
    samples: &[C::Sample],
    labels: &[usize],
    sample_weights: Option<&[f64]>,
    num_classes: usize,
    folds: &[Fold],
) -> LabelResult<ProbabilityMatrix> {
    if samples.len() != labels.len() {
        return Err(LabelError::ShapeMismatch(format!(
            "{} samples but {} labels",
            samples.len(),
            labels.len()
        )));
    }

    let predictions: Vec<(usize, ProbabilityMatrix)> = folds
        .par_iter()
        .enumerate()
        .map(|(fold_idx, fold)| -> LabelResult<(usize, ProbabilityMatrix)> {
            let train_weights = sample_weights.map(|w| gather(w, &fold.train));
            let model = classifier.fit(
                &gather(samples, &fold.train),
                &gather(labels, &fold.train),
                train_weights.as_deref(),
            )?;
            let probs = model.predict_proba(&gather(samples, &fold.holdout))?;

            if probs.num_rows() != fold.holdout.len() || probs.num_classes() != num_classes {
                return Err(LabelError::Classifier(format!(
                    "fold {} predicted a {}x{} matrix, expected {}x{}",
                    fold_idx,
                    probs.num_rows(),
                    probs.num_classes(),
                    fold.holdout.len(),
                    num_classes
                )));
            }
            tracing::debug!(
                fold = fold_idx,
                train = fold.train.len(),
                holdout = fold.holdout.len(),
                "fold predicted"
            );
            Ok((fold_idx, probs))
        })
        .collect::<LabelResult<Vec<_>>>()?;

    let mut out = ProbabilityMatrix::zeros(labels.len(), num_classes);
    for (fold_idx, probs) in predictions {
        for (row, &idx) in probs.rows().zip(&folds[fold_idx].holdout) {
            out.set_row(idx, row)?;
        }
    }
    Ok(out)
}

/// Stratified K-fold cross-validation in one call.
pub fn cross_val_pred_probs<C: Classifier>(
    classifier: &C,
    samples: &[C::Sample],
    labels: &[usize],
    sample_weights: Option<&[f64]>,
    num_classes: usize,
    num_folds: usize,
    seed: u64,
) -> LabelResult<ProbabilityMatrix> {
    let folds = stratified_folds(labels, num_classes, num_folds, seed)?;
    out_of_sample_pred_probs(classifier, samples, labels, sample_weights, num_classes, &folds)
}
