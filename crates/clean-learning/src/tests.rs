use approx::assert_relative_eq;
use label_core::{Classifier, LabelError, LabelResult, ProbabilityMatrix, TrainedModel};

use crate::clean::CleanLearning;
use crate::config::CleanLearningConfig;
use crate::cross_validation::{cross_val_pred_probs, out_of_sample_pred_probs};
use crate::folds::stratified_folds;

/// One-dimensional nearest-centroid classifier. Probabilities are a softmax
/// over negative squared distances; classes absent from training get 0.
struct NearestCentroid {
    num_classes: usize,
}

struct CentroidModel {
    centroids: Vec<Option<f64>>,
}

impl Classifier for NearestCentroid {
    type Sample = f64;
    type Model = CentroidModel;

    fn fit(
        &self,
        samples: &[f64],
        labels: &[usize],
        weights: Option<&[f64]>,
    ) -> LabelResult<CentroidModel> {
        let mut sums = vec![0.0; self.num_classes];
        let mut totals = vec![0.0; self.num_classes];
        for (i, (&x, &label)) in samples.iter().zip(labels).enumerate() {
            let w = weights.map_or(1.0, |w| w[i]);
            sums[label] += w * x;
            totals[label] += w;
        }
        let centroids = sums
            .into_iter()
            .zip(totals)
            .map(|(s, t)| if t > 0.0 { Some(s / t) } else { None })
            .collect();
        Ok(CentroidModel { centroids })
    }
}

impl TrainedModel for CentroidModel {
    type Sample = f64;

    fn predict_proba(&self, samples: &[f64]) -> LabelResult<ProbabilityMatrix> {
        let rows = samples
            .iter()
            .map(|&x| {
                let logits: Vec<Option<f64>> =
                    self.centroids.iter().map(|c| c.map(|c| -(x - c).powi(2))).collect();
                let max = logits.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
                let weights: Vec<f64> = logits
                    .iter()
                    .map(|l| l.map_or(0.0, |l| (l - max).exp()))
                    .collect();
                let total: f64 = weights.iter().sum();
                weights.into_iter().map(|w| w / total).collect()
            })
            .collect();
        ProbabilityMatrix::from_rows(rows)
    }
}

/// Always predicts three columns, whatever the data.
struct WrongWidth;

impl Classifier for WrongWidth {
    type Sample = f64;
    type Model = WrongWidth;

    fn fit(&self, _: &[f64], _: &[usize], _: Option<&[f64]>) -> LabelResult<WrongWidth> {
        Ok(WrongWidth)
    }
}

impl TrainedModel for WrongWidth {
    type Sample = f64;

    fn predict_proba(&self, samples: &[f64]) -> LabelResult<ProbabilityMatrix> {
        ProbabilityMatrix::from_rows(samples.iter().map(|_| vec![0.2, 0.3, 0.5]).collect())
    }
}

/// Class 0 near 0, class 1 near 11. Example 9 sits among class 1 but is
/// labelled 0.
fn dataset() -> (Vec<f64>, Vec<usize>) {
    let mut samples: Vec<f64> = (0..9).map(|i| i as f64 * 0.1).collect();
    let mut labels = vec![0; 9];
    samples.push(10.1);
    labels.push(0);
    samples.extend((0..10).map(|i| 10.0 + i as f64 * 0.2));
    labels.extend(vec![1; 10]);
    (samples, labels)
}

#[test]
fn test_cross_validation_fills_every_row() {
    let (samples, labels) = dataset();
    let probs = cross_val_pred_probs(
        &NearestCentroid { num_classes: 2 },
        &samples,
        &labels,
        None,
        2,
        5,
        3,
    )
    .unwrap();

    assert_eq!(probs.num_rows(), 20);
    for row in probs.rows() {
        assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }
    // The mislabeled example is predicted out of sample, so it looks like class 1.
    assert!(probs.get(9, 1) > 0.99);
    assert!(probs.get(0, 0) > 0.99);
}

#[test]
fn test_wrong_probability_width_is_a_classifier_error() {
    let (samples, labels) = dataset();
    let folds = stratified_folds(&labels, 2, 4, 0).unwrap();
    let result = out_of_sample_pred_probs(&WrongWidth, &samples, &labels, None, 2, &folds);
    assert!(matches!(result, Err(LabelError::Classifier(_))));
}

#[test]
fn test_find_label_issues_with_cross_validation() {
    let (samples, labels) = dataset();
    let cl = CleanLearning::new(
        NearestCentroid { num_classes: 2 },
        CleanLearningConfig::default(),
    )
    .unwrap();
    let report = cl.find_label_issues(&samples, &labels, None, None).unwrap();
    assert_eq!(report.label_issues.iter().copied().collect::<Vec<_>>(), vec![9]);
}

#[test]
fn test_fit_drops_flagged_example() {
    let (samples, labels) = dataset();
    let cl = CleanLearning::new(
        NearestCentroid { num_classes: 2 },
        CleanLearningConfig::default(),
    )
    .unwrap();
    let clean = cl.fit(&samples, &labels, None, None).unwrap();

    assert_eq!(clean.kept_indices.len(), 19);
    assert!(!clean.kept_indices.contains(&9));
    assert!(clean.sample_weights.is_none());
    assert_relative_eq!(clean.model.centroids[0].unwrap(), 0.4, epsilon = 1e-9);
    assert_eq!(clean.predict(&[0.3, 10.5]).unwrap(), vec![0, 1]);
    assert_relative_eq!(clean.score(&[0.3, 10.5], &[0, 1]).unwrap(), 1.0);
}

#[test]
fn test_fit_with_given_probabilities_skips_cross_validation() {
    let (samples, labels) = dataset();
    let rows = labels
        .iter()
        .map(|&l| if l == 0 { vec![0.9, 0.1] } else { vec![0.1, 0.9] })
        .collect();
    let probs = ProbabilityMatrix::from_rows(rows).unwrap();

    let cl = CleanLearning::new(WrongWidth, CleanLearningConfig::default()).unwrap();
    let report = cl.find_label_issues(&samples, &labels, Some(&probs), None).unwrap();
    assert!(report.label_issues.is_empty());
}

#[test]
fn test_reweighting_by_retention_rate() {
    let (samples, labels) = dataset();
    let config = CleanLearningConfig {
        reweight_by_noise: true,
        ..CleanLearningConfig::default()
    };
    let cl = CleanLearning::new(NearestCentroid { num_classes: 2 }, config).unwrap();
    let clean = cl.fit(&samples, &labels, None, None).unwrap();

    let weights = clean.sample_weights.as_ref().unwrap();
    assert_eq!(weights.len(), clean.kept_indices.len());
    for (&idx, &w) in clean.kept_indices.iter().zip(weights) {
        let retention = clean.report.latent.retention_rate(labels[idx]);
        assert_relative_eq!(w, 1.0 / retention, epsilon = 1e-9);
        assert!(w >= 1.0);
    }
}

#[test]
fn test_confusion_matrix_of_cleaned_model() {
    let (samples, labels) = dataset();
    let cl = CleanLearning::new(
        NearestCentroid { num_classes: 2 },
        CleanLearningConfig::default(),
    )
    .unwrap();
    let clean = cl.fit(&samples, &labels, None, None).unwrap();

    // Only the mislabeled example disagrees with the model.
    let confusion = clean.confusion_matrix(&samples, &labels).unwrap();
    assert_eq!(confusion.to_rows(), vec![vec![9.0, 1.0], vec![0.0, 10.0]]);
    assert_relative_eq!(clean.score(&samples, &labels).unwrap(), 19.0 / 20.0);
    assert!(clean.confusion_matrix(&samples, &labels[..3]).is_err());
}
