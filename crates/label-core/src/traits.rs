use crate::{LabelResult, Labels, ProbabilityMatrix};

/// Anything that can be trained on labelled samples.
///
/// The label-quality engine never looks inside a model; it only needs to fit
/// one on a subset of the data and ask it for class probabilities.
pub trait Classifier: Send + Sync {
    /// One training example (a feature vector, a document, ...).
    type Sample: Clone + Send + Sync;
    /// The fitted model returned by [`fit`](Classifier::fit).
    type Model: TrainedModel<Sample = Self::Sample>;

    /// Fit a fresh model. `weights`, when given, has one entry per sample.
    fn fit(
        &self,
        samples: &[Self::Sample],
        labels: &Labels,
        weights: Option<&[f64]>,
    ) -> LabelResult<Self::Model>;
}

/// A fitted model that predicts class probabilities.
pub trait TrainedModel: Send + Sync {
    type Sample;

    /// One row per sample; every row must have one column per class.
    fn predict_proba(&self, samples: &[Self::Sample]) -> LabelResult<ProbabilityMatrix>;

    /// Most probable class per sample.
    fn predict(&self, samples: &[Self::Sample]) -> LabelResult<Vec<usize>> {
        let probs = self.predict_proba(samples)?;
        Ok((0..probs.num_rows()).map(|i| probs.argmax(i)).collect())
    }
}
