//! Token-level label issue search.

use confident_learning::{LabelIssueEngine, LabelIssueReport};
use label_core::{LabelError, LabelResult, ProbabilityMatrix};

/// `(sentence, token)` position of a token.
pub type TokenIssue = (usize, usize);

/// Sentences flattened into one example list, with the offsets needed to map
/// flat indices back to `(sentence, token)`.
#[derive(Debug, Clone)]
pub struct FlatTokens {
    pub labels: Vec<usize>,
    pub pred_probs: ProbabilityMatrix,
    /// `offsets[i]` is the flat index of the first token of sentence `i`.
    offsets: Vec<usize>,
}

impl FlatTokens {
    /// Flatten per-sentence labels and probabilities. Every sentence must
    /// have one probability row per label, and all sentences must agree on
    /// the number of classes.
    pub fn new(labels: &[Vec<usize>], pred_probs: &[ProbabilityMatrix]) -> LabelResult<Self> {
        if labels.len() != pred_probs.len() {
            return Err(LabelError::ShapeMismatch(format!(
                "{} labelled sentences but {} probability matrices",
                labels.len(),
                pred_probs.len()
            )));
        }
        let num_classes = pred_probs
            .first()
            .map(ProbabilityMatrix::num_classes)
            .ok_or_else(|| LabelError::ShapeMismatch("no sentences".to_string()))?;

        let mut offsets = Vec::with_capacity(labels.len());
        let mut flat_labels = Vec::new();
        let mut values = Vec::new();
        for (i, (sentence_labels, probs)) in labels.iter().zip(pred_probs).enumerate() {
            if probs.num_rows() != sentence_labels.len() {
                return Err(LabelError::ShapeMismatch(format!(
                    "sentence {} has {} labels but {} probability rows",
                    i,
                    sentence_labels.len(),
                    probs.num_rows()
                )));
            }
            if probs.num_classes() != num_classes {
                return Err(LabelError::ShapeMismatch(format!(
                    "sentence {} has {} classes, expected {}",
                    i,
                    probs.num_classes(),
                    num_classes
                )));
            }
            offsets.push(flat_labels.len());
            flat_labels.extend_from_slice(sentence_labels);
            for row in probs.rows() {
                values.extend_from_slice(row);
            }
        }

        let pred_probs = ProbabilityMatrix::from_flat(flat_labels.len(), num_classes, values)?;
        Ok(Self {
            labels: flat_labels,
            pred_probs,
            offsets,
        })
    }

    pub fn num_tokens(&self) -> usize {
        self.labels.len()
    }

    pub fn num_sentences(&self) -> usize {
        self.offsets.len()
    }

    /// Map a flat index back to its `(sentence, token)` position.
    pub fn locate(&self, flat_index: usize) -> TokenIssue {
        // Last sentence starting at or before the index; empty sentences
        // share an offset with their successor and are skipped.
        let sentence = self.offsets.partition_point(|&start| start <= flat_index) - 1;
        (sentence, flat_index - self.offsets[sentence])
    }

    /// Split a flat per-token vector back into sentences.
    pub fn unflatten<T: Clone>(&self, flat: &[T]) -> Vec<Vec<T>> {
        self.offsets
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = self.offsets.get(i + 1).copied().unwrap_or(flat.len());
                flat[start..end].to_vec()
            })
            .collect()
    }
}

/// Run the engine over every token of every sentence.
///
/// Returns the full engine report over the flattened tokens together with the
/// flattening, so callers can map any per-example output back to sentences.
pub fn find_token_report(
    engine: &LabelIssueEngine,
    labels: &[Vec<usize>],
    pred_probs: &[ProbabilityMatrix],
) -> LabelResult<(FlatTokens, LabelIssueReport)> {
    let flat = FlatTokens::new(labels, pred_probs)?;
    tracing::debug!(
        sentences = flat.num_sentences(),
        tokens = flat.num_tokens(),
        "searching token label issues"
    );
    let report = engine.find_label_issues(&flat.labels, &flat.pred_probs, None)?;
    Ok((flat, report))
}

/// Tokens whose label is likely wrong, most suspicious first.
pub fn find_label_issues(
    engine: &LabelIssueEngine,
    labels: &[Vec<usize>],
    pred_probs: &[ProbabilityMatrix],
) -> LabelResult<Vec<TokenIssue>> {
    let (flat, report) = find_token_report(engine, labels, pred_probs)?;
    Ok(report
        .ranked_issues()
        .into_iter()
        .map(|idx| flat.locate(idx))
        .collect())
}
