//! Input contract checks, run before any stage.

use label_core::{LabelError, LabelResult, Labels, ProbabilityMatrix};

use crate::config::EngineConfig;

/// Reject inputs that break the engine's contract instead of repairing them.
/// Rows that do not sum to 1 are an error; nothing is renormalised.
pub fn validate_inputs(
    labels: &Labels,
    pred_probs: &ProbabilityMatrix,
    sample_weights: Option<&[f64]>,
    config: &EngineConfig,
) -> LabelResult<()> {
    let num_examples = pred_probs.num_rows();
    let num_classes = pred_probs.num_classes();

    if num_examples == 0 {
        return Err(LabelError::ShapeMismatch("no examples given".to_string()));
    }
    if labels.len() != num_examples {
        return Err(LabelError::ShapeMismatch(format!(
            "{} labels but {} probability rows",
            labels.len(),
            num_examples
        )));
    }
    if num_classes < 2 {
        return Err(LabelError::TooFewClasses(num_classes));
    }
    if let Some((index, &label)) = labels.iter().enumerate().find(|(_, &l)| l >= num_classes) {
        return Err(LabelError::InvalidLabel {
            index,
            label,
            num_classes,
        });
    }

    pred_probs.validate(config.row_sum_tolerance)?;

    if let Some(weights) = sample_weights {
        if weights.len() != num_examples {
            return Err(LabelError::InvalidWeights(format!(
                "{} weights for {} examples",
                weights.len(),
                num_examples
            )));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(LabelError::InvalidWeights(format!(
                "weight {} is negative or not finite",
                bad
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(LabelError::InvalidWeights(
                "weights sum to zero".to_string(),
            ));
        }
    }

    config.validate_for(num_classes)
}
