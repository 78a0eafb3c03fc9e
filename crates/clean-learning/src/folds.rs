use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use label_core::{stats, LabelError, LabelResult};

/// One cross-validation split. Both index lists are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

/// Stratified K-fold split.
///
/// Each class's examples are shuffled with a generator seeded from `seed` and
/// dealt round-robin across the folds, so every fold holds roughly the same
/// share of each class. The dealing position carries over from one class to
/// the next to keep fold sizes balanced. Every example lands in exactly one
/// holdout set, and the same seed always yields the same folds.
pub fn stratified_folds(
    labels: &[usize],
    num_classes: usize,
    num_folds: usize,
    seed: u64,
) -> LabelResult<Vec<Fold>> {
    if num_folds < 2 {
        return Err(LabelError::InvalidConfig(format!(
            "cross-validation needs at least 2 folds, got {}",
            num_folds
        )));
    }
    if num_folds > labels.len() {
        return Err(LabelError::InvalidConfig(format!(
            "{} folds requested for {} examples",
            num_folds,
            labels.len()
        )));
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); num_classes];
    for (idx, &label) in labels.iter().enumerate() {
        let members = by_class.get_mut(label).ok_or(LabelError::InvalidLabel {
            index: idx,
            label,
            num_classes,
        })?;
        members.push(idx);
    }

    let class_sizes = stats::value_counts(labels, num_classes);
    let small: Vec<usize> = (0..num_classes)
        .filter(|&c| class_sizes[c] > 0 && class_sizes[c] < num_folds)
        .collect();
    if !small.is_empty() {
        tracing::warn!(
            classes = ?small,
            folds = num_folds,
            "some classes have fewer examples than folds; not every fold can hold them"
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; labels.len()];
    let mut position = 0usize;
    for members in by_class.iter_mut() {
        members.shuffle(&mut rng);
        for &idx in members.iter() {
            assignment[idx] = position % num_folds;
            position += 1;
        }
    }

    Ok((0..num_folds)
        .map(|fold| {
            let (holdout, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&idx| assignment[idx] == fold);
            Fold { train, holdout }
        })
        .collect())
}
