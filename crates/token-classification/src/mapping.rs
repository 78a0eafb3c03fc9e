//! Class merging, e.g. collapsing BIO tags (`B-PER`, `I-PER`) into entities.

use label_core::{LabelError, LabelResult, ProbabilityMatrix};

/// Map every label through `maps`, so label `l` becomes `maps[l]`.
pub fn map_labels(labels: &[usize], maps: &[usize]) -> LabelResult<Vec<usize>> {
    labels
        .iter()
        .enumerate()
        .map(|(index, &label)| {
            maps.get(label).copied().ok_or(LabelError::InvalidLabel {
                index,
                label,
                num_classes: maps.len(),
            })
        })
        .collect()
}

/// Merge probability columns: column `i` is added into column `maps[i]`.
///
/// A `None` entry drops that column, and every row is then renormalised to
/// sum to 1. A row whose remaining mass is zero stays all zeros. The output
/// has `max(maps) + 1` columns.
pub fn merge_probs(
    probs: &ProbabilityMatrix,
    maps: &[Option<usize>],
) -> LabelResult<ProbabilityMatrix> {
    if maps.len() != probs.num_classes() {
        return Err(LabelError::ShapeMismatch(format!(
            "class map has {} entries, probabilities have {} columns",
            maps.len(),
            probs.num_classes()
        )));
    }
    let merged_classes = maps
        .iter()
        .flatten()
        .max()
        .map(|m| m + 1)
        .ok_or_else(|| LabelError::InvalidConfig("class map drops every column".to_string()))?;
    let renormalise = maps.iter().any(Option::is_none);

    let mut values = Vec::with_capacity(probs.num_rows() * merged_classes);
    for row in probs.rows() {
        let mut merged = vec![0.0; merged_classes];
        for (p, target) in row.iter().zip(maps) {
            if let Some(t) = target {
                merged[*t] += p;
            }
        }
        if renormalise {
            let total: f64 = merged.iter().sum();
            if total > 0.0 {
                merged.iter_mut().for_each(|v| *v /= total);
            }
        }
        values.extend(merged);
    }

    ProbabilityMatrix::from_flat(probs.num_rows(), merged_classes, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sentence_probs() -> Vec<ProbabilityMatrix> {
        vec![
            ProbabilityMatrix::from_rows(vec![vec![0.9, 0.1, 0.0, 0.0], vec![0.6, 0.2, 0.2, 0.0]])
                .unwrap(),
            ProbabilityMatrix::from_rows(vec![
                vec![0.1, 0.0, 0.9, 0.0],
                vec![0.1, 0.8, 0.1, 0.0],
                vec![0.1, 0.8, 0.1, 0.0],
            ])
            .unwrap(),
            ProbabilityMatrix::from_rows(vec![vec![0.1, 0.1, 0.8, 0.0]]).unwrap(),
        ]
    }

    fn assert_rows(actual: &ProbabilityMatrix, expected: &[[f64; 2]]) {
        assert_eq!(actual.num_rows(), expected.len());
        for (i, row) in expected.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                assert_relative_eq!(actual.get(i, j), *v, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_map_labels() {
        let maps = [0, 1, 0, 1];
        assert_eq!(map_labels(&[0, 0], &maps).unwrap(), vec![0, 0]);
        assert_eq!(map_labels(&[1, 1, 1], &maps).unwrap(), vec![1, 1, 1]);
        assert_eq!(map_labels(&[2], &maps).unwrap(), vec![0]);
        assert!(matches!(
            map_labels(&[4], &maps),
            Err(LabelError::InvalidLabel { label: 4, .. })
        ));
    }

    #[test]
    fn test_merge_probs() {
        let maps = [Some(0), Some(1), Some(0), Some(1)];
        let probs = sentence_probs();
        assert_rows(&merge_probs(&probs[0], &maps).unwrap(), &[[0.9, 0.1], [0.8, 0.2]]);
        assert_rows(
            &merge_probs(&probs[1], &maps).unwrap(),
            &[[1.0, 0.0], [0.2, 0.8], [0.2, 0.8]],
        );
        assert_rows(&merge_probs(&probs[2], &maps).unwrap(), &[[0.9, 0.1]]);
    }

    #[test]
    fn test_merge_probs_with_normalization() {
        let probs = sentence_probs();

        let maps = [None, Some(1), Some(0), Some(1)];
        assert_rows(&merge_probs(&probs[0], &maps).unwrap(), &[[0.0, 1.0], [0.5, 0.5]]);
        assert_rows(
            &merge_probs(&probs[1], &maps).unwrap(),
            &[[1.0, 0.0], [1.0 / 9.0, 8.0 / 9.0], [1.0 / 9.0, 8.0 / 9.0]],
        );
        assert_rows(&merge_probs(&probs[2], &maps).unwrap(), &[[8.0 / 9.0, 1.0 / 9.0]]);

        let maps = [Some(0), None, Some(0), Some(1)];
        assert_rows(&merge_probs(&probs[0], &maps).unwrap(), &[[1.0, 0.0], [1.0, 0.0]]);
        assert_rows(
            &merge_probs(&probs[1], &maps).unwrap(),
            &[[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]],
        );
    }

    #[test]
    fn test_merge_probs_rejects_bad_maps() {
        let probs = sentence_probs();
        assert!(matches!(
            merge_probs(&probs[0], &[Some(0), Some(1)]),
            Err(LabelError::ShapeMismatch(_))
        ));
        assert!(matches!(
            merge_probs(&probs[0], &[None, None, None, None]),
            Err(LabelError::InvalidConfig(_))
        ));
    }
}
