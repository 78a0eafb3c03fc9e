//! Numeric helpers shared by the label-quality crates.
//!
//! Everything here is a pure function over slices: counting labels, taking
//! means, finding argmaxes with a fixed tie rule, and rounding
//! real-valued counts to integers without losing their total.

use crate::LabelMatrix;

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Count how many times each class in `0..num_classes` occurs.
/// Labels outside the range are ignored.
pub fn value_counts(labels: &[usize], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        if label < num_classes {
            counts[label] += 1;
        }
    }
    counts
}

/// Per-class sums of example weights (plain counts when `weights` is `None`).
pub fn weighted_counts(labels: &[usize], weights: Option<&[f64]>, num_classes: usize) -> Vec<f64> {
    let mut counts = vec![0.0; num_classes];
    for (idx, &label) in labels.iter().enumerate() {
        if label < num_classes {
            counts[label] += weights.map_or(1.0, |w| w[idx]);
        }
    }
    counts
}

/// Index of the largest value. Ties go to the lowest index; NaN never wins.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] || values[best].is_nan() {
            best = idx;
        }
    }
    best
}

/// Largest value excluding position `skip` (0.0 when nothing else exists).
pub fn max_excluding(values: &[f64], skip: usize) -> f64 {
    values
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != skip)
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0)
}

/// Round floats to integers while keeping the rounded total equal to the
/// rounded sum of the inputs.
///
/// Values are first rounded half-to-even; the remaining difference is spread
/// over the entries with the largest rounding residuals (lowest index first
/// on equal residuals).
pub fn round_preserving_sum(values: &[f64]) -> Vec<i64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut ints: Vec<i64> = values.iter().map(|v| v.round_ties_even() as i64).collect();
    let target = values.iter().sum::<f64>().round_ties_even() as i64;

    loop {
        let current: i64 = ints.iter().sum();
        let diff = target - current;
        if diff == 0 {
            break;
        }
        let increment: i64 = if diff > 0 { 1 } else { -1 };
        let changes = (diff.unsigned_abs() as usize).min(values.len());

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = values[a] - ints[a] as f64;
            let rb = values[b] - ints[b] as f64;
            let cmp = if increment > 0 {
                rb.partial_cmp(&ra)
            } else {
                ra.partial_cmp(&rb)
            };
            cmp.unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
        });
        for &idx in order.iter().take(changes) {
            ints[idx] += increment;
        }
    }
    ints
}

/// Round every row of a matrix with [`round_preserving_sum`].
pub fn round_preserving_row_totals(matrix: &LabelMatrix) -> Vec<Vec<i64>> {
    (0..matrix.size())
        .map(|i| round_preserving_sum(matrix.row(i)))
        .collect()
}

/// Confusion counts with `actual` on rows and `predicted` on columns.
pub fn confusion_matrix(actual: &[usize], predicted: &[usize], num_classes: usize) -> LabelMatrix {
    let mut matrix = LabelMatrix::zeros(num_classes);
    for (&a, &p) in actual.iter().zip(predicted) {
        if a < num_classes && p < num_classes {
            matrix.add(a, p, 1.0);
        }
    }
    matrix
}

/// Number of distinct label values present.
pub fn num_unique_classes(labels: &[usize]) -> usize {
    let mut seen: Vec<usize> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
