use serde::{Deserialize, Serialize};

use crate::{LabelError, LabelResult};

/// Noisy labels, one class index in `0..K` per example.
pub type Labels = [usize];

/// Row-major N×K matrix of predicted class probabilities, one row per example.
///
/// Rows are expected to be out-of-sample predictions: no row may come from a
/// model that saw its own example during training. That invariant belongs to
/// whoever produced the matrix and is not checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct ProbabilityMatrix {
    num_rows: usize,
    num_classes: usize,
    values: Vec<f64>,
}

impl ProbabilityMatrix {
    /// Build from nested rows. Every row must have the same, non-zero length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> LabelResult<Self> {
        let num_classes = rows.first().map(|r| r.len()).ok_or_else(|| {
            LabelError::ShapeMismatch("probability matrix has no rows".to_string())
        })?;
        if num_classes == 0 {
            return Err(LabelError::ShapeMismatch(
                "probability matrix has no columns".to_string(),
            ));
        }

        let num_rows = rows.len();
        let mut values = Vec::with_capacity(num_rows * num_classes);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != num_classes {
                return Err(LabelError::ShapeMismatch(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    num_classes
                )));
            }
            values.extend(row);
        }

        Ok(Self {
            num_rows,
            num_classes,
            values,
        })
    }

    /// Build from a flat row-major buffer.
    pub fn from_flat(num_rows: usize, num_classes: usize, values: Vec<f64>) -> LabelResult<Self> {
        if num_classes == 0 || values.len() != num_rows * num_classes {
            return Err(LabelError::ShapeMismatch(format!(
                "buffer of {} values cannot form a {}x{} matrix",
                values.len(),
                num_rows,
                num_classes
            )));
        }
        Ok(Self {
            num_rows,
            num_classes,
            values,
        })
    }

    /// All-zero matrix, filled in row by row with [`set_row`](Self::set_row).
    pub fn zeros(num_rows: usize, num_classes: usize) -> Self {
        Self {
            num_rows,
            num_classes,
            values: vec![0.0; num_rows * num_classes],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.num_classes;
        &self.values[start..start + self.num_classes]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.num_classes)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.num_classes + j]
    }

    pub fn set_row(&mut self, i: usize, row: &[f64]) -> LabelResult<()> {
        if row.len() != self.num_classes {
            return Err(LabelError::ShapeMismatch(format!(
                "row has {} columns, expected {}",
                row.len(),
                self.num_classes
            )));
        }
        if i >= self.num_rows {
            return Err(LabelError::ShapeMismatch(format!(
                "row index {} out of range for {} rows",
                i, self.num_rows
            )));
        }
        let start = i * self.num_classes;
        self.values[start..start + self.num_classes].copy_from_slice(row);
        Ok(())
    }

    /// Index of the largest probability in row `i` (lowest index on ties).
    pub fn argmax(&self, i: usize) -> usize {
        crate::stats::argmax(self.row(i))
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut values = Vec::with_capacity(indices.len() * self.num_classes);
        for &i in indices {
            values.extend_from_slice(self.row(i));
        }
        Self {
            num_rows: indices.len(),
            num_classes: self.num_classes,
            values,
        }
    }

    /// Check that every entry is finite and non-negative and every row sums
    /// to 1 within `tolerance`. Nothing is renormalised.
    pub fn validate(&self, tolerance: f64) -> LabelResult<()> {
        for (i, row) in self.rows().enumerate() {
            if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(LabelError::InvalidProbability {
                    row: i,
                    reason: format!("entry {} is negative or not finite", bad),
                });
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > tolerance {
                return Err(LabelError::InvalidProbability {
                    row: i,
                    reason: format!("row sums to {:.6}, expected 1 (tolerance {})", sum, tolerance),
                });
            }
        }
        Ok(())
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for ProbabilityMatrix {
    type Error = LabelError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<ProbabilityMatrix> for Vec<Vec<f64>> {
    fn from(matrix: ProbabilityMatrix) -> Self {
        matrix.to_rows()
    }
}

/// Square K×K matrix indexed `[noisy label][true label]`.
///
/// Used for the confident joint (counts or weighted counts), the calibrated
/// joint, and the noise matrices derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct LabelMatrix {
    size: usize,
    values: Vec<f64>,
}

impl LabelMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::zeros(size);
        for i in 0..size {
            matrix.set(i, i, 1.0);
        }
        matrix
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> LabelResult<Self> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(LabelError::ShapeMismatch(format!(
                    "label matrix must be square: row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            values.extend(row);
        }
        Ok(Self { size, values })
    }

    /// Number of classes (rows == columns).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.size + j] = value;
    }

    pub fn add(&mut self, i: usize, j: usize, amount: f64) {
        self.values[i * self.size + j] += amount;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.size;
        &self.values[start..start + self.size]
    }

    pub fn row_sum(&self, i: usize) -> f64 {
        self.row(i).iter().sum()
    }

    pub fn col_sum(&self, j: usize) -> f64 {
        (0..self.size).map(|i| self.get(i, j)).sum()
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.size).map(|i| self.row_sum(i)).collect()
    }

    pub fn col_sums(&self) -> Vec<f64> {
        (0..self.size).map(|j| self.col_sum(j)).collect()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.size).map(|i| self.get(i, i)).collect()
    }

    pub fn trace(&self) -> f64 {
        self.diagonal().iter().sum()
    }

    /// Mass of row `i` outside the diagonal.
    pub fn row_off_diagonal(&self, i: usize) -> f64 {
        self.row_sum(i) - self.get(i, i)
    }

    pub fn off_diagonal_sum(&self) -> f64 {
        self.total() - self.trace()
    }

    /// Multiply every entry by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            size: self.size,
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    pub fn scale_row(&mut self, i: usize, factor: f64) {
        let start = i * self.size;
        for v in &mut self.values[start..start + self.size] {
            *v *= factor;
        }
    }

    /// True when every off-diagonal entry is within `tolerance` of zero.
    pub fn is_diagonal(&self, tolerance: f64) -> bool {
        (0..self.size).all(|i| {
            (0..self.size).all(|j| i == j || self.get(i, j).abs() <= tolerance)
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.size).map(|i| self.row(i).to_vec()).collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for LabelMatrix {
    type Error = LabelError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<LabelMatrix> for Vec<Vec<f64>> {
    fn from(matrix: LabelMatrix) -> Self {
        matrix.to_rows()
    }
}
