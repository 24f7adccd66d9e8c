//! Dense row-major sample matrix (rows = time samples, columns = space channels).

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| ProtocolError::shape(format!("{} x {} overflows", rows, cols)))?;
        if data.len() != expected {
            return Err(ProtocolError::shape(format!(
                "{} x {} matrix needs {} values, got {}",
                rows,
                cols,
                expected,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Empty matrix with a fixed channel count, pre-allocating `row_capacity` rows.
    pub fn with_capacity(cols: usize, row_capacity: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::with_capacity(cols.saturating_mul(row_capacity)),
        }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Append rows `start..end` of `other` to the bottom of this matrix.
    pub fn extend_rows(&mut self, other: &Matrix, start: usize, end: usize) -> Result<()> {
        if other.cols != self.cols {
            return Err(ProtocolError::shape(format!(
                "cannot append {} channels to a {} channel matrix",
                other.cols, self.cols
            )));
        }
        if start > end || end > other.rows {
            return Err(ProtocolError::shape(format!(
                "row range {}..{} out of bounds for {} rows",
                start, end, other.rows
            )));
        }
        self.data
            .extend_from_slice(&other.data[start * other.cols..end * other.cols]);
        self.rows += end - start;
        Ok(())
    }
}
