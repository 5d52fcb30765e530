//! Compressed sparse column matrix container.

use crate::error::{ParuError, Result};

/// A real sparse matrix in compressed sparse column form.
///
/// Row indices within each column are strictly increasing. Explicit
/// zeros are allowed and take part in the sparsity pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CscMatrix {
    /// Build a matrix from CSC arrays, validating the structure.
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if col_ptr.len() != ncols + 1 {
            return Err(ParuError::invalid(format!(
                "column pointer array has length {}, expected {}",
                col_ptr.len(),
                ncols + 1
            )));
        }
        if col_ptr[0] != 0 {
            return Err(ParuError::invalid("column pointers must start at 0"));
        }
        let nnz = col_ptr[ncols];
        if row_idx.len() != nnz || values.len() != nnz {
            return Err(ParuError::invalid(format!(
                "expected {} entries, got {} row indices and {} values",
                nnz,
                row_idx.len(),
                values.len()
            )));
        }
        for j in 0..ncols {
            if col_ptr[j] > col_ptr[j + 1] || col_ptr[j + 1] > nnz {
                return Err(ParuError::invalid(format!(
                    "column pointers decrease at column {}",
                    j
                )));
            }
            let rows = &row_idx[col_ptr[j]..col_ptr[j + 1]];
            for (k, &i) in rows.iter().enumerate() {
                if i >= nrows {
                    return Err(ParuError::invalid(format!(
                        "row index {} out of range in column {}",
                        i, j
                    )));
                }
                if k > 0 && rows[k - 1] >= i {
                    return Err(ParuError::invalid(format!(
                        "row indices of column {} are not strictly increasing",
                        j
                    )));
                }
            }
        }
        Ok(Self {
            nrows,
            ncols,
            col_ptr,
            row_idx,
            values,
        })
    }

    /// Assemble a matrix from `(row, col, value)` triplets. Duplicates are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut count = vec![0usize; ncols + 1];
        for &(i, j, _) in triplets {
            if i >= nrows || j >= ncols {
                return Err(ParuError::invalid(format!(
                    "triplet ({}, {}) outside a {}x{} matrix",
                    i, j, nrows, ncols
                )));
            }
            count[j + 1] += 1;
        }
        for j in 0..ncols {
            count[j + 1] += count[j];
        }
        let mut next = count.clone();
        let mut entries = vec![(0usize, 0.0f64); triplets.len()];
        for &(i, j, v) in triplets {
            entries[next[j]] = (i, v);
            next[j] += 1;
        }

        let mut col_ptr = Vec::with_capacity(ncols + 1);
        let mut row_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        col_ptr.push(0);
        for j in 0..ncols {
            let col = &mut entries[count[j]..count[j + 1]];
            col.sort_by_key(|&(i, _)| i);
            for &(i, v) in col.iter() {
                if row_idx.len() > col_ptr[j] && row_idx.last() == Some(&i) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    row_idx.push(i);
                    values.push(v);
                }
            }
            col_ptr.push(row_idx.len());
        }
        Ok(Self {
            nrows,
            ncols,
            col_ptr,
            row_idx,
            values,
        })
    }

    /// The n x n identity.
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            col_ptr: (0..=n).collect(),
            row_idx: (0..n).collect(),
            values: vec![1.0; n],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.col_ptr[self.ncols]
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the values; the pattern stays fixed.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Row indices and values of column `j`.
    pub fn col(&self, j: usize) -> (&[usize], &[f64]) {
        let range = self.col_ptr[j]..self.col_ptr[j + 1];
        (&self.row_idx[range.clone()], &self.values[range])
    }

    /// y = A x
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        y.iter_mut().for_each(|v| *v = 0.0);
        for j in 0..self.ncols {
            let xj = x[j];
            if xj == 0.0 {
                continue;
            }
            let (rows, vals) = self.col(j);
            for (&i, &v) in rows.iter().zip(vals) {
                y[i] += v * xj;
            }
        }
    }

    /// Matrix 1-norm (largest column sum of magnitudes).
    pub fn norm1(&self) -> f64 {
        (0..self.ncols)
            .map(|j| self.col(j).1.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Dense column-major copy.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.nrows * self.ncols];
        for j in 0..self.ncols {
            let (rows, vals) = self.col(j);
            for (&i, &v) in rows.iter().zip(vals) {
                dense[i + j * self.nrows] = v;
            }
        }
        dense
    }

    /// True when this matrix has exactly the given column pointers and row indices.
    pub fn same_pattern(&self, col_ptr: &[usize], row_idx: &[usize]) -> bool {
        self.col_ptr == col_ptr && self.row_idx == row_idx
    }
}
