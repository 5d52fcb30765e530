//! Row scaling.

use crate::error::{ParuError, Result};
use crate::matrix::CscMatrix;

/// Row scale factors: the largest magnitude in each row, or all ones
/// when scaling is off. A row with no nonzero entry is reported as
/// `ZeroRow` in either case.
pub(crate) fn row_scale_factors(a: &CscMatrix, scale: bool) -> Result<Vec<f64>> {
    let mut rs = vec![0.0f64; a.nrows()];
    for (&i, &v) in a.row_idx().iter().zip(a.values()) {
        let v = v.abs();
        if v > rs[i] || v.is_nan() {
            rs[i] = v;
        }
    }
    if let Some(row) = rs.iter().position(|&s| s == 0.0) {
        return Err(ParuError::ZeroRow { row });
    }
    if scale {
        Ok(rs)
    } else {
        Ok(vec![1.0; a.nrows()])
    }
}
