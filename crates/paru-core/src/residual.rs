//! Residual norms for checking a solution.

use crate::error::{ParuError, Result};
use crate::matrix::CscMatrix;

/// Relative residual `|b - A x|_1 / (|A|_1 |x|_1)` with the norms used.
///
/// When the denominator is zero, `resid` is the plain `|b - A x|_1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    pub resid: f64,
    pub anorm: f64,
    pub xnorm: f64,
}

/// Residual of one solution vector.
pub fn residual(a: &CscMatrix, x: &[f64], b: &[f64]) -> Result<Residual> {
    residual_matrix(a, x, b, 1)
}

/// Residual of an `n x nrhs` column-major block, with matrix 1-norms
/// (largest column sum) for `B - A X` and `X`.
pub fn residual_matrix(a: &CscMatrix, x: &[f64], b: &[f64], nrhs: usize) -> Result<Residual> {
    let (m, n) = (a.nrows(), a.ncols());
    if x.len() != n * nrhs || b.len() != m * nrhs {
        return Err(ParuError::invalid(format!(
            "residual of a {}x{} matrix needs x of length {} and b of length {}",
            m,
            n,
            n * nrhs,
            m * nrhs
        )));
    }
    let anorm = a.norm1();
    let mut rnorm = 0.0f64;
    let mut xnorm = 0.0f64;
    let mut ax = vec![0.0; m];
    for c in 0..nrhs {
        let xc = &x[c * n..(c + 1) * n];
        a.mul_vec(xc, &mut ax);
        let r: f64 = ax.iter().zip(&b[c * m..(c + 1) * m]).map(|(u, v)| (v - u).abs()).sum();
        rnorm = rnorm.max(r);
        xnorm = xnorm.max(xc.iter().map(|v| v.abs()).sum());
    }
    let denom = anorm * xnorm;
    let resid = if denom == 0.0 { rnorm } else { rnorm / denom };
    Ok(Residual { resid, anorm, xnorm })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_solution_has_zero_residual() {
        let a = CscMatrix::from_triplets(2, 2, &[(0, 0, 2.0), (1, 1, 4.0), (0, 1, 1.0)]).unwrap();
        let r = residual(&a, &[1.0, 1.0], &[3.0, 4.0]).unwrap();
        assert_eq!(r.resid, 0.0);
        assert_eq!(r.anorm, 5.0);
        assert_eq!(r.xnorm, 2.0);
    }

    #[test]
    fn test_zero_solution_reports_plain_norm() {
        let a = CscMatrix::identity(2);
        let r = residual(&a, &[0.0, 0.0], &[1.0, -2.0]).unwrap();
        assert_eq!(r.resid, 3.0);
    }

    #[test]
    fn test_matrix_form_takes_worst_column() {
        let a = CscMatrix::identity(2);
        let x = [1.0, 1.0, 1.0, 1.0];
        let b = [1.0, 1.0, 2.0, 1.0];
        let r = residual_matrix(&a, &x, &b, 2).unwrap();
        assert_eq!(r.resid, 0.5);
        assert!(residual_matrix(&a, &x, &b[..3], 2).is_err());
    }
}
