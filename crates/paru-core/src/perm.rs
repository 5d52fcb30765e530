//! Permutation and scaling of dense vectors and column-major blocks.
//!
//! `perm` gathers and divides, `inv_perm` scatters and multiplies, so
//! `inv_perm(p, s, perm(p, s, b)) == b` for any permutation `p`.

use crate::error::{ParuError, Result};

fn check(p: &[usize], s: Option<&[f64]>, len: usize, n: usize, nrhs: usize) -> Result<()> {
    if p.len() != n || len != n * nrhs || s.is_some_and(|s| s.len() != n) {
        return Err(ParuError::invalid(format!(
            "permutation of length {} does not fit a {} x {} block",
            p.len(),
            n,
            nrhs
        )));
    }
    let mut seen = vec![false; n];
    for &i in p {
        if i >= n {
            return Err(ParuError::invalid("permutation entry out of range"));
        }
        if std::mem::replace(&mut seen[i], true) {
            return Err(ParuError::invalid(format!("permutation repeats entry {}", i)));
        }
    }
    Ok(())
}

/// `x[k] = b[p[k]] / s[p[k]]`.
pub fn perm(p: &[usize], s: Option<&[f64]>, b: &[f64]) -> Result<Vec<f64>> {
    perm_matrix(p, s, b, p.len(), 1)
}

/// `x[p[k]] = b[k]`, then `x[i] *= s[i]`.
pub fn inv_perm(p: &[usize], s: Option<&[f64]>, b: &[f64]) -> Result<Vec<f64>> {
    inv_perm_matrix(p, s, b, p.len(), 1)
}

/// Row permutation of an `n x nrhs` column-major block.
pub fn perm_matrix(p: &[usize], s: Option<&[f64]>, b: &[f64], n: usize, nrhs: usize) -> Result<Vec<f64>> {
    check(p, s, b.len(), n, nrhs)?;
    let mut x = vec![0.0; b.len()];
    for c in 0..nrhs {
        let (src, dst) = (&b[c * n..(c + 1) * n], &mut x[c * n..(c + 1) * n]);
        match s {
            Some(s) => {
                for (k, &i) in p.iter().enumerate() {
                    dst[k] = src[i] / s[i];
                }
            }
            None => {
                for (k, &i) in p.iter().enumerate() {
                    dst[k] = src[i];
                }
            }
        }
    }
    Ok(x)
}

pub fn inv_perm_matrix(p: &[usize], s: Option<&[f64]>, b: &[f64], n: usize, nrhs: usize) -> Result<Vec<f64>> {
    check(p, s, b.len(), n, nrhs)?;
    let mut x = vec![0.0; b.len()];
    for c in 0..nrhs {
        let (src, dst) = (&b[c * n..(c + 1) * n], &mut x[c * n..(c + 1) * n]);
        for (k, &i) in p.iter().enumerate() {
            dst[i] = src[k];
        }
        if let Some(s) = s {
            for (v, &si) in dst.iter_mut().zip(s) {
                *v *= si;
            }
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Info;

    #[test]
    fn test_perm_gathers_and_scales() {
        let p = [2, 0, 1];
        let s = [1.0, 2.0, 4.0];
        assert_eq!(perm(&p, None, &[10.0, 20.0, 30.0]).unwrap(), vec![30.0, 10.0, 20.0]);
        assert_eq!(perm(&p, Some(&s), &[10.0, 20.0, 40.0]).unwrap(), vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_inv_perm_undoes_perm() {
        let p = [3, 1, 0, 2];
        let s = [0.5, 2.0, 8.0, 1.0];
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let x = perm_matrix(&p, Some(&s), &b, 4, 2).unwrap();
        assert_eq!(inv_perm_matrix(&p, Some(&s), &x, 4, 2).unwrap(), b.to_vec());
    }

    #[test]
    fn test_rejects_bad_permutation() {
        assert!(perm(&[0, 3], None, &[1.0, 2.0]).is_err());
        assert!(perm(&[0, 1], Some(&[1.0]), &[1.0, 2.0]).is_err());
        assert!(perm_matrix(&[0, 1], None, &[1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn test_rejects_repeated_entry() {
        let err = perm(&[0, 0], None, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.info(), Info::Invalid);
        assert!(inv_perm(&[1, 2, 1], Some(&[1.0; 3]), &[1.0; 3]).is_err());
        assert!(perm_matrix(&[1, 0, 1], None, &[0.0; 6], 3, 2).is_err());
    }
}
