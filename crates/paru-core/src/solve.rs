//! Forward and back substitution with the frontal factors.
//!
//! Right-hand sides are column-major `n x nrhs` blocks. `lsolve` and
//! `usolve` work in pivot order, without permutation or scaling, so that
//! `x = Q usolve(lsolve(P (R \ b)))`.

use rayon::prelude::*;

use crate::control::Control;
use crate::dense::{gemm_sub, lower_solve, upper_solve, KernelConfig};
use crate::error::{ParuError, Result};
use crate::numeric::Numeric;
use crate::perm::{inv_perm_matrix, perm_matrix};
use crate::symbolic::Symbolic;

fn check_pair(sym: &Symbolic, num: &Numeric, len: usize, nrhs: usize) -> Result<()> {
    if !num.pairs_with(sym) {
        return Err(ParuError::invalid("numeric factors do not belong to this analysis"));
    }
    if nrhs == 0 || len != sym.n * nrhs {
        return Err(ParuError::invalid(format!(
            "right-hand side has {} entries, expected {} x {}",
            len, sym.n, nrhs
        )));
    }
    Ok(())
}

/// Solve `A x = b`.
pub fn solve(sym: &Symbolic, num: &Numeric, b: &[f64], control: &Control) -> Result<Vec<f64>> {
    solve_matrix(sym, num, b, 1, control)
}

/// Solve `A x = b`, overwriting `x` (holding `b`) with the solution.
pub fn solve_in_place(sym: &Symbolic, num: &Numeric, x: &mut [f64], control: &Control) -> Result<()> {
    solve_matrix_in_place(sym, num, x, 1, control)
}

/// Solve `A X = B`, overwriting the column-major block `x` (holding `B`).
/// On error `x` is left unchanged.
pub fn solve_matrix_in_place(
    sym: &Symbolic,
    num: &Numeric,
    x: &mut [f64],
    nrhs: usize,
    control: &Control,
) -> Result<()> {
    let sol = solve_matrix(sym, num, x, nrhs, control)?;
    x.copy_from_slice(&sol);
    Ok(())
}

/// Solve `A X = B` for a column-major `n x nrhs` block.
pub fn solve_matrix(sym: &Symbolic, num: &Numeric, b: &[f64], nrhs: usize, control: &Control) -> Result<Vec<f64>> {
    check_pair(sym, num, b.len(), nrhs)?;
    let n = sym.n;
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut t = perm_matrix(&num.pfin, Some(&num.rs), b, n, nrhs)?;

    let threads = control.max_threads();
    if nrhs > 1 && threads > 1 {
        let per = nrhs.div_ceil(threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|_| ParuError::OutOfMemory { bytes: 0 })?;
        let cfg = KernelConfig::new(control, 1);
        pool.install(|| {
            t.par_chunks_mut(n * per).for_each(|block| {
                let k = block.len() / n;
                forward(sym, num, block, k, &cfg);
                backward(sym, num, block, k, &cfg);
            })
        });
    } else {
        let cfg = KernelConfig::new(control, threads);
        forward(sym, num, &mut t, nrhs, &cfg);
        backward(sym, num, &mut t, nrhs, &cfg);
    }

    inv_perm_matrix(&num.qfin, None, &t, n, nrhs)
}

/// `x := L \ x` in pivot order.
pub fn lsolve(sym: &Symbolic, num: &Numeric, x: &mut [f64], control: &Control) -> Result<()> {
    lsolve_matrix(sym, num, x, 1, control)
}

/// `x := U \ x` in pivot order.
pub fn usolve(sym: &Symbolic, num: &Numeric, x: &mut [f64], control: &Control) -> Result<()> {
    usolve_matrix(sym, num, x, 1, control)
}

pub fn lsolve_matrix(sym: &Symbolic, num: &Numeric, x: &mut [f64], nrhs: usize, control: &Control) -> Result<()> {
    check_pair(sym, num, x.len(), nrhs)?;
    forward(sym, num, x, nrhs, &KernelConfig::new(control, 1));
    Ok(())
}

pub fn usolve_matrix(sym: &Symbolic, num: &Numeric, x: &mut [f64], nrhs: usize, control: &Control) -> Result<()> {
    check_pair(sym, num, x.len(), nrhs)?;
    backward(sym, num, x, nrhs, &KernelConfig::new(control, 1));
    Ok(())
}

/// Row-singleton block, then the fronts in post-order.
fn forward(sym: &Symbolic, num: &Numeric, x: &mut [f64], nrhs: usize, cfg: &KernelConfig) {
    let n = sym.n;
    let cs1 = sym.cs1;

    for k in 0..sym.rs1 {
        let piv = cs1 + k;
        let (p0, p1) = (sym.slp[k], sym.slp[k + 1]);
        let d = num.slx[p0];
        for c in 0..nrhs {
            let col = &mut x[c * n..(c + 1) * n];
            let y = col[piv] / d;
            col[piv] = y;
            if y == 0.0 {
                continue;
            }
            for q in p0 + 1..p1 {
                col[num.row_position(sym.sli[q])] -= num.slx[q] * y;
            }
        }
    }

    let mut tmp = Vec::new();
    for (f, ff) in num.fronts.iter().enumerate() {
        let k = ff.npiv();
        let nr = ff.nrows();
        let p0 = sym.n1 + num.front_pivot_start[f];
        lower_solve(&ff.lus, nr, k, &mut x[p0..], n, nrhs, cfg);

        let below = nr - k;
        if below == 0 || k == 0 {
            continue;
        }
        tmp.clear();
        tmp.resize(below * nrhs, 0.0);
        gemm_sub(&ff.lus[k..], nr, &x[p0..], n, &mut tmp, below, below, nrhs, k, cfg);
        for c in 0..nrhs {
            let col = &mut x[c * n..(c + 1) * n];
            for (i, &r) in ff.frow_list[k..].iter().enumerate() {
                col[sym.n1 + num.row_pos[r]] += tmp[i + c * below];
            }
        }
    }
}

/// Fronts in reverse post-order, then the singleton blocks.
fn backward(sym: &Symbolic, num: &Numeric, x: &mut [f64], nrhs: usize, cfg: &KernelConfig) {
    let n = sym.n;

    let mut gathered = Vec::new();
    for (f, ff) in num.fronts.iter().enumerate().rev() {
        let k = ff.npiv();
        let nr = ff.nrows();
        let p0 = sym.n1 + num.front_pivot_start[f];
        let ncols = ff.fcol_list.len();
        if ncols > 0 && k > 0 {
            gathered.clear();
            for c in 0..nrhs {
                let col = &x[c * n..(c + 1) * n];
                gathered.extend(ff.fcol_list.iter().map(|&j| col[sym.n1 + num.col_pos[j]]));
            }
            gemm_sub(&ff.us, k, &gathered, ncols, &mut x[p0..], n, k, nrhs, ncols, cfg);
        }
        upper_solve(&ff.lus, nr, k, &mut x[p0..], n, nrhs, cfg);
    }

    for k in (0..sym.cs1).rev() {
        let (p0, p1) = (sym.sup[k], sym.sup[k + 1]);
        let d = num.sux[p0];
        for c in 0..nrhs {
            let col = &mut x[c * n..(c + 1) * n];
            let mut s = col[k];
            for q in p0 + 1..p1 {
                s -= num.sux[q] * col[num.col_position(sym.suj[q])];
            }
            col[k] = s / d;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CscMatrix;
    use crate::numeric::factorize;
    use crate::symbolic::analyze;

    fn check(a: &CscMatrix, x: &[f64], b: &[f64]) {
        let mut ax = vec![0.0; b.len()];
        a.mul_vec(x, &mut ax);
        for (u, v) in ax.iter().zip(b) {
            assert!((u - v).abs() < 1e-10, "{} vs {}", u, v);
        }
    }

    #[test]
    fn test_singletons_and_front_together() {
        // rows 0/col 0 are a column singleton, row 4 a row singleton,
        // the middle 3x3 block is dense
        let mut t = vec![(0, 0, 2.0), (0, 2, 1.0), (0, 4, -1.0), (4, 4, 3.0), (1, 4, 1.0)];
        for i in 1..4 {
            for j in 1..4 {
                t.push((i, j, if i == j { 5.0 } else { 1.0 + i as f64 }));
            }
        }
        let a = CscMatrix::from_triplets(5, 5, &t).unwrap();
        let control = Control::default();
        let sym = analyze(&a, &control).unwrap();
        assert!(sym.n1 >= 2);
        let num = factorize(&a, &sym, &control).unwrap();

        let b = vec![1.0, -2.0, 3.0, 0.5, 4.0];
        let x = solve(&sym, &num, &b, &control).unwrap();
        check(&a, &x, &b);

        let mut y = b.clone();
        solve_in_place(&sym, &num, &mut y, &control).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn test_wrong_length_is_invalid() {
        let a = CscMatrix::identity(3);
        let control = Control::default();
        let sym = analyze(&a, &control).unwrap();
        let num = factorize(&a, &sym, &control).unwrap();
        assert!(solve(&sym, &num, &[1.0, 2.0], &control).is_err());
        assert!(solve_matrix(&sym, &num, &[1.0; 6], 0, &control).is_err());
    }
}
