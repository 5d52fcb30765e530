//! Dense kernels on column-major front buffers.
//!
//! Updates with any dimension below `trivial` are done with scalar loops;
//! everything else goes to faer. Kernel threads are only requested when
//! the caller owns more than one thread and the update is large enough.

use faer::linalg::matmul::matmul;
use faer::linalg::triangular_solve::{
    solve_unit_lower_triangular_in_place, solve_upper_triangular_in_place,
};
use faer::{Accum, MatMut, MatRef, Par};

use crate::control::Control;

/// Size thresholds and thread budget for one front.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KernelConfig {
    pub threads: usize,
    pub trivial: usize,
    pub worthwhile_dgemm: usize,
    pub worthwhile_trsm: usize,
}

impl KernelConfig {
    pub fn new(control: &Control, threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            trivial: control.trivial,
            worthwhile_dgemm: control.worthwhile_dgemm,
            worthwhile_trsm: control.worthwhile_trsm,
        }
    }

    #[cfg(test)]
    pub fn sequential() -> Self {
        Self {
            threads: 1,
            trivial: 4,
            worthwhile_dgemm: 512,
            worthwhile_trsm: 4096,
        }
    }

    fn gemm_par(&self, m: usize, n: usize) -> Par {
        if self.threads > 1 && m >= self.worthwhile_dgemm && n >= self.worthwhile_dgemm {
            Par::rayon(self.threads)
        } else {
            Par::Seq
        }
    }

    fn trsm_par(&self, ncols: usize) -> Par {
        if self.threads > 1 && ncols >= self.worthwhile_trsm {
            Par::rayon(self.threads)
        } else {
            Par::Seq
        }
    }
}

/// Blocked update after a panel.
///
/// `a` holds a column-major `nrows x ncols` front with leading dimension
/// `nrows`. Rows and columns `k0..k1` carry the panel's accepted pivots.
/// Columns `k1..c_end` get `U12 = L11^-1 A12` on rows `k0..k1` and
/// `A22 -= L21 U12` on rows `k1..nrows`.
pub(crate) fn trailing_update(
    a: &mut [f64],
    nrows: usize,
    k0: usize,
    k1: usize,
    c_end: usize,
    cfg: &KernelConfig,
) {
    let ld = nrows;
    let w = k1 - k0;
    if w == 0 || c_end <= k1 {
        return;
    }
    let nt = c_end - k1;
    let below = nrows - k1;
    let (left, rest) = a.split_at_mut(k1 * ld);
    let right = &mut rest[..nt * ld];

    if w < cfg.trivial || nt < cfg.trivial || below < cfg.trivial {
        for j in 0..nt {
            let col = &mut right[j * ld..(j + 1) * ld];
            for p in k0..k1 {
                let u = col[p];
                if u == 0.0 {
                    continue;
                }
                let l = &left[p * ld..(p + 1) * ld];
                for i in p + 1..nrows {
                    col[i] -= l[i] * u;
                }
            }
        }
        return;
    }

    let l = MatRef::from_column_major_slice_with_stride(&*left, ld, k1, ld);
    let r = MatMut::from_column_major_slice_with_stride_mut(right, ld, nt, ld);
    let (top, bottom) = r.split_at_row_mut(k1);
    let mut u12 = top.submatrix_mut(k0, 0, w, nt);
    solve_unit_lower_triangular_in_place(l.submatrix(k0, k0, w, w), u12.as_mut(), cfg.trsm_par(nt));
    if below > 0 {
        matmul(
            bottom,
            Accum::Add,
            l.submatrix(k1, k0, below, w),
            u12.as_ref(),
            -1.0,
            cfg.gemm_par(below, nt),
        );
    }
}

/// Solve `L X = B` in place, `L` unit lower triangular `k x k` stored
/// column-major with leading dimension `ldl`, `B` column-major `k x nrhs`
/// with leading dimension `ldb`.
pub(crate) fn lower_solve(l: &[f64], ldl: usize, k: usize, b: &mut [f64], ldb: usize, nrhs: usize, cfg: &KernelConfig) {
    if k == 0 || nrhs == 0 {
        return;
    }
    if k < cfg.trivial || nrhs < cfg.trivial {
        for c in 0..nrhs {
            let x = &mut b[c * ldb..c * ldb + k];
            for p in 0..k {
                let xp = x[p];
                if xp == 0.0 {
                    continue;
                }
                for i in p + 1..k {
                    x[i] -= l[i + p * ldl] * xp;
                }
            }
        }
        return;
    }
    let lm = MatRef::from_column_major_slice_with_stride(l, k, k, ldl);
    let bm = MatMut::from_column_major_slice_with_stride_mut(b, k, nrhs, ldb);
    solve_unit_lower_triangular_in_place(lm, bm, cfg.trsm_par(nrhs));
}

/// Solve `U X = B` in place, `U` upper triangular `k x k` (non-unit diagonal).
pub(crate) fn upper_solve(u: &[f64], ldu: usize, k: usize, b: &mut [f64], ldb: usize, nrhs: usize, cfg: &KernelConfig) {
    if k == 0 || nrhs == 0 {
        return;
    }
    if k < cfg.trivial || nrhs < cfg.trivial {
        for c in 0..nrhs {
            let x = &mut b[c * ldb..c * ldb + k];
            for p in (0..k).rev() {
                x[p] /= u[p + p * ldu];
                let xp = x[p];
                if xp == 0.0 {
                    continue;
                }
                for i in 0..p {
                    x[i] -= u[i + p * ldu] * xp;
                }
            }
        }
        return;
    }
    let um = MatRef::from_column_major_slice_with_stride(u, k, k, ldu);
    let bm = MatMut::from_column_major_slice_with_stride_mut(b, k, nrhs, ldb);
    solve_upper_triangular_in_place(um, bm, cfg.trsm_par(nrhs));
}

/// `C -= A B` with `A` `m x k` (leading dimension `lda`), `B` `k x n`
/// (leading dimension `ldb`) and `C` `m x n` (leading dimension `ldc`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn gemm_sub(
    a: &[f64],
    lda: usize,
    b: &[f64],
    ldb: usize,
    c: &mut [f64],
    ldc: usize,
    m: usize,
    n: usize,
    k: usize,
    cfg: &KernelConfig,
) {
    if m == 0 || n == 0 || k == 0 {
        return;
    }
    if m < cfg.trivial || n < cfg.trivial || k < cfg.trivial {
        for j in 0..n {
            for p in 0..k {
                let bpj = b[p + j * ldb];
                if bpj == 0.0 {
                    continue;
                }
                for i in 0..m {
                    c[i + j * ldc] -= a[i + p * lda] * bpj;
                }
            }
        }
        return;
    }
    let am = MatRef::from_column_major_slice_with_stride(a, m, k, lda);
    let bm = MatRef::from_column_major_slice_with_stride(b, k, n, ldb);
    let cm = MatMut::from_column_major_slice_with_stride_mut(c, m, n, ldc);
    matmul(cm, Accum::Add, am, bm, -1.0, cfg.gemm_par(m, n));
}
