//! Dense frontal kernel.
//!
//! A front is a column-major `nr x nc` buffer. Its leading `npc` columns
//! are pivot candidates; the rest are the non-pivotal columns. The kernel
//! factorizes the candidates panel by panel with threshold partial
//! pivoting, physically swapping the chosen row into the pivot position.
//! A candidate with no usable entry among the untouched rows is delayed:
//! it moves to the end of the front and leaves through the contribution
//! block, to be retried by the parent.
//!
//! On return, with `k` accepted pivots:
//!
//! ```text
//!            k        nc-k
//!       [ L11\U11    U12 ]  k rows
//!       [ L21        CB  ]  nr-k rows
//! ```
//!
//! and the trailing `ndelayed` columns of `CB` are the delayed candidates.

use crate::dense::{trailing_update, KernelConfig};
use crate::error::{try_reserve_total, Result};
use crate::etree::EMPTY;

/// Factors of one front, kept for the solve phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontFactors {
    /// S rows of the front; the first `npiv` are the pivot rows in order.
    pub frow_list: Vec<usize>,
    /// S columns pivoted here, in pivot order.
    pub pivot_cols: Vec<usize>,
    /// Non-pivotal S columns; delayed candidates come last.
    pub fcol_list: Vec<usize>,
    /// `frow_list.len() x npiv`, column-major: unit L below the diagonal,
    /// U11 on and above it.
    pub lus: Vec<f64>,
    /// `npiv x fcol_list.len()`, column-major.
    pub us: Vec<f64>,
}

impl FrontFactors {
    pub fn npiv(&self) -> usize {
        self.pivot_cols.len()
    }

    pub fn nrows(&self) -> usize {
        self.frow_list.len()
    }

    /// `|u_ii|` of the pivots of this front.
    pub fn udiag(&self) -> impl Iterator<Item = f64> + '_ {
        let nr = self.nrows();
        (0..self.npiv()).map(move |i| self.lus[i + i * nr].abs())
    }
}

/// Schur complement of a front, consumed by its parent.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContributionBlock {
    pub rows: Vec<usize>,
    /// S columns; the last `ncarried` are delayed pivot candidates.
    pub cols: Vec<usize>,
    pub ncarried: usize,
    /// `rows.len() x cols.len()`, column-major.
    pub values: Vec<f64>,
}

/// Pivoting parameters for one factorization.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PivotRule<'a> {
    pub piv_toler: f64,
    pub diag_toler: f64,
    pub panel_width: usize,
    /// Diagonal row of every S column when the symmetric strategy is used.
    pub diag_map: Option<&'a [usize]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrontOutcome {
    pub npiv: usize,
    pub ndelayed: usize,
}

/// Factorize the candidate columns of a front in place.
///
/// `rows` and `cols` name the S rows and columns of the buffer and are
/// permuted along with it.
pub(crate) fn factorize_front(
    a: &mut [f64],
    nr: usize,
    nc: usize,
    npc: usize,
    rows: &mut [usize],
    cols: &mut [usize],
    rule: &PivotRule<'_>,
    cfg: &KernelConfig,
) -> FrontOutcome {
    debug_assert!(a.len() >= nr * nc && rows.len() == nr && cols.len() == nc && npc <= nc);
    let width = rule.panel_width.max(1);
    let mut k = 0usize;
    let mut cand_end = npc;
    let mut ndelayed = 0usize;

    while k < cand_end {
        let c0 = k;
        let c1 = (c0 + width).min(cand_end);
        for j in c0..c1 {
            let Some(p) = choose_pivot(a, nr, k, j, rows, cols[j], rule) else {
                continue;
            };
            if j != k {
                swap_cols(a, nr, j, k);
                cols.swap(j, k);
            }
            if p != k {
                swap_rows(a, nr, nc, p, k);
                rows.swap(p, k);
            }
            let piv = a[k + k * nr];
            for i in k + 1..nr {
                a[i + k * nr] /= piv;
            }
            // eager update of the rest of the panel, failed columns included
            let (left, right) = a.split_at_mut((k + 1) * nr);
            let l = &left[k * nr..];
            for q in 0..c1 - k - 1 {
                let col = &mut right[q * nr..(q + 1) * nr];
                let u = col[k];
                if u == 0.0 {
                    continue;
                }
                for i in k + 1..nr {
                    col[i] -= l[i] * u;
                }
            }
            k += 1;
        }

        let nfail = c1 - k;
        if nfail > 0 {
            a[k * nr..nc * nr].rotate_left(nfail * nr);
            cols[k..nc].rotate_left(nfail);
            cand_end -= nfail;
            ndelayed += nfail;
        }
        trailing_update(a, nr, c0, k, nc - nfail, cfg);
    }

    FrontOutcome { npiv: k, ndelayed }
}

fn choose_pivot(
    a: &[f64],
    nr: usize,
    k: usize,
    j: usize,
    rows: &[usize],
    col_id: usize,
    rule: &PivotRule<'_>,
) -> Option<usize> {
    let col = &a[j * nr..(j + 1) * nr];
    let mut max = 0.0f64;
    let mut arg = k;
    for i in k..nr {
        let v = col[i].abs();
        if !v.is_finite() {
            return None;
        }
        if v > max {
            max = v;
            arg = i;
        }
    }
    if max == 0.0 {
        return None;
    }

    if let Some(diag_map) = rule.diag_map {
        let target = diag_map[col_id];
        if target != EMPTY {
            if let Some(i) = (k..nr).find(|&i| rows[i] == target) {
                if col[i].abs() >= rule.diag_toler * max {
                    return Some(i);
                }
            }
        }
    }
    if col[k].abs() >= rule.piv_toler * max {
        return Some(k);
    }
    Some(arg)
}

fn swap_cols(a: &mut [f64], nr: usize, j: usize, k: usize) {
    let (lo, hi) = (j.min(k), j.max(k));
    let (left, right) = a.split_at_mut(hi * nr);
    left[lo * nr..(lo + 1) * nr].swap_with_slice(&mut right[..nr]);
}

fn swap_rows(a: &mut [f64], nr: usize, nc: usize, p: usize, k: usize) {
    for c in 0..nc {
        a.swap(p + c * nr, k + c * nr);
    }
}

/// Copy the factors and the contribution block out of a factorized buffer.
pub(crate) fn split_front(
    a: &[f64],
    nr: usize,
    nc: usize,
    rows: Vec<usize>,
    mut cols: Vec<usize>,
    outcome: FrontOutcome,
) -> Result<(FrontFactors, Option<ContributionBlock>)> {
    let k = outcome.npiv;
    let mut lus = Vec::new();
    try_reserve_total(&mut lus, nr * k)?;
    lus.extend_from_slice(&a[..nr * k]);

    let nrest = nc - k;
    let mut us = Vec::new();
    try_reserve_total(&mut us, k * nrest)?;
    for c in k..nc {
        us.extend_from_slice(&a[c * nr..c * nr + k]);
    }

    let cb_rows = nr - k;
    let cb = if (cb_rows > 0 && nrest > 0) || outcome.ndelayed > 0 {
        let mut values = Vec::new();
        try_reserve_total(&mut values, cb_rows * nrest)?;
        for c in k..nc {
            values.extend_from_slice(&a[c * nr + k..(c + 1) * nr]);
        }
        Some(ContributionBlock {
            rows: rows[k..].to_vec(),
            cols: cols[k..].to_vec(),
            ncarried: outcome.ndelayed,
            values,
        })
    } else {
        None
    };

    let fcol_list = cols.split_off(k);
    Ok((
        FrontFactors {
            frow_list: rows,
            pivot_cols: cols,
            fcol_list,
            lus,
            us,
        },
        cb,
    ))
}
