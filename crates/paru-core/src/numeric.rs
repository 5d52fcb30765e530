//! Numeric factorization driver.

use crate::control::{Control, Strategy};
use crate::error::{try_zeroed, ParuError, Result};
use crate::etree::EMPTY;
use crate::frontal::{FrontFactors, PivotRule};
use crate::matrix::CscMatrix;
use crate::scaling::row_scale_factors;
use crate::scheduler::FactorContext;
use crate::symbolic::{Slot, Symbolic};

/// Numeric LU factors of one matrix, tied to the `Symbolic` it came from.
///
/// With `R` the row scaling, the factorization is
/// `L U = (R \ A)(Pfin, Qfin)`.
#[derive(Debug, Clone)]
pub struct Numeric {
    pub(crate) sym_id: u64,
    pub m: usize,
    pub n: usize,
    pub n1: usize,
    pub nf: usize,
    /// Row scale factors (1 when scaling is off).
    pub rs: Vec<f64>,
    /// Scaled values of the column-singleton rows.
    pub sux: Vec<f64>,
    /// Scaled values of the row-singleton columns.
    pub slx: Vec<f64>,
    pub fronts: Vec<FrontFactors>,
    /// S row at each S pivot position.
    pub ps: Vec<usize>,
    /// Original row at each pivot position.
    pub pfin: Vec<usize>,
    /// Original column at each pivot position.
    pub qfin: Vec<usize>,
    pub(crate) row_pos: Vec<usize>,
    pub(crate) col_pos: Vec<usize>,
    /// Front f owns S pivot positions `front_pivot_start[f]..front_pivot_start[f+1]`.
    pub front_pivot_start: Vec<usize>,
    pub rcond: f64,
    pub min_udiag: f64,
    pub max_udiag: f64,
    pub max_row_count: usize,
    pub max_col_count: usize,
    pub ndelayed: usize,
}

impl Numeric {
    /// True when these factors were computed with `sym`.
    pub fn pairs_with(&self, sym: &Symbolic) -> bool {
        self.sym_id == sym.id && self.m == sym.m && self.n == sym.n
    }

    /// Pivot position of an id in the unified numbering (singleton
    /// positions below `n1`, S rows above).
    pub(crate) fn row_position(&self, unified: usize) -> usize {
        if unified < self.n1 {
            unified
        } else {
            self.n1 + self.row_pos[unified - self.n1]
        }
    }

    pub(crate) fn col_position(&self, unified: usize) -> usize {
        if unified < self.n1 {
            unified
        } else {
            self.n1 + self.col_pos[unified - self.n1]
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DiagRange {
    min: f64,
    max: f64,
}

impl DiagRange {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: 0.0,
        }
    }

    fn add(&mut self, v: f64) {
        let v = v.abs();
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn min_or_zero(&self) -> f64 {
        if self.min.is_finite() {
            self.min
        } else {
            0.0
        }
    }
}

/// Factorize `a`, whose pattern must be the one `sym` was built from.
pub fn factorize(a: &CscMatrix, sym: &Symbolic, control: &Control) -> Result<Numeric> {
    control.validate()?;
    if !sym.matches_pattern(a) {
        return Err(ParuError::invalid(
            "matrix pattern differs from the one analyzed",
        ));
    }

    let rs = row_scale_factors(a, control.scale)?;

    // scatter scaled values into S and the singleton blocks
    let mut sx: Vec<f64> = try_zeroed(sym.sj.len())?;
    let mut sux: Vec<f64> = try_zeroed(sym.suj.len())?;
    let mut slx: Vec<f64> = try_zeroed(sym.sli.len())?;
    for (p, (&i, &v)) in a.row_idx().iter().zip(a.values()).enumerate() {
        let v = v / rs[i];
        match sym.slots[p] {
            Slot::S(q) => sx[q] = v,
            Slot::U(q) => sux[q] = v,
            Slot::L(q) => slx[q] = v,
        }
    }

    let mut udiag = DiagRange::new();
    for k in 0..sym.cs1 {
        let d = sux[sym.sup[k]];
        if d == 0.0 {
            return Err(singular_before(sym.qfill[k], &udiag));
        }
        udiag.add(d);
    }
    for k in 0..sym.rs1 {
        let d = slx[sym.slp[k]];
        if d == 0.0 {
            return Err(singular_before(sym.qfill[sym.cs1 + k], &udiag));
        }
        udiag.add(d);
    }

    let symmetric = match control.paru_strategy {
        Strategy::Auto => sym.strategy == Strategy::Symmetric,
        Strategy::Symmetric => true,
        Strategy::Unsymmetric => false,
    };
    let rule = PivotRule {
        piv_toler: control.piv_toler,
        diag_toler: control.diag_toler,
        panel_width: control.panel_width,
        diag_map: symmetric.then_some(sym.diag_map.as_slice()),
    };

    let threads = control.max_threads();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| {
            log::warn!("factorize: cannot start {} threads: {}", threads, e);
            ParuError::OutOfMemory { bytes: 0 }
        })?;
    let out = pool.install(|| FactorContext::new(sym, control, &sx, rule).run(threads));
    drop(sx);

    for ff in out.factors.iter().flatten() {
        ff.udiag().for_each(|d| udiag.add(d));
    }
    if let Some(err) = out.error {
        let err = err.with_udiag(udiag.min_or_zero(), udiag.max);
        log::warn!("factorize: {}", err);
        return Err(err);
    }
    let fronts: Vec<FrontFactors> = out
        .factors
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ParuError::invalid("a front was left unfactorized"))?;

    // ---- pivot positions ----
    let (n1, ms, ns) = (sym.n1, sym.ms, sym.ns);
    let mut front_pivot_start = Vec::with_capacity(sym.nf + 1);
    let mut ps = Vec::with_capacity(ms);
    let mut qs = Vec::with_capacity(ns);
    front_pivot_start.push(0);
    for ff in &fronts {
        ps.extend_from_slice(&ff.frow_list[..ff.npiv()]);
        qs.extend_from_slice(&ff.pivot_cols);
        front_pivot_start.push(ps.len());
    }
    let mut col_pos = vec![EMPTY; ns];
    for (k, &c) in qs.iter().enumerate() {
        col_pos[c] = k;
    }
    if qs.len() < ns {
        let c = (0..ns).find(|&c| col_pos[c] == EMPTY).unwrap_or(0);
        let err = ParuError::singular(sym.qfill[n1 + c]).with_udiag(udiag.min_or_zero(), udiag.max);
        log::warn!("factorize: {}", err);
        return Err(err);
    }
    let mut row_pos = vec![EMPTY; ms];
    for (k, &r) in ps.iter().enumerate() {
        row_pos[r] = k;
    }

    let mut pfin = Vec::with_capacity(sym.m);
    let mut qfin = Vec::with_capacity(sym.n);
    pfin.extend_from_slice(&sym.pinit[..n1]);
    qfin.extend_from_slice(&sym.qfill[..n1]);
    pfin.extend(ps.iter().map(|&r| sym.pinit[n1 + r]));
    qfin.extend(qs.iter().map(|&c| sym.qfill[n1 + c]));

    let min_udiag = udiag.min_or_zero();
    let max_udiag = udiag.max;
    let rcond = if max_udiag == 0.0 { 0.0 } else { min_udiag / max_udiag };

    log::info!(
        "factorize: n={} fronts={} delayed={} max front {}x{} rcond={:.3e}",
        sym.n,
        sym.nf,
        out.ndelayed,
        out.max_row_count,
        out.max_col_count,
        rcond
    );

    Ok(Numeric {
        sym_id: sym.id,
        m: sym.m,
        n: sym.n,
        n1,
        nf: sym.nf,
        rs,
        sux,
        slx,
        fronts,
        ps,
        pfin,
        qfin,
        row_pos,
        col_pos,
        front_pivot_start,
        rcond,
        min_udiag,
        max_udiag,
        max_row_count: out.max_row_count,
        max_col_count: out.max_col_count,
        ndelayed: out.ndelayed,
    })
}

fn singular_before(column: usize, udiag: &DiagRange) -> ParuError {
    let err = ParuError::singular(column).with_udiag(udiag.min_or_zero(), udiag.max);
    log::warn!("factorize: {}", err);
    err
}
