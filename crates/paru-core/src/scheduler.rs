//! Task-parallel walk of the frontal tree.
//!
//! Tasks form a tree. A task runs after all of its child tasks, which
//! may run concurrently on the rayon pool. Inside a task the fronts run
//! in post-order; a front's contribution block either stays in the task
//! (destination is a later front of the same task) or is handed back to
//! the parent task, which only happens for the task's last front.
//!
//! Failure handling: the first error is stored, a cancel flag is raised,
//! and every task returns `Aborted` at its next front boundary.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

use rayon::prelude::*;

use crate::assembly::{assemble_front, AssemblyMaps};
use crate::control::Control;
use crate::dense::KernelConfig;
use crate::error::{checked_size, try_reserve_total, ParuError, Result};
use crate::etree;
use crate::frontal::{factorize_front, split_front, ContributionBlock, FrontFactors, PivotRule};
use crate::symbolic::Symbolic;

/// Marker returned by tasks that stopped early; the cause is in the context.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Aborted;

/// Contribution block leaving a task: (destination front, source front, block).
type Handoff = (usize, usize, ContributionBlock);

pub(crate) struct FactorContext<'a> {
    sym: &'a Symbolic,
    control: &'a Control,
    sx: &'a [f64],
    rule: PivotRule<'a>,
    task_childp: Vec<usize>,
    task_child: Vec<usize>,
    factors: Vec<OnceLock<FrontFactors>>,
    cancel: AtomicBool,
    first_error: OnceLock<ParuError>,
    ndelayed: AtomicUsize,
    max_rows: AtomicUsize,
    max_cols: AtomicUsize,
}

/// What the scheduler leaves behind.
pub(crate) struct ScheduleOutput {
    /// Factors of every front that completed (all of them on success).
    pub factors: Vec<Option<FrontFactors>>,
    pub ndelayed: usize,
    pub max_row_count: usize,
    pub max_col_count: usize,
    pub error: Option<ParuError>,
}

impl<'a> FactorContext<'a> {
    pub fn new(sym: &'a Symbolic, control: &'a Control, sx: &'a [f64], rule: PivotRule<'a>) -> Self {
        let (task_childp, task_child) = etree::children(&sym.task_parent);
        Self {
            sym,
            control,
            sx,
            rule,
            task_childp,
            task_child,
            factors: (0..sym.nf).map(|_| OnceLock::new()).collect(),
            cancel: AtomicBool::new(false),
            first_error: OnceLock::new(),
            ndelayed: AtomicUsize::new(0),
            max_rows: AtomicUsize::new(0),
            max_cols: AtomicUsize::new(0),
        }
    }

    /// Factorize every front. Must be called inside the pool that
    /// provides `threads` workers.
    pub fn run(self, threads: usize) -> ScheduleOutput {
        let outcome = AssemblyMaps::new(self.sym.ms, self.sym.ns)
            .map_err(|e| self.fail(e))
            .and_then(|mut maps| self.run_node(self.sym.ntasks, threads.max(1), &mut maps));
        if outcome.is_err() {
            debug_assert!(self.first_error.get().is_some(), "task aborted without an error");
        }
        ScheduleOutput {
            factors: self.factors.into_iter().map(OnceLock::into_inner).collect(),
            ndelayed: self.ndelayed.into_inner(),
            max_row_count: self.max_rows.into_inner(),
            max_col_count: self.max_cols.into_inner(),
            error: self.first_error.into_inner(),
        }
    }

    fn fail(&self, e: ParuError) -> Aborted {
        if self.first_error.set(e).is_ok() {
            log::debug!("factorize: cancelling remaining tasks");
        }
        self.cancel.store(true, Ordering::Release);
        Aborted
    }

    fn task_children(&self, t: usize) -> &[usize] {
        &self.task_child[self.task_childp[t]..self.task_childp[t + 1]]
    }

    fn task_weight(&self, t: usize) -> f64 {
        self.sym.stree_flop_bound[self.sym.task_map[t + 1] - 1]
    }

    /// Run task `t` (or every root task when `t == ntasks`) after its children.
    ///
    /// `maps` is the caller's scratch; spawned children get their own,
    /// one per rayon job.
    fn run_node(
        &self,
        t: usize,
        budget: usize,
        maps: &mut AssemblyMaps,
    ) -> std::result::Result<Option<Handoff>, Aborted> {
        let kids = self.task_children(t);
        debug_assert!(t == self.sym.ntasks || kids.len() == self.sym.task_num_child[t]);
        let heavy_limit = (self.control.worthwhile_dgemm as f64) * (self.control.worthwhile_trsm as f64);
        let heavy = kids.iter().filter(|&&c| self.task_weight(c) >= heavy_limit).count();
        let spawn = budget > 1 && kids.len() > 1 && heavy >= 2;

        let results: Vec<_> = if spawn {
            let per_child = (budget / kids.len()).max(1);
            let (ms, ns) = (self.sym.ms, self.sym.ns);
            kids.par_iter()
                .map_init(
                    || AssemblyMaps::new(ms, ns),
                    |scratch, &c| match scratch {
                        Ok(m) => self.run_node(c, per_child, m),
                        Err(e) => Err(self.fail(e.clone())),
                    },
                )
                .collect()
        } else {
            kids.iter().map(|&c| self.run_node(c, budget, maps)).collect()
        };

        let mut pending = BTreeMap::new();
        for r in results {
            if let Some((dest, src, cb)) = r? {
                pending.insert((dest, src), cb);
            }
        }
        if t == self.sym.ntasks {
            return Ok(None);
        }
        self.run_task(t, budget, pending, maps)
    }

    fn run_task(
        &self,
        t: usize,
        budget: usize,
        mut pending: BTreeMap<(usize, usize), ContributionBlock>,
        maps: &mut AssemblyMaps,
    ) -> std::result::Result<Option<Handoff>, Aborted> {
        let sym = self.sym;
        let (start, end) = (sym.task_map[t], sym.task_map[t + 1]);
        let cfg = KernelConfig::new(self.control, budget);
        let mut work: Vec<f64> = Vec::new();
        let mut handoff = None;

        for f in start..end {
            if self.cancel.load(Ordering::Acquire) {
                return Err(Aborted);
            }
            let chain = sym.chain_start.partition_point(|&s| s <= f) - 1;
            if f == start || f == sym.chain_start[chain] {
                work = Vec::new();
                let bound = checked_size(sym.chain_maxrows[chain], sym.chain_maxcols[chain], "chain workspace")
                    .map_err(|e| self.fail(e))?;
                try_reserve_total(&mut work, bound).map_err(|e| self.fail(e))?;
            }

            let keys: Vec<(usize, usize)> = pending.range((f, 0)..(f + 1, 0)).map(|(k, _)| *k).collect();
            let children: Vec<ContributionBlock> = keys.iter().filter_map(|k| pending.remove(k)).collect();

            let cb = self.factor_front(f, children, maps, &mut work, &cfg).map_err(|e| self.fail(e))?;
            let Some(cb) = cb else {
                continue;
            };
            let dest = sym.destination(f);
            if dest == sym.nf {
                if cb.ncarried > 0 {
                    let c = cb.cols[cb.cols.len() - cb.ncarried];
                    return Err(self.fail(ParuError::singular(sym.qfill[sym.n1 + c])));
                }
            } else if dest < end {
                pending.insert((dest, f), cb);
            } else {
                handoff = Some((dest, f, cb));
            }
        }
        Ok(handoff)
    }

    fn factor_front(
        &self,
        f: usize,
        children: Vec<ContributionBlock>,
        maps: &mut AssemblyMaps,
        work: &mut Vec<f64>,
        cfg: &KernelConfig,
    ) -> Result<Option<ContributionBlock>> {
        let front = assemble_front(
            self.sym,
            f,
            self.sx,
            children,
            maps,
            work,
            self.control.mem_chunk,
            cfg.threads,
        )?;
        let (nr, nc, npc) = (front.nr, front.nc, front.npc);
        let mut rows = front.rows;
        let mut cols = front.cols;
        let outcome = factorize_front(work, nr, nc, npc, &mut rows, &mut cols, &self.rule, cfg);

        self.max_rows.fetch_max(nr, Ordering::Relaxed);
        self.max_cols.fetch_max(nc, Ordering::Relaxed);
        if outcome.ndelayed > 0 {
            self.ndelayed.fetch_add(outcome.ndelayed, Ordering::Relaxed);
            log::trace!("front {}: {} pivots delayed", f, outcome.ndelayed);
        }
        log::trace!("front {}: {}x{} with {} pivots", f, nr, nc, outcome.npiv);

        let (factors, cb) = split_front(work, nr, nc, rows, cols, outcome)?;
        let _ = self.factors[f].set(factors);
        Ok(cb)
    }
}
