//! Symbolic analysis: singletons, ordering, frontal tree, chains and tasks.
//!
//! The frontal tree is the row-merge tree of the singleton-free part `S`:
//! the column elimination tree of `S^T S`, post-ordered, with chains of
//! single-child columns merged into fronts. Every row of `S` belongs to
//! the front owning its leftmost column. A front's contribution block is
//! consumed only by its parent, so fronts can be factorized bottom-up
//! with no other communication.
//!
//! Index conventions used throughout the crate:
//!
//! * S rows and S columns are numbered `0..ms` and `0..ns`.
//! * Singleton structures use *unified* ids: an id below `n1` is a
//!   singleton pivot position, an id `n1 + k` is S row or column `k`.
//! * `EMPTY` marks an absent index.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::amd::amd_order;
use crate::control::{Control, OrderingMethod, Strategy};
use crate::error::{ParuError, Result};
use crate::etree::{self, EMPTY};
use crate::matrix::CscMatrix;
use crate::singletons::{find_singletons, RowForm, SingletonSplit};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Where an entry of A lands during factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Index into `Sx` (same positions as `sj`).
    S(usize),
    /// Index into the column-singleton rows (`suj`).
    U(usize),
    /// Index into the row-singleton columns (`sli`).
    L(usize),
}

/// Result of symbolic analysis. Immutable; may be shared by many
/// factorizations of matrices with the same pattern.
#[derive(Debug, Clone)]
pub struct Symbolic {
    pub(crate) id: u64,
    pub m: usize,
    pub n: usize,
    /// Entries in A.
    pub anz: usize,
    /// Strategy chosen by the analysis (never `Auto`).
    pub strategy: Strategy,

    // ---- singletons ----
    pub n1: usize,
    pub cs1: usize,
    pub rs1: usize,
    /// Row pointers of the column-singleton rows (cs1 + 1).
    pub sup: Vec<usize>,
    /// Unified column ids; the diagonal comes first in every row.
    pub suj: Vec<usize>,
    /// Column pointers of the row-singleton columns (rs1 + 1).
    pub slp: Vec<usize>,
    /// Unified row ids; the diagonal comes first in every column.
    pub sli: Vec<usize>,

    // ---- S matrix ----
    pub ms: usize,
    pub ns: usize,
    pub sp: Vec<usize>,
    pub sj: Vec<usize>,
    /// Rows with leftmost column `c` are `sleft[c]..sleft[c+1]`.
    /// `sleft[ns]` counts non-empty rows, `sleft[ns+1] == ms`.
    pub sleft: Vec<usize>,
    /// S row holding the structural diagonal of each S column, or `EMPTY`.
    pub diag_map: Vec<usize>,
    /// Position -> original column (singletons first).
    pub qfill: Vec<usize>,
    /// Position -> original row (singletons first, then S rows).
    pub pinit: Vec<usize>,
    /// Original row -> position.
    pub pinv: Vec<usize>,
    pub(crate) slots: Vec<Slot>,

    // ---- frontal tree ----
    pub nf: usize,
    /// Front f pivots columns `super_cols[f]..super_cols[f+1]`.
    pub super_cols: Vec<usize>,
    /// `parent[nf] == EMPTY`; roots point at `nf`.
    pub parent: Vec<usize>,
    pub childp: Vec<usize>,
    pub child: Vec<usize>,
    pub depth: Vec<usize>,
    /// Smallest descendant of each front.
    pub first: Vec<usize>,
    /// Upper bound on the rows of each front.
    pub fm: Vec<usize>,
    /// Upper bound on the rows of each contribution block.
    pub cm: Vec<usize>,
    /// Upper bound on the columns of each front (pivots included).
    pub front_cols: Vec<usize>,

    // ---- augmented tree ----
    pub aparent: Vec<usize>,
    pub achildp: Vec<usize>,
    pub achild: Vec<usize>,
    pub row2atree: Vec<usize>,
    pub super2atree: Vec<usize>,

    // ---- chains and tasks ----
    pub chain_start: Vec<usize>,
    pub chain_maxrows: Vec<usize>,
    pub chain_maxcols: Vec<usize>,
    pub front_flop_bound: Vec<f64>,
    pub stree_flop_bound: Vec<f64>,
    pub ntasks: usize,
    /// Task t owns fronts `task_map[t]..task_map[t+1]`.
    pub task_map: Vec<usize>,
    pub task_parent: Vec<usize>,
    /// Number of child tasks. Diagnostic only; the scheduler derives
    /// child lists from `task_parent` and checks them against this count.
    pub task_num_child: Vec<usize>,
    /// Height in the task tree; leaf tasks are 0. Reported for
    /// diagnostics and logged at the end of the analysis.
    pub task_depth: Vec<usize>,

    // ---- size bounds ----
    pub us_bound_size: usize,
    pub lus_bound_size: usize,
    pub row_int_bound: usize,
    pub col_int_bound: usize,
    pub max_row_bound: usize,
    pub max_col_bound: usize,

    a_col_ptr: Vec<usize>,
    a_row_idx: Vec<usize>,
}

impl Symbolic {
    /// True when `a` has exactly the pattern this analysis was built for.
    pub fn matches_pattern(&self, a: &CscMatrix) -> bool {
        a.nrows() == self.m && a.ncols() == self.n && a.same_pattern(&self.a_col_ptr, &self.a_row_idx)
    }

    /// Number of pivots of front `f`.
    pub fn npiv(&self, f: usize) -> usize {
        self.super_cols[f + 1] - self.super_cols[f]
    }

    /// Children of node `f` (`f == nf` gives the roots).
    pub fn children_of(&self, f: usize) -> &[usize] {
        &self.child[self.childp[f]..self.childp[f + 1]]
    }

    /// S rows assigned to front `f`.
    pub fn rows_of(&self, f: usize) -> std::ops::Range<usize> {
        self.sleft[self.super_cols[f]]..self.sleft[self.super_cols[f + 1]]
    }

    /// Front whose contribution block receives the one of `f`, or `nf`.
    pub fn destination(&self, f: usize) -> usize {
        let node = self.aparent[self.super2atree[f]];
        node - self.ms
    }

    pub fn nchains(&self) -> usize {
        self.chain_start.len() - 1
    }
}

/// Analyze the pattern of `a` and build the frontal tree.
pub fn analyze(a: &CscMatrix, control: &Control) -> Result<Symbolic> {
    control.validate()?;
    let (m, n) = (a.nrows(), a.ncols());
    if m != n {
        return Err(ParuError::invalid(format!(
            "matrix must be square, got {}x{}",
            m, n
        )));
    }
    n.checked_add(2)
        .and_then(|v| v.checked_mul(2))
        .ok_or(ParuError::TooLarge { what: "dimension" })?;

    let rows = RowForm::new(a);
    let split = if control.singletons {
        find_singletons(a, &rows)
    } else {
        SingletonSplit::none(m, n)
    };
    let n1 = split.n1();

    // ---- S0: the remaining rows and columns in their original order ----
    let s_rows_orig: Vec<usize> = (0..m).filter(|&i| split.row_alive[i]).collect();
    let s_cols_orig: Vec<usize> = (0..n).filter(|&j| split.col_alive[j]).collect();
    let ms = s_rows_orig.len();
    let ns = s_cols_orig.len();
    let mut row_local = vec![EMPTY; m];
    for (r, &i) in s_rows_orig.iter().enumerate() {
        row_local[i] = r;
    }
    let mut col_local = vec![EMPTY; n];
    for (c, &j) in s_cols_orig.iter().enumerate() {
        col_local[j] = c;
    }

    // CSC of S0
    let mut s0_ptr = Vec::with_capacity(ns + 1);
    let mut s0_idx = Vec::new();
    s0_ptr.push(0);
    for &j in &s_cols_orig {
        let (col_rows, _) = a.col(j);
        s0_idx.extend(col_rows.iter().map(|&i| row_local[i]).filter(|&r| r != EMPTY));
        s0_ptr.push(s0_idx.len());
    }
    // CSR of S0
    let mut s0_rows: Vec<Vec<usize>> = vec![Vec::new(); ms];
    for c in 0..ns {
        for &r in &s0_idx[s0_ptr[c]..s0_ptr[c + 1]] {
            s0_rows[r].push(c);
        }
    }

    let strategy = choose_strategy(control.umfpack_strategy, &s_rows_orig, &s_cols_orig, &s0_ptr, &s0_idx);

    // ---- column ordering ----
    let q1: Vec<usize> = match control.ordering {
        OrderingMethod::Natural => (0..ns).collect(),
        OrderingMethod::Amd => match strategy {
            Strategy::Symmetric => amd_order(ns, &s0_ptr, &s0_idx).inv_perm,
            _ => {
                let (gp, gi) = column_intersection_graph(ns, &s0_rows);
                amd_order(ns, &gp, &gi).inv_perm
            }
        },
    };

    // ---- column etree of S0(:, q1), post-ordered ----
    let mut q_ptr = Vec::with_capacity(ns + 1);
    let mut q_idx = Vec::with_capacity(s0_idx.len());
    q_ptr.push(0);
    for &c in &q1 {
        q_idx.extend_from_slice(&s0_idx[s0_ptr[c]..s0_ptr[c + 1]]);
        q_ptr.push(q_idx.len());
    }
    let tree_q = etree::column_etree(ms, ns, &q_ptr, &q_idx);
    let post = etree::postorder(&tree_q);
    let mut inv_post = vec![0usize; ns];
    for (k, &q) in post.iter().enumerate() {
        inv_post[q] = k;
    }
    // final column order and its etree
    let col_order: Vec<usize> = post.iter().map(|&q| q1[q]).collect();
    let mut col_pos = vec![0usize; ns];
    for (k, &c) in col_order.iter().enumerate() {
        col_pos[c] = k;
    }
    let col_parent: Vec<usize> = post
        .iter()
        .map(|&q| {
            let p = tree_q[q];
            if p == EMPTY {
                EMPTY
            } else {
                inv_post[p]
            }
        })
        .collect();

    // ---- S rows sorted by leftmost column ----
    let mut row_cols: Vec<Vec<usize>> = s0_rows
        .iter()
        .map(|cols| {
            let mut v: Vec<usize> = cols.iter().map(|&c| col_pos[c]).collect();
            v.sort_unstable();
            v
        })
        .collect();
    let leftmost: Vec<usize> = row_cols.iter().map(|v| v.first().copied().unwrap_or(ns)).collect();
    let mut sleft = vec![0usize; ns + 2];
    for &l in &leftmost {
        sleft[l + 1] += 1;
    }
    for c in 0..=ns {
        sleft[c + 1] += sleft[c];
    }
    let mut next = sleft.clone();
    let mut srow_of_local = vec![0usize; ms];
    for r in 0..ms {
        srow_of_local[r] = next[leftmost[r]];
        next[leftmost[r]] += 1;
    }
    let mut srow_orig = vec![0usize; ms];
    let mut sp = Vec::with_capacity(ms + 1);
    let mut sj = Vec::with_capacity(s0_idx.len());
    {
        let mut by_srow: Vec<Vec<usize>> = vec![Vec::new(); ms];
        for r in 0..ms {
            let s = srow_of_local[r];
            srow_orig[s] = s_rows_orig[r];
            by_srow[s] = std::mem::take(&mut row_cols[r]);
        }
        sp.push(0);
        for cols in by_srow {
            sj.extend(cols);
            sp.push(sj.len());
        }
    }
    // sleft[ns] already counts the non-empty rows, sleft[ns+1] == ms

    // ---- permutations ----
    let mut qfill = Vec::with_capacity(n);
    qfill.extend_from_slice(&split.cols);
    qfill.extend(col_order.iter().map(|&c| s_cols_orig[c]));
    let mut pinit = Vec::with_capacity(m);
    pinit.extend_from_slice(&split.rows);
    pinit.extend_from_slice(&srow_orig);
    let mut pinv = vec![0usize; m];
    for (k, &i) in pinit.iter().enumerate() {
        pinv[i] = k;
    }
    let mut col_unified = vec![0usize; n];
    for (k, &j) in qfill.iter().enumerate() {
        col_unified[j] = k;
    }

    // ---- structural diagonal ----
    let mut diag_map = vec![EMPTY; ns];
    for c in 0..ns {
        let j = qfill[n1 + c];
        let k = pinv[j];
        if k >= n1 {
            let s = k - n1;
            if sj[sp[s]..sp[s + 1]].binary_search(&c).is_ok() {
                diag_map[c] = s;
            }
        }
    }

    // ---- singleton blocks and value slots ----
    let (sup, suj, slp, sli, slots) = build_slots(a, &rows, &split, &pinv, &col_unified, &sp, &sj)?;

    let mut sym = Symbolic {
        id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        m,
        n,
        anz: a.nnz(),
        strategy,
        n1,
        cs1: split.cs1,
        rs1: split.rs1,
        sup,
        suj,
        slp,
        sli,
        ms,
        ns,
        sp,
        sj,
        sleft,
        diag_map,
        qfill,
        pinit,
        pinv,
        slots,
        nf: 0,
        super_cols: vec![0],
        parent: Vec::new(),
        childp: Vec::new(),
        child: Vec::new(),
        depth: Vec::new(),
        first: Vec::new(),
        fm: Vec::new(),
        cm: Vec::new(),
        front_cols: Vec::new(),
        aparent: Vec::new(),
        achildp: Vec::new(),
        achild: Vec::new(),
        row2atree: Vec::new(),
        super2atree: Vec::new(),
        chain_start: Vec::new(),
        chain_maxrows: Vec::new(),
        chain_maxcols: Vec::new(),
        front_flop_bound: Vec::new(),
        stree_flop_bound: Vec::new(),
        ntasks: 0,
        task_map: vec![0],
        task_parent: Vec::new(),
        task_num_child: Vec::new(),
        task_depth: Vec::new(),
        us_bound_size: 0,
        lus_bound_size: 0,
        row_int_bound: 0,
        col_int_bound: 0,
        max_row_bound: 0,
        max_col_bound: 0,
        a_col_ptr: a.col_ptr().to_vec(),
        a_row_idx: a.row_idx().to_vec(),
    };

    build_fronts(&mut sym, &col_parent, control.relaxed_amalgamation_threshold);
    build_bounds(&mut sym);
    build_augmented_tree(&mut sym);
    build_chains(&mut sym);
    build_tasks(&mut sym, control);

    log::debug!(
        "analyze: n={} nnz={} n1={} (cs1={}, rs1={}) strategy={} nf={} nchains={} ntasks={} task height={}",
        sym.n,
        sym.anz,
        sym.n1,
        sym.cs1,
        sym.rs1,
        sym.strategy,
        sym.nf,
        sym.nchains(),
        sym.ntasks,
        sym.task_depth.iter().max().copied().unwrap_or(0)
    );
    Ok(sym)
}

/// Decide between the symmetric and unsymmetric strategies.
///
/// The symmetric strategy needs the S rows and S columns to name the
/// same original indices, a pattern symmetry of at least 0.5 and a
/// structurally nonzero diagonal in at least 90% of the columns.
fn choose_strategy(
    requested: Strategy,
    s_rows_orig: &[usize],
    s_cols_orig: &[usize],
    s0_ptr: &[usize],
    s0_idx: &[usize],
) -> Strategy {
    let ns = s_cols_orig.len();
    let same_sets = s_rows_orig == s_cols_orig;
    match requested {
        Strategy::Unsymmetric => return Strategy::Unsymmetric,
        Strategy::Symmetric if same_sets => return Strategy::Symmetric,
        Strategy::Symmetric => {
            log::warn!("symmetric strategy needs matching rows and columns; using unsymmetric");
            return Strategy::Unsymmetric;
        }
        Strategy::Auto => {}
    }
    if !same_sets || ns == 0 {
        return Strategy::Unsymmetric;
    }

    // with identical index sets, local row r and local column r are the same index
    let mut nzdiag = 0usize;
    let mut offdiag = 0usize;
    let mut matched = 0usize;
    for c in 0..ns {
        for &r in &s0_idx[s0_ptr[c]..s0_ptr[c + 1]] {
            if r == c {
                nzdiag += 1;
            } else {
                offdiag += 1;
                if s0_idx[s0_ptr[r]..s0_ptr[r + 1]].binary_search(&c).is_ok() {
                    matched += 1;
                }
            }
        }
    }
    let symmetry = if offdiag == 0 {
        1.0
    } else {
        matched as f64 / offdiag as f64
    };
    log::trace!("strategy: symmetry={:.3} nzdiag={}/{}", symmetry, nzdiag, ns);
    if symmetry >= 0.5 && nzdiag as f64 >= 0.9 * ns as f64 {
        Strategy::Symmetric
    } else {
        Strategy::Unsymmetric
    }
}

/// Adjacency of `S^T S`, skipping dense rows.
fn column_intersection_graph(ns: usize, s0_rows: &[Vec<usize>]) -> (Vec<usize>, Vec<usize>) {
    let dense = 16usize.max((10.0 * (ns as f64).sqrt()) as usize);
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); ns];
    let mut skipped = 0;
    for cols in s0_rows {
        if cols.len() > dense {
            skipped += 1;
            continue;
        }
        for &c in cols {
            adj[c].extend(cols.iter().copied().filter(|&d| d != c));
        }
    }
    if skipped > 0 {
        log::trace!("ordering: {} dense rows ignored", skipped);
    }
    let mut ptr = Vec::with_capacity(ns + 1);
    let mut idx = Vec::new();
    ptr.push(0);
    for mut list in adj {
        list.sort_unstable();
        list.dedup();
        idx.extend(list);
        ptr.push(idx.len());
    }
    (ptr, idx)
}

type SlotTables = (Vec<usize>, Vec<usize>, Vec<usize>, Vec<usize>, Vec<Slot>);

/// Build `ustons`, `lstons` and the destination of every entry of A.
fn build_slots(
    a: &CscMatrix,
    rows: &RowForm,
    split: &SingletonSplit,
    pinv: &[usize],
    col_unified: &[usize],
    sp: &[usize],
    sj: &[usize],
) -> Result<SlotTables> {
    let (cs1, n1) = (split.cs1, split.n1());
    let mut slots = vec![Slot::S(0); a.nnz()];

    // column-singleton rows: whole row goes to ustons
    let mut sup = Vec::with_capacity(cs1 + 1);
    let mut suj = Vec::new();
    sup.push(0);
    for k in 0..cs1 {
        let i = split.rows[k];
        let mut entries: Vec<(usize, usize)> = rows
            .row(i)
            .map(|p| (col_unified[rows.cols[p]], rows.entry[p]))
            .collect();
        // diagonal first, then increasing column
        entries.sort_unstable_by_key(|&(c, _)| if c == k { (0, c) } else { (1, c) });
        if entries.first().map(|e| e.0) != Some(k) || entries.iter().any(|e| e.0 < k) {
            return Err(ParuError::invalid("inconsistent column singleton structure"));
        }
        for (c, p) in entries {
            slots[p] = Slot::U(suj.len());
            suj.push(c);
        }
        sup.push(suj.len());
    }

    // row-singleton columns: the column below the column-singleton rows goes to lstons
    let mut slp = Vec::with_capacity(split.rs1 + 1);
    let mut sli = Vec::new();
    slp.push(0);
    for k in cs1..n1 {
        let j = split.cols[k];
        let mut entries: Vec<(usize, usize)> = Vec::new();
        for p in a.col_ptr()[j]..a.col_ptr()[j + 1] {
            let r = pinv[a.row_idx()[p]];
            if r >= cs1 {
                entries.push((r, p));
            }
        }
        entries.sort_unstable_by_key(|&(r, _)| if r == k { (0, r) } else { (1, r) });
        if entries.first().map(|e| e.0) != Some(k) || entries.iter().any(|e| e.0 < k) {
            return Err(ParuError::invalid("inconsistent row singleton structure"));
        }
        for (r, p) in entries {
            slots[p] = Slot::L(sli.len());
            sli.push(r);
        }
        slp.push(sli.len());
    }

    // everything else lives in S
    for j in 0..a.ncols() {
        let c = col_unified[j];
        if c < n1 {
            continue;
        }
        for p in a.col_ptr()[j]..a.col_ptr()[j + 1] {
            let r = pinv[a.row_idx()[p]];
            if r < cs1 {
                continue;
            }
            if r < n1 {
                return Err(ParuError::invalid("row singleton with an entry in S"));
            }
            let s = r - n1;
            let pos = sj[sp[s]..sp[s + 1]]
                .binary_search(&(c - n1))
                .map_err(|_| ParuError::invalid("entry missing from S"))?;
            slots[p] = Slot::S(sp[s] + pos);
        }
    }
    Ok((sup, suj, slp, sli, slots))
}

/// Group post-ordered columns into fronts and build the front tree.
fn build_fronts(sym: &mut Symbolic, col_parent: &[usize], relax: usize) {
    let ns = sym.ns;
    let mut nchild = vec![0usize; ns];
    for &p in col_parent {
        if p != EMPTY {
            nchild[p] += 1;
        }
    }
    let mut super_cols = vec![0usize];
    for c in 1..ns {
        let size = c - super_cols[super_cols.len() - 1];
        let merge = col_parent[c - 1] == c && (nchild[c] == 1 || size < relax);
        if !merge {
            super_cols.push(c);
        }
    }
    if ns > 0 {
        super_cols.push(ns);
    }
    let nf = super_cols.len() - 1;
    let mut col_front = vec![0usize; ns];
    for f in 0..nf {
        for c in super_cols[f]..super_cols[f + 1] {
            col_front[c] = f;
        }
    }

    let mut parent = vec![nf; nf + 1];
    parent[nf] = EMPTY;
    for f in 0..nf {
        let last = super_cols[f + 1] - 1;
        if col_parent[last] != EMPTY {
            parent[f] = col_front[col_parent[last]];
        }
    }
    let forest: Vec<usize> = parent[..nf]
        .iter()
        .map(|&p| if p == nf { EMPTY } else { p })
        .collect();
    let (childp, child) = etree::children(&forest);

    let mut depth = vec![0usize; nf + 1];
    for f in (0..nf).rev() {
        if parent[f] != nf {
            depth[f] = depth[parent[f]] + 1;
        }
    }
    let mut first: Vec<usize> = (0..=nf).collect();
    for f in 0..nf {
        let p = parent[f];
        first[p] = first[p].min(first[f]);
    }

    sym.nf = nf;
    sym.super_cols = super_cols;
    sym.parent = parent;
    sym.childp = childp;
    sym.child = child;
    sym.depth = depth;
    sym.first = first;
}

/// Row/column bounds, flop bounds and size bounds of every front.
fn build_bounds(sym: &mut Symbolic) {
    let nf = sym.nf;
    let mut fm = vec![0usize; nf];
    let mut cm = vec![0usize; nf];
    let mut front_cols = vec![0usize; nf];
    let mut flop = vec![0.0f64; nf];
    let mut stree = vec![0.0f64; nf];
    let mut pending: Vec<Vec<usize>> = vec![Vec::new(); nf];
    let mut mark = vec![EMPTY; sym.ns];

    for f in 0..nf {
        let (s, e) = (sym.super_cols[f], sym.super_cols[f + 1]);
        let npiv = e - s;
        let mut cb_cols = Vec::new();
        let mut rows = sym.rows_of(f).len();
        for r in sym.rows_of(f) {
            for &c in &sym.sj[sym.sp[r]..sym.sp[r + 1]] {
                if c >= e && mark[c] != f {
                    mark[c] = f;
                    cb_cols.push(c);
                }
            }
        }
        let kids: Vec<usize> = sym.children_of(f).to_vec();
        for &ch in &kids {
            rows += cm[ch];
            for c in std::mem::take(&mut pending[ch]) {
                if c >= e && mark[c] != f {
                    mark[c] = f;
                    cb_cols.push(c);
                }
            }
            stree[f] += stree[ch];
        }
        fm[f] = rows;
        cm[f] = rows.saturating_sub(npiv);
        front_cols[f] = npiv + cb_cols.len();

        let (r, c) = (rows as f64, front_cols[f] as f64);
        let mut fl = 0.0;
        for k in 0..npiv.min(rows) {
            let k = k as f64;
            fl += (r - k - 1.0) + 2.0 * (r - k - 1.0) * (c - k - 1.0);
        }
        flop[f] = fl;
        stree[f] += fl;
        pending[f] = cb_cols;

        sym.lus_bound_size += rows * npiv;
        sym.us_bound_size += npiv * (front_cols[f] - npiv);
        sym.row_int_bound += rows;
        sym.col_int_bound += front_cols[f];
        sym.max_row_bound = sym.max_row_bound.max(rows);
        sym.max_col_bound = sym.max_col_bound.max(front_cols[f]);
    }

    sym.fm = fm;
    sym.cm = cm;
    sym.front_cols = front_cols;
    sym.front_flop_bound = flop;
    sym.stree_flop_bound = stree;
}

/// Tree whose leaves are the S rows and whose inner nodes are the fronts.
fn build_augmented_tree(sym: &mut Symbolic) {
    let (ms, nf, ns) = (sym.ms, sym.nf, sym.ns);
    let root = ms + nf;
    let mut col_front = vec![0usize; ns];
    for f in 0..nf {
        for c in sym.super_cols[f]..sym.super_cols[f + 1] {
            col_front[c] = f;
        }
    }
    let mut aparent = vec![root; ms + nf];
    for r in 0..ms {
        if sym.sp[r] < sym.sp[r + 1] {
            aparent[r] = ms + col_front[sym.sj[sym.sp[r]]];
        }
    }
    for f in 0..nf {
        aparent[ms + f] = ms + sym.parent[f];
    }
    let forest: Vec<usize> = aparent
        .iter()
        .map(|&p| if p == root { EMPTY } else { p })
        .collect();
    let (achildp, achild) = etree::children(&forest);

    sym.aparent = aparent;
    sym.achildp = achildp;
    sym.achild = achild;
    sym.row2atree = (0..ms).collect();
    sym.super2atree = (ms..=ms + nf).collect();
}

/// Maximal runs of single-child fronts.
fn build_chains(sym: &mut Symbolic) {
    let nf = sym.nf;
    let mut chain_start = vec![0usize];
    for f in 1..nf {
        let single = sym.childp[f + 1] - sym.childp[f] == 1;
        if !(sym.parent[f - 1] == f && single) {
            chain_start.push(f);
        }
    }
    if nf > 0 {
        chain_start.push(nf);
    }
    let nchains = chain_start.len() - 1;
    let mut maxrows = vec![0usize; nchains];
    let mut maxcols = vec![0usize; nchains];
    for k in 0..nchains {
        for f in chain_start[k]..chain_start[k + 1] {
            maxrows[k] = maxrows[k].max(sym.fm[f]);
            maxcols[k] = maxcols[k].max(sym.front_cols[f]);
        }
    }
    sym.chain_start = chain_start;
    sym.chain_maxrows = maxrows;
    sym.chain_maxcols = maxcols;
}

/// Partition the fronts into tasks.
///
/// A front whose subtree flop bound reaches the limit is a task on its
/// own. A lighter front starts a whole-subtree task when its parent is
/// the synthetic root or reaches the limit.
fn build_tasks(sym: &mut Symbolic, control: &Control) {
    let nf = sym.nf;
    if nf == 0 {
        return;
    }
    let threads = control.max_threads().max(1) as f64;
    let total: f64 = sym
        .children_of(nf)
        .iter()
        .map(|&r| sym.stree_flop_bound[r])
        .sum();
    let w = control.worthwhile_dgemm as f64;
    let limit = (total / (2.0 * threads)).max(w * w);

    let heavy = |f: usize| sym.stree_flop_bound[f] >= limit;
    let mut task_map = vec![0usize];
    let mut front_task = vec![0usize; nf];
    for f in 0..nf {
        let p = sym.parent[f];
        let top = heavy(f) || p == nf || heavy(p);
        if top {
            let t = task_map.len() - 1;
            for g in task_map[t]..=f {
                front_task[g] = t;
            }
            task_map.push(f + 1);
        }
    }
    let ntasks = task_map.len() - 1;
    let mut task_parent = vec![EMPTY; ntasks];
    let mut task_num_child = vec![0usize; ntasks];
    let mut task_depth = vec![0usize; ntasks];
    for t in 0..ntasks {
        let last = task_map[t + 1] - 1;
        let p = sym.parent[last];
        if p != nf {
            let pt = front_task[p];
            task_parent[t] = pt;
            task_num_child[pt] += 1;
            task_depth[pt] = task_depth[pt].max(task_depth[t] + 1);
        }
    }

    sym.ntasks = ntasks;
    sym.task_map = task_map;
    sym.task_parent = task_parent;
    sym.task_num_child = task_num_child;
    sym.task_depth = task_depth;
}
