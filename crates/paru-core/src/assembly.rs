//! Assembly of frontal matrices.
//!
//! A front is built from its original rows (taken from `Sx`) and the
//! contribution blocks of its children. Global S indices are translated
//! to local positions through scratch maps that hold `EMPTY` between
//! fronts.

use rayon::prelude::*;

use crate::error::{checked_size, try_reserve_total, Result};
use crate::etree::EMPTY;
use crate::frontal::ContributionBlock;
use crate::symbolic::Symbolic;

/// Global-to-local index maps, reused across every front a worker assembles.
pub(crate) struct AssemblyMaps {
    row_map: Vec<usize>,
    col_map: Vec<usize>,
}

impl AssemblyMaps {
    pub fn new(ms: usize, ns: usize) -> Result<Self> {
        let mut row_map = Vec::new();
        try_reserve_total(&mut row_map, ms)?;
        row_map.resize(ms, EMPTY);
        let mut col_map = Vec::new();
        try_reserve_total(&mut col_map, ns)?;
        col_map.resize(ns, EMPTY);
        Ok(Self { row_map, col_map })
    }

    fn add_col(&mut self, cols: &mut Vec<usize>, c: usize) {
        if self.col_map[c] == EMPTY {
            self.col_map[c] = cols.len();
            cols.push(c);
        }
    }

    fn reset(&mut self, rows: &[usize], cols: &[usize]) {
        for &r in rows {
            self.row_map[r] = EMPTY;
        }
        for &c in cols {
            self.col_map[c] = EMPTY;
        }
    }
}

/// Shape and index lists of an assembled front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssembledFront {
    pub nr: usize,
    pub nc: usize,
    /// Leading pivot candidates: carried columns, then the front's own.
    pub npc: usize,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

/// Assemble front `f` into `buf`.
///
/// Columns are ordered carried candidates first, then the front's pivot
/// columns, then the remaining columns ascending. Rows are the front's
/// original rows followed by the rows of each child block. Every child
/// block is dropped as soon as it has been added.
#[allow(clippy::too_many_arguments)]
pub(crate) fn assemble_front(
    sym: &Symbolic,
    f: usize,
    sx: &[f64],
    children: Vec<ContributionBlock>,
    maps: &mut AssemblyMaps,
    buf: &mut Vec<f64>,
    mem_chunk: usize,
    threads: usize,
) -> Result<AssembledFront> {
    let (s, e) = (sym.super_cols[f], sym.super_cols[f + 1]);
    let own_rows = sym.rows_of(f);

    // ---- columns ----
    let mut cols = Vec::new();
    for cb in &children {
        for &c in &cb.cols[cb.cols.len() - cb.ncarried..] {
            maps.add_col(&mut cols, c);
        }
    }
    for c in s..e {
        maps.add_col(&mut cols, c);
    }
    let npc = cols.len();
    let mut rest = Vec::new();
    for r in own_rows.clone() {
        rest.extend(sym.sj[sym.sp[r]..sym.sp[r + 1]].iter().filter(|&&c| maps.col_map[c] == EMPTY));
    }
    for cb in &children {
        let plain = cb.cols.len() - cb.ncarried;
        rest.extend(cb.cols[..plain].iter().filter(|&&c| maps.col_map[c] == EMPTY));
    }
    rest.sort_unstable();
    rest.dedup();
    for c in rest {
        maps.add_col(&mut cols, c);
    }

    // ---- rows ----
    let mut rows: Vec<usize> = own_rows.clone().collect();
    for cb in &children {
        rows.extend_from_slice(&cb.rows);
    }
    for (i, &r) in rows.iter().enumerate() {
        maps.row_map[r] = i;
    }

    let (nr, nc) = (rows.len(), cols.len());
    let size = match checked_size(nr, nc, "front").and_then(|size| try_reserve_total(buf, size).map(|_| size)) {
        Ok(size) => size,
        Err(e) => {
            maps.reset(&rows, &cols);
            return Err(e);
        }
    };
    if buf.len() < size {
        buf.resize(size, 0.0);
    }
    zero_chunks(&mut buf[..size], mem_chunk, threads);

    for r in own_rows {
        let li = maps.row_map[r];
        for p in sym.sp[r]..sym.sp[r + 1] {
            let lc = maps.col_map[sym.sj[p]];
            buf[li + lc * nr] += sx[p];
        }
    }
    for cb in children {
        let cb_nr = cb.rows.len();
        for (jc, &c) in cb.cols.iter().enumerate() {
            let dst = maps.col_map[c] * nr;
            let src = &cb.values[jc * cb_nr..(jc + 1) * cb_nr];
            for (&r, &v) in cb.rows.iter().zip(src) {
                buf[dst + maps.row_map[r]] += v;
            }
        }
    }

    maps.reset(&rows, &cols);
    log::trace!("assemble: front {} is {}x{} with {} candidates", f, nr, nc, npc);
    Ok(AssembledFront {
        nr,
        nc,
        npc,
        rows,
        cols,
    })
}

fn zero_chunks(buf: &mut [f64], mem_chunk: usize, threads: usize) {
    let chunk = mem_chunk.max(1);
    if threads > 1 && buf.len() > chunk {
        buf.par_chunks_mut(chunk).for_each(|c| c.fill(0.0));
    } else {
        for c in buf.chunks_mut(chunk) {
            c.fill(0.0);
        }
    }
}
