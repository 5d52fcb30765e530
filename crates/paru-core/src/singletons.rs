//! Singleton detection.
//!
//! Column singletons (a column with one entry among the remaining rows)
//! are removed first, repeatedly, then row singletons (a row with one
//! entry among the remaining columns). Each singleton is a pivot that
//! needs no arithmetic beyond a division, so it is eliminated outside the
//! frontal tree.
//!
//! Pivot order: `0..cs1` are column singletons, `cs1..n1` row singletons.
//! A column-singleton row has no entries in earlier singleton columns,
//! and a row-singleton row has no entries in S columns, so the singleton
//! block is triangular:
//!
//! ```text
//!        cs1   rs1    S
//!      [ U     U     U  ]  cs1 rows   (ustons, stored by row)
//!      [ 0     L     0  ]  rs1 rows
//!      [ 0     L     S  ]  S rows     (lstons, stored by column)
//! ```

use std::collections::VecDeque;

use crate::matrix::CscMatrix;

/// Row-oriented view of a CSC pattern: for every row, its columns in
/// increasing order and the index of each entry in the CSC arrays.
pub(crate) struct RowForm {
    pub ptr: Vec<usize>,
    pub cols: Vec<usize>,
    pub entry: Vec<usize>,
}

impl RowForm {
    pub fn new(a: &CscMatrix) -> Self {
        let m = a.nrows();
        let mut ptr = vec![0usize; m + 1];
        for &i in a.row_idx() {
            ptr[i + 1] += 1;
        }
        for i in 0..m {
            ptr[i + 1] += ptr[i];
        }
        let mut next = ptr.clone();
        let mut cols = vec![0usize; a.nnz()];
        let mut entry = vec![0usize; a.nnz()];
        for j in 0..a.ncols() {
            for p in a.col_ptr()[j]..a.col_ptr()[j + 1] {
                let i = a.row_idx()[p];
                cols[next[i]] = j;
                entry[next[i]] = p;
                next[i] += 1;
            }
        }
        Self { ptr, cols, entry }
    }

    pub fn row(&self, i: usize) -> std::ops::Range<usize> {
        self.ptr[i]..self.ptr[i + 1]
    }
}

/// Singleton pivots found in a square matrix.
#[derive(Debug, Clone)]
pub(crate) struct SingletonSplit {
    pub cs1: usize,
    pub rs1: usize,
    /// Original row of each singleton pivot, in pivot order.
    pub rows: Vec<usize>,
    /// Original column of each singleton pivot, in pivot order.
    pub cols: Vec<usize>,
    pub row_alive: Vec<bool>,
    pub col_alive: Vec<bool>,
}

impl SingletonSplit {
    pub fn none(m: usize, n: usize) -> Self {
        Self {
            cs1: 0,
            rs1: 0,
            rows: Vec::new(),
            cols: Vec::new(),
            row_alive: vec![true; m],
            col_alive: vec![true; n],
        }
    }

    pub fn n1(&self) -> usize {
        self.cs1 + self.rs1
    }

    fn pivot(&mut self, i: usize, j: usize) {
        self.rows.push(i);
        self.cols.push(j);
        self.row_alive[i] = false;
        self.col_alive[j] = false;
    }
}

/// Find column singletons, then row singletons.
pub(crate) fn find_singletons(a: &CscMatrix, rows: &RowForm) -> SingletonSplit {
    let (m, n) = (a.nrows(), a.ncols());
    let mut split = SingletonSplit::none(m, n);

    let mut col_deg: Vec<usize> = (0..n).map(|j| a.col_ptr()[j + 1] - a.col_ptr()[j]).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&j| col_deg[j] == 1).collect();
    while let Some(j) = queue.pop_front() {
        if !split.col_alive[j] || col_deg[j] != 1 {
            continue;
        }
        let (col_rows, _) = a.col(j);
        let Some(&i) = col_rows.iter().find(|&&i| split.row_alive[i]) else {
            continue;
        };
        split.pivot(i, j);
        for p in rows.row(i) {
            let c = rows.cols[p];
            if split.col_alive[c] {
                col_deg[c] -= 1;
                if col_deg[c] == 1 {
                    queue.push_back(c);
                }
            }
        }
    }
    split.cs1 = split.rows.len();

    let mut row_deg = vec![0usize; m];
    for i in (0..m).filter(|&i| split.row_alive[i]) {
        row_deg[i] = rows.row(i).filter(|&p| split.col_alive[rows.cols[p]]).count();
    }
    let mut queue: VecDeque<usize> = (0..m)
        .filter(|&i| split.row_alive[i] && row_deg[i] == 1)
        .collect();
    while let Some(i) = queue.pop_front() {
        if !split.row_alive[i] || row_deg[i] != 1 {
            continue;
        }
        let Some(j) = rows
            .row(i)
            .map(|p| rows.cols[p])
            .find(|&c| split.col_alive[c])
        else {
            continue;
        };
        split.pivot(i, j);
        let (col_rows, _) = a.col(j);
        for &r in col_rows {
            if split.row_alive[r] {
                row_deg[r] -= 1;
                if row_deg[r] == 1 {
                    queue.push_back(r);
                }
            }
        }
    }
    split.rs1 = split.rows.len() - split.cs1;

    log::debug!(
        "singletons: {} column, {} row of n={}",
        split.cs1,
        split.rs1,
        n
    );
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_of(n: usize, entries: &[(usize, usize)]) -> SingletonSplit {
        let t: Vec<_> = entries.iter().map(|&(i, j)| (i, j, 1.0)).collect();
        let a = CscMatrix::from_triplets(n, n, &t).unwrap();
        let rows = RowForm::new(&a);
        find_singletons(&a, &rows)
    }

    #[test]
    fn test_diagonal_is_all_column_singletons() {
        let s = split_of(4, &[(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(s.cs1, 4);
        assert_eq!(s.rs1, 0);
        assert_eq!(s.rows, s.cols);
    }

    #[test]
    fn test_upper_triangular_peels_iteratively() {
        // column 0 has one entry; removing row 0 makes column 1 a singleton, ...
        let s = split_of(3, &[(0, 0), (0, 1), (1, 1), (0, 2), (1, 2), (2, 2)]);
        assert_eq!(s.cs1, 3);
        assert_eq!(s.cols, vec![0, 1, 2]);
        assert_eq!(s.rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_lower_triangular_peels_from_the_last_column() {
        let s = split_of(3, &[(0, 0), (1, 0), (2, 0), (1, 1), (2, 1), (2, 2)]);
        assert_eq!(s.cs1, 3);
        assert_eq!(s.cols, vec![2, 1, 0]);
        assert_eq!(s.rows, vec![2, 1, 0]);
    }

    #[test]
    fn test_row_singleton_after_columns_exhausted() {
        // row 0 has one entry; every column has two or more
        let s = split_of(
            3,
            &[(0, 0), (1, 0), (2, 0), (1, 1), (2, 1), (1, 2), (2, 2)],
        );
        assert_eq!(s.cs1, 0);
        assert_eq!(s.rs1, 1);
        assert_eq!((s.rows[0], s.cols[0]), (0, 0));
        assert_eq!(s.row_alive, vec![false, true, true]);
        assert_eq!(s.col_alive, vec![false, true, true]);
    }

    #[test]
    fn test_arrow_has_no_singletons() {
        let mut e = vec![];
        for k in 0..5 {
            e.push((k, k));
            if k > 0 {
                e.push((0, k));
                e.push((k, 0));
            }
        }
        let s = split_of(5, &e);
        assert_eq!(s.n1(), 0);
        assert!(s.row_alive.iter().all(|&x| x));
    }
}
