//! Column elimination tree and post-ordering.
//!
//! The column elimination tree of `S` is the elimination tree of `S^T S`.
//! It is computed with Liu's algorithm, using the edge `(firstcol[r], c)`
//! in place of every edge `(r, c)` of `S`: each row clique of `S^T S` is
//! replaced by a star centered at its first column, which yields the same
//! tree without forming `S^T S`.

/// Marks an absent index (no parent, no child, unassigned slot).
pub const EMPTY: usize = usize::MAX;

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        while self.parent[i] != root {
            let next = self.parent[i];
            self.parent[i] = root;
            i = next;
        }
        root
    }

    fn link(&mut self, a: usize, b: usize) -> usize {
        self.parent[a] = b;
        b
    }
}

/// Column elimination tree of a matrix given in CSC form.
///
/// Returns `parent` with `parent[c] = EMPTY` for roots. Columns are
/// visited in index order, so `parent[c] > c` always holds.
pub fn column_etree(nrows: usize, ncols: usize, col_ptr: &[usize], row_idx: &[usize]) -> Vec<usize> {
    let mut firstcol = vec![ncols; nrows];
    for c in 0..ncols {
        for &r in &row_idx[col_ptr[c]..col_ptr[c + 1]] {
            if firstcol[r] > c {
                firstcol[r] = c;
            }
        }
    }

    let mut sets = DisjointSet::new(ncols);
    let mut root = vec![0usize; ncols];
    let mut parent = vec![EMPTY; ncols];
    for c in 0..ncols {
        let mut cset = c;
        root[cset] = c;
        for &r in &row_idx[col_ptr[c]..col_ptr[c + 1]] {
            let f = firstcol[r];
            if f >= c {
                continue;
            }
            let rset = sets.find(f);
            let rroot = root[rset];
            if rroot != c {
                parent[rroot] = c;
                cset = sets.link(rset, cset);
                root[cset] = c;
            }
        }
    }
    parent
}

/// Post-order of a forest given by parent pointers (`EMPTY` for roots).
///
/// Children are visited in increasing index order. Returns `post` with
/// `post[k]` = node placed at position `k`.
pub fn postorder(parent: &[usize]) -> Vec<usize> {
    let n = parent.len();
    // child lists, built in reverse so that heads hold the smallest child
    let mut head = vec![EMPTY; n + 1];
    let mut next = vec![EMPTY; n];
    for v in (0..n).rev() {
        let p = if parent[v] == EMPTY { n } else { parent[v] };
        next[v] = head[p];
        head[p] = v;
    }

    let mut post = Vec::with_capacity(n);
    let mut stack: Vec<usize> = Vec::new();
    let mut root = head[n];
    while root != EMPTY {
        stack.push(root);
        while let Some(&top) = stack.last() {
            let child = head[top];
            if child == EMPTY {
                stack.pop();
                post.push(top);
            } else {
                head[top] = next[child];
                stack.push(child);
            }
        }
        root = next[root];
    }
    post
}

/// Children of every node in CSR form, for a forest whose roots hang off
/// the synthetic node `n = parent.len()`. Returns `(childp, child)` with
/// `childp.len() == n + 2`; children appear in increasing order.
pub fn children(parent: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let n = parent.len();
    let mut childp = vec![0usize; n + 2];
    for &p in parent {
        let p = if p == EMPTY { n } else { p };
        childp[p + 1] += 1;
    }
    for i in 0..=n {
        childp[i + 1] += childp[i];
    }
    let mut next = childp.clone();
    let mut child = vec![0usize; n];
    for (v, &p) in parent.iter().enumerate() {
        let p = if p == EMPTY { n } else { p };
        child[next[p]] = v;
        next[p] += 1;
    }
    (childp, child)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csc(ncols: usize, cols: &[&[usize]]) -> (Vec<usize>, Vec<usize>) {
        let mut ptr = vec![0];
        let mut idx = Vec::new();
        for c in 0..ncols {
            idx.extend_from_slice(cols[c]);
            ptr.push(idx.len());
        }
        (ptr, idx)
    }

    #[test]
    fn test_etree_diagonal_is_forest_of_roots() {
        let (ptr, idx) = csc(3, &[&[0], &[1], &[2]]);
        assert_eq!(column_etree(3, 3, &ptr, &idx), vec![EMPTY; 3]);
    }

    #[test]
    fn test_etree_dense_row_makes_chain() {
        // row 0 touches every column: S^T S is dense
        let (ptr, idx) = csc(4, &[&[0, 1], &[0, 2], &[0, 3], &[0]]);
        assert_eq!(column_etree(4, 4, &ptr, &idx), vec![1, 2, 3, EMPTY]);
    }

    #[test]
    fn test_etree_two_independent_blocks() {
        // columns {0,1} share row 0, columns {2,3} share row 1
        let (ptr, idx) = csc(4, &[&[0], &[0], &[1], &[1]]);
        assert_eq!(column_etree(2, 4, &ptr, &idx), vec![1, EMPTY, 3, EMPTY]);
    }

    #[test]
    fn test_postorder_children_before_parents() {
        //      4
        //    /   \
        //   1     3
        //   |     |
        //   0     2
        let parent = vec![1, 4, 3, 4, EMPTY];
        assert_eq!(postorder(&parent), vec![0, 1, 2, 3, 4]);

        // parent listed out of order
        let parent = vec![2, EMPTY, 1];
        assert_eq!(postorder(&parent), vec![0, 2, 1]);
    }

    #[test]
    fn test_children_csr() {
        let parent = vec![2, 2, EMPTY, EMPTY];
        let (childp, child) = children(&parent);
        assert_eq!(childp, vec![0, 0, 0, 2, 2, 4]);
        assert_eq!(child, vec![0, 1, 2, 3]);
    }
}
