//! Linear Solver Front End
//!
//! A small trait over "analyze, factor, solve" so that callers can swap
//! the multifrontal solver for the dense reference:
//!
//! | Solver | Cost | Use |
//! |--------|------|-----|
//! | Paru   | O(nnz·fill), parallel | production |
//! | Dense  | O(n³) | validation, tiny systems |
//!
//! # Usage
//!
//! ```ignore
//! use paru_core::solver::{create_solver, LinearSolver, SolverType};
//!
//! let mut solver = create_solver(SolverType::Paru);
//!
//! // Analyze the sparsity pattern (reused while it does not change)
//! solver.analyze(&a)?;
//!
//! // Factor, then solve Ax = b in place
//! solver.factor(&a)?;
//! solver.solve(&mut rhs)?;
//! ```

use crate::control::Control;
use crate::error::{ParuError, Result};
use crate::matrix::CscMatrix;
use crate::numeric::{factorize, Numeric};
use crate::solve::solve_in_place;
use crate::symbolic::{analyze, Symbolic};

/// Solver type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverType {
    /// Parallel multifrontal sparse LU
    #[default]
    Paru,
    /// Dense LU with partial pivoting
    Dense,
}

pub trait LinearSolver: Send {
    /// Analyze the sparsity pattern (can be cached)
    fn analyze(&mut self, a: &CscMatrix) -> Result<()>;

    /// Factorize the matrix
    fn factor(&mut self, a: &CscMatrix) -> Result<()>;

    /// Solve Ax = b, result overwrites rhs
    fn solve(&mut self, rhs: &mut [f64]) -> Result<()>;

    /// Reset cached pattern (call when matrix structure changes)
    fn reset_pattern(&mut self);

    /// Get the solver name for diagnostics
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Create solver based on explicit type selection
pub fn create_solver(solver_type: SolverType) -> Box<dyn LinearSolver> {
    match solver_type {
        SolverType::Paru => Box::new(ParuSolver::new(Control::default())),
        SolverType::Dense => Box::new(DenseSolver::new(0)),
    }
}

// ============================================================================
// Multifrontal Solver
// ============================================================================

/// Counters kept across calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub analyze_count: usize,
    /// Analyze calls answered by the cached symbolic analysis
    pub symbolic_reuse_count: usize,
    pub factor_count: usize,
    pub solve_count: usize,
}

/// Multifrontal solver with symbolic reuse.
///
/// The symbolic analysis is kept while the matrix pattern stays the same,
/// so repeated factorizations with new values skip the ordering and tree
/// construction.
#[derive(Debug)]
pub struct ParuSolver {
    control: Control,
    symbolic: Option<Symbolic>,
    numeric: Option<Numeric>,
    pub stats: SolverStats,
}

impl ParuSolver {
    pub fn new(control: Control) -> Self {
        Self {
            control,
            symbolic: None,
            numeric: None,
            stats: SolverStats::default(),
        }
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn symbolic(&self) -> Option<&Symbolic> {
        self.symbolic.as_ref()
    }

    pub fn numeric(&self) -> Option<&Numeric> {
        self.numeric.as_ref()
    }

    /// Reciprocal condition estimate of the last factorization
    pub fn rcond(&self) -> Option<f64> {
        self.numeric.as_ref().map(|n| n.rcond)
    }
}

impl LinearSolver for ParuSolver {
    fn analyze(&mut self, a: &CscMatrix) -> Result<()> {
        if let Some(sym) = &self.symbolic {
            if sym.matches_pattern(a) {
                self.stats.symbolic_reuse_count += 1;
                return Ok(());
            }
        }
        self.numeric = None;
        self.symbolic = Some(analyze(a, &self.control)?);
        self.stats.analyze_count += 1;
        Ok(())
    }

    fn factor(&mut self, a: &CscMatrix) -> Result<()> {
        self.analyze(a)?;
        let sym = self
            .symbolic
            .as_ref()
            .ok_or_else(|| ParuError::invalid("no symbolic analysis"))?;
        self.numeric = None;
        self.numeric = Some(factorize(a, sym, &self.control)?);
        self.stats.factor_count += 1;
        Ok(())
    }

    fn solve(&mut self, rhs: &mut [f64]) -> Result<()> {
        let (Some(sym), Some(num)) = (&self.symbolic, &self.numeric) else {
            return Err(ParuError::invalid("solve called before a successful factor"));
        };
        solve_in_place(sym, num, rhs, &self.control)?;
        self.stats.solve_count += 1;
        Ok(())
    }

    fn reset_pattern(&mut self) {
        self.symbolic = None;
        self.numeric = None;
    }

    fn name(&self) -> &'static str {
        "Paru"
    }
}

// ============================================================================
// Dense Reference Solver
// ============================================================================

/// Dense LU with partial pivoting, used as a reference.
#[derive(Debug)]
pub struct DenseSolver {
    pub n: usize,
    /// Row-major LU factors
    lu: Vec<f64>,
    pivots: Vec<usize>,
    factored: bool,
}

impl DenseSolver {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            lu: vec![0.0; n * n],
            pivots: (0..n).collect(),
            factored: false,
        }
    }

    fn build_dense(&mut self, a: &CscMatrix) -> Result<()> {
        if a.nrows() != a.ncols() {
            return Err(ParuError::invalid(format!(
                "matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let n = a.nrows();
        if self.n != n {
            self.n = n;
            self.lu.resize(n * n, 0.0);
        }
        self.lu.fill(0.0);
        for col in 0..n {
            let (rows, vals) = a.col(col);
            for (&row, &v) in rows.iter().zip(vals) {
                self.lu[row * n + col] += v;
            }
        }
        Ok(())
    }

    fn factorize(&mut self) -> Result<()> {
        let n = self.n;
        self.pivots = (0..n).collect();
        let (mut min_udiag, mut max_udiag) = (f64::INFINITY, 0.0f64);
        for k in 0..n {
            let mut pivot = k;
            let mut max_val = self.lu[k * n + k].abs();
            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    pivot = i;
                }
            }
            if max_val == 0.0 {
                let min_udiag = if k == 0 { 0.0 } else { min_udiag };
                return Err(ParuError::singular(k).with_udiag(min_udiag, max_udiag));
            }
            min_udiag = min_udiag.min(max_val);
            max_udiag = max_udiag.max(max_val);
            if pivot != k {
                for j in 0..n {
                    self.lu.swap(k * n + j, pivot * n + j);
                }
                self.pivots.swap(k, pivot);
            }
            let pivot_val = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot_val;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }
        Ok(())
    }
}

impl LinearSolver for DenseSolver {
    fn analyze(&mut self, _a: &CscMatrix) -> Result<()> {
        Ok(())
    }

    fn factor(&mut self, a: &CscMatrix) -> Result<()> {
        self.factored = false;
        self.build_dense(a)?;
        self.factorize()?;
        self.factored = true;
        Ok(())
    }

    fn solve(&mut self, rhs: &mut [f64]) -> Result<()> {
        let n = self.n;
        if !self.factored {
            return Err(ParuError::invalid("solve called before a successful factor"));
        }
        if rhs.len() != n {
            return Err(ParuError::invalid(format!(
                "RHS length {} != matrix dimension {}",
                rhs.len(),
                n
            )));
        }
        let mut b: Vec<f64> = self.pivots.iter().map(|&p| rhs[p]).collect();
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= self.lu[i * n + j] * b[j];
            }
            b[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = b[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * rhs[j];
            }
            rhs[i] = sum / self.lu[i * n + i];
        }
        Ok(())
    }

    fn reset_pattern(&mut self) {}

    fn name(&self) -> &'static str {
        "Dense"
    }
}
