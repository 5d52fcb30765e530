//! Parallel multifrontal sparse LU factorization.
//!
//! ```ignore
//! use paru_core::{analyze, factorize, solve, Control, CscMatrix};
//!
//! let control = Control::default();
//! let sym = analyze(&a, &control)?;
//! let num = factorize(&a, &sym, &control)?;
//! let x = solve(&sym, &num, &b, &control)?;
//! ```
//!
//! `analyze` depends only on the pattern of `A`, so one `Symbolic` serves
//! any number of `factorize` calls with new values.

pub mod amd;
pub mod control;
pub mod error;
pub mod etree;
pub mod matrix;
pub mod numeric;
pub mod perm;
pub mod residual;
pub mod solve;
pub mod solver;
pub mod symbolic;

mod assembly;
mod dense;
mod frontal;
mod scaling;
mod scheduler;
mod singletons;

pub use control::{Control, OptionDef, OptionRange, OptionValue, OrderingMethod, Strategy, OPTION_DEFS};
pub use error::{Info, ParuError, Result};
pub use etree::EMPTY;
pub use frontal::FrontFactors;
pub use matrix::CscMatrix;
pub use numeric::{factorize, Numeric};
pub use perm::{inv_perm, inv_perm_matrix, perm, perm_matrix};
pub use residual::{residual, residual_matrix, Residual};
pub use solve::{
    lsolve, lsolve_matrix, solve, solve_in_place, solve_matrix, solve_matrix_in_place, usolve, usolve_matrix,
};
pub use solver::{create_solver, DenseSolver, LinearSolver, ParuSolver, SolverStats, SolverType};
pub use symbolic::{analyze, Symbolic};

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_UPDATE: u32 = 0;
pub const VERSION_DATE: &str = "Oct 19, 2026";

/// `(major, minor, update)` of the library.
pub fn version() -> (u32, u32, u32) {
    (VERSION_MAJOR, VERSION_MINOR, VERSION_UPDATE)
}
