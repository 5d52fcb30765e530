//! Error types for analysis, factorization and solve.

use thiserror::Error;

/// Status categories reported by every fallible entry point.
///
/// The numeric codes follow the usual sparse-solver convention: zero on
/// success, negative on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Info {
    Success,
    OutOfMemory,
    Invalid,
    Singular,
    TooLarge,
}

impl Info {
    pub fn code(self) -> i32 {
        match self {
            Info::Success => 0,
            Info::OutOfMemory => -1,
            Info::Invalid => -2,
            Info::Singular => -3,
            Info::TooLarge => -4,
        }
    }
}

impl std::fmt::Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Info::Success => "success",
            Info::OutOfMemory => "out of memory",
            Info::Invalid => "invalid input",
            Info::Singular => "singular",
            Info::TooLarge => "problem too large",
        };
        write!(f, "{}", s)
    }
}

/// Errors produced by the factorization engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParuError {
    /// A buffer could not be allocated.
    #[error("out of memory: failed to allocate {bytes} bytes")]
    OutOfMemory {
        /// Size of the failed request.
        bytes: usize,
    },

    /// Malformed input, dimension mismatch or Symbolic/Numeric pairing mismatch.
    #[error("invalid input: {reason}")]
    Invalid {
        /// Human readable description.
        reason: String,
    },

    /// No acceptable pivot exists for a column, even after delaying it to a root.
    #[error("singular matrix: no acceptable pivot for column {column} (|u_ii| in [{min_udiag:e}, {max_udiag:e}])")]
    Singular {
        /// Original column index of the failed pivot.
        column: usize,
        /// Smallest |u_ii| over the pivots completed before the failure.
        min_udiag: f64,
        /// Largest |u_ii| over the pivots completed before the failure.
        max_udiag: f64,
    },

    /// A row of the matrix is entirely zero.
    #[error("singular matrix: row {row} is entirely zero")]
    ZeroRow {
        /// Original row index.
        row: usize,
    },

    /// A size computation overflowed the index type.
    #[error("problem too large: {what} overflows usize")]
    TooLarge {
        /// What was being sized.
        what: &'static str,
    },
}

impl ParuError {
    /// Status category of this error.
    pub fn info(&self) -> Info {
        match self {
            ParuError::OutOfMemory { .. } => Info::OutOfMemory,
            ParuError::Invalid { .. } => Info::Invalid,
            ParuError::Singular { .. } | ParuError::ZeroRow { .. } => Info::Singular,
            ParuError::TooLarge { .. } => Info::TooLarge,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ParuError::Invalid {
            reason: reason.into(),
        }
    }

    /// Singular column whose diagonal statistics are filled in later.
    pub(crate) fn singular(column: usize) -> Self {
        ParuError::Singular {
            column,
            min_udiag: f64::NAN,
            max_udiag: f64::NAN,
        }
    }

    pub(crate) fn with_udiag(self, min: f64, max: f64) -> Self {
        match self {
            ParuError::Singular { column, .. } => ParuError::Singular {
                column,
                min_udiag: min,
                max_udiag: max,
            },
            other => other,
        }
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, ParuError>;

/// Allocate a zero-filled vector, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| ParuError::OutOfMemory {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(len, T::default());
    Ok(v)
}

/// Grow `v` so that it can hold `len` elements without reallocating.
pub(crate) fn try_reserve_total<T>(v: &mut Vec<T>, len: usize) -> Result<()> {
    let extra = len.saturating_sub(v.len());
    v.try_reserve_exact(extra).map_err(|_| ParuError::OutOfMemory {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })
}

/// Checked product used for every dense size computation.
pub(crate) fn checked_size(a: usize, b: usize, what: &'static str) -> Result<usize> {
    a.checked_mul(b)
        .filter(|&s| s <= isize::MAX as usize / std::mem::size_of::<f64>())
        .ok_or(ParuError::TooLarge { what })
}
