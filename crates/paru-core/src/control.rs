//! Factorization control parameters.
//!
//! `Control` is a plain struct passed by reference into analysis,
//! factorization and solve. Every field has a default, and fields can
//! also be set by name from strings (for configuration files or command
//! lines) through the `OPTION_DEFS` table, which carries the accepted
//! range of each option.
//!
//! # Adding an option
//!
//! 1. Add the field to `Control` and its default to `Control::default()`.
//! 2. Add an entry to `OPTION_DEFS`:
//!    ```ignore
//!    OptionDef {
//!        name: "myoption",
//!        description: "What this option controls",
//!        default: OptionValue::Int(8),
//!        range: OptionRange::IntRange(1, 64),
//!    },
//!    ```
//! 3. Wire the name into `Control::get` and `Control::apply`.

use serde::{Deserialize, Serialize};

use crate::error::{ParuError, Result};

/// Default allocation/copy granularity, in elements.
pub const MEM_CHUNK: usize = 1024 * 1024;

/// Pivoting and analysis strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Choose from the matrix pattern (analysis) or follow the analysis (numeric).
    #[default]
    Auto,
    Unsymmetric,
    /// Prefer diagonal pivots.
    Symmetric,
}

impl Strategy {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Some(Strategy::Auto),
            "unsymmetric" | "unsym" => Some(Strategy::Unsymmetric),
            "symmetric" | "sym" => Some(Strategy::Symmetric),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Auto => write!(f, "auto"),
            Strategy::Unsymmetric => write!(f, "unsymmetric"),
            Strategy::Symmetric => write!(f, "symmetric"),
        }
    }
}

/// Fill-reducing column ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMethod {
    #[default]
    Amd,
    /// Keep the input column order.
    Natural,
}

impl std::fmt::Display for OrderingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderingMethod::Amd => write!(f, "amd"),
            OrderingMethod::Natural => write!(f, "natural"),
        }
    }
}

/// Control parameters for analysis, factorization and solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Control {
    /// Chunk size (elements) for zeroing and copying large buffers.
    pub mem_chunk: usize,
    pub ordering: OrderingMethod,
    /// Strategy used by the symbolic analysis.
    pub umfpack_strategy: Strategy,
    /// Strip row and column singletons before building the frontal tree.
    pub singletons: bool,
    /// Fronts absorb a parent column while holding fewer pivots than this.
    pub relaxed_amalgamation_threshold: usize,
    /// Scale each row by its largest magnitude.
    pub scale: bool,
    pub panel_width: usize,
    /// Pivot preference during numeric factorization.
    pub paru_strategy: Strategy,
    pub piv_toler: f64,
    pub diag_toler: f64,
    /// Dense updates with a dimension below this use scalar loops.
    pub trivial: usize,
    pub worthwhile_dgemm: usize,
    pub worthwhile_trsm: usize,
    /// Thread budget; 0 uses every available thread.
    pub paru_max_threads: usize,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            mem_chunk: MEM_CHUNK,
            ordering: OrderingMethod::Amd,
            umfpack_strategy: Strategy::Auto,
            singletons: true,
            relaxed_amalgamation_threshold: 32,
            scale: true,
            panel_width: 32,
            paru_strategy: Strategy::Auto,
            piv_toler: 0.1,
            diag_toler: 0.001,
            trivial: 4,
            worthwhile_dgemm: 512,
            worthwhile_trsm: 4096,
            paru_max_threads: 0,
        }
    }
}

/// Typed value for an option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::Str(v) => write!(f, "{}", v),
            OptionValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Range constraint for an option.
#[derive(Debug, Clone)]
pub enum OptionRange {
    None,
    /// Inclusive integer range.
    IntRange(i64, i64),
    /// Half-open float range `(min, max]`.
    FloatRange(f64, f64),
    StringEnum(&'static [&'static str]),
}

/// Static definition of one option.
#[derive(Debug, Clone)]
pub struct OptionDef {
    pub name: &'static str,
    pub description: &'static str,
    pub default: OptionValue,
    pub range: OptionRange,
}

const STRATEGIES: &[&str] = &["auto", "unsymmetric", "unsym", "symmetric", "sym"];

/// All recognized options.
pub const OPTION_DEFS: &[OptionDef] = &[
    OptionDef {
        name: "mem_chunk",
        description: "Chunk size for zeroing and copying large buffers",
        default: OptionValue::Int(MEM_CHUNK as i64),
        range: OptionRange::IntRange(1, 1 << 40),
    },
    OptionDef {
        name: "ordering",
        description: "Fill-reducing column ordering",
        default: OptionValue::Str(String::new()),
        range: OptionRange::StringEnum(&["amd", "natural"]),
    },
    OptionDef {
        name: "umfpack_strategy",
        description: "Strategy of the symbolic analysis",
        default: OptionValue::Str(String::new()),
        range: OptionRange::StringEnum(STRATEGIES),
    },
    OptionDef {
        name: "singletons",
        description: "Strip row and column singletons",
        default: OptionValue::Bool(true),
        range: OptionRange::None,
    },
    OptionDef {
        name: "relaxed_amalgamation_threshold",
        description: "Pivot count below which fronts absorb their parent column",
        default: OptionValue::Int(32),
        range: OptionRange::IntRange(0, 4096),
    },
    OptionDef {
        name: "scale",
        description: "Scale rows by their largest magnitude",
        default: OptionValue::Bool(true),
        range: OptionRange::None,
    },
    OptionDef {
        name: "panel_width",
        description: "Columns factored between blocked updates",
        default: OptionValue::Int(32),
        range: OptionRange::IntRange(1, 4096),
    },
    OptionDef {
        name: "paru_strategy",
        description: "Pivot preference during numeric factorization",
        default: OptionValue::Str(String::new()),
        range: OptionRange::StringEnum(STRATEGIES),
    },
    OptionDef {
        name: "piv_toler",
        description: "Threshold partial pivoting tolerance",
        default: OptionValue::Float(0.1),
        range: OptionRange::FloatRange(0.0, 1.0),
    },
    OptionDef {
        name: "diag_toler",
        description: "Tolerance for accepting a diagonal pivot",
        default: OptionValue::Float(0.001),
        range: OptionRange::FloatRange(0.0, 1.0),
    },
    OptionDef {
        name: "trivial",
        description: "Dense updates below this dimension use scalar loops",
        default: OptionValue::Int(4),
        range: OptionRange::IntRange(0, 4096),
    },
    OptionDef {
        name: "worthwhile_dgemm",
        description: "Multiply dimension at which kernel threads are used",
        default: OptionValue::Int(512),
        range: OptionRange::IntRange(1, 1 << 30),
    },
    OptionDef {
        name: "worthwhile_trsm",
        description: "Triangular solve width at which kernel threads are used",
        default: OptionValue::Int(4096),
        range: OptionRange::IntRange(1, 1 << 30),
    },
    OptionDef {
        name: "paru_max_threads",
        description: "Thread budget (0 = all available)",
        default: OptionValue::Int(0),
        range: OptionRange::IntRange(0, 1 << 16),
    },
];

impl Control {
    /// Number of threads this control allows.
    pub fn max_threads(&self) -> usize {
        if self.paru_max_threads == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.paru_max_threads
        }
    }

    /// Current value of an option by name.
    pub fn get(&self, key: &str) -> Option<OptionValue> {
        let v = match key.to_ascii_lowercase().as_str() {
            "mem_chunk" => OptionValue::Int(self.mem_chunk as i64),
            "ordering" => OptionValue::Str(self.ordering.to_string()),
            "umfpack_strategy" => OptionValue::Str(self.umfpack_strategy.to_string()),
            "singletons" => OptionValue::Bool(self.singletons),
            "relaxed_amalgamation_threshold" => {
                OptionValue::Int(self.relaxed_amalgamation_threshold as i64)
            }
            "scale" => OptionValue::Bool(self.scale),
            "panel_width" => OptionValue::Int(self.panel_width as i64),
            "paru_strategy" => OptionValue::Str(self.paru_strategy.to_string()),
            "piv_toler" => OptionValue::Float(self.piv_toler),
            "diag_toler" => OptionValue::Float(self.diag_toler),
            "trivial" => OptionValue::Int(self.trivial as i64),
            "worthwhile_dgemm" => OptionValue::Int(self.worthwhile_dgemm as i64),
            "worthwhile_trsm" => OptionValue::Int(self.worthwhile_trsm as i64),
            "paru_max_threads" => OptionValue::Int(self.paru_max_threads as i64),
            _ => return None,
        };
        Some(v)
    }

    /// Set an option by name from a raw string value.
    ///
    /// The value is parsed according to the option's type and checked
    /// against its range. Unknown names, unparsable values and
    /// out-of-range values are rejected and leave `self` unchanged.
    pub fn set(&mut self, key: &str, raw_value: &str) -> Result<()> {
        let key_lower = key.to_ascii_lowercase();
        let def = OPTION_DEFS
            .iter()
            .find(|d| d.name == key_lower)
            .ok_or_else(|| ParuError::invalid(format!("unknown option '{}'", key)))?;

        let parsed = match (&def.default, &def.range) {
            (_, OptionRange::StringEnum(_)) => OptionValue::Str(raw_value.to_ascii_lowercase()),
            (OptionValue::Float(_), _) => raw_value
                .trim()
                .parse()
                .map(OptionValue::Float)
                .map_err(|_| bad_value(&key_lower, raw_value, "number"))?,
            (OptionValue::Int(_), _) => raw_value
                .trim()
                .parse()
                .map(OptionValue::Int)
                .map_err(|_| bad_value(&key_lower, raw_value, "integer"))?,
            (OptionValue::Bool(_), _) => match raw_value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => OptionValue::Bool(true),
                "0" | "false" | "no" | "off" => OptionValue::Bool(false),
                _ => return Err(bad_value(&key_lower, raw_value, "boolean")),
            },
            (OptionValue::Str(_), _) => OptionValue::Str(raw_value.to_string()),
        };

        if !validate_range(&parsed, &def.range) {
            return Err(ParuError::invalid(format!(
                "option '{}' value {} out of range ({})",
                key_lower,
                parsed,
                format_range(&def.range)
            )));
        }

        if self.get(&key_lower).as_ref() != Some(&parsed) {
            log::debug!("control: {} = {}", key_lower, parsed);
        }
        self.apply(&key_lower, parsed)
    }

    fn apply(&mut self, key: &str, value: OptionValue) -> Result<()> {
        match (key, value) {
            ("mem_chunk", OptionValue::Int(v)) => self.mem_chunk = v as usize,
            ("ordering", OptionValue::Str(s)) => {
                self.ordering = if s == "natural" {
                    OrderingMethod::Natural
                } else {
                    OrderingMethod::Amd
                }
            }
            ("umfpack_strategy", OptionValue::Str(s)) => {
                self.umfpack_strategy = Strategy::parse(&s).unwrap_or_default()
            }
            ("singletons", OptionValue::Bool(b)) => self.singletons = b,
            ("relaxed_amalgamation_threshold", OptionValue::Int(v)) => {
                self.relaxed_amalgamation_threshold = v as usize
            }
            ("scale", OptionValue::Bool(b)) => self.scale = b,
            ("panel_width", OptionValue::Int(v)) => self.panel_width = v as usize,
            ("paru_strategy", OptionValue::Str(s)) => {
                self.paru_strategy = Strategy::parse(&s).unwrap_or_default()
            }
            ("piv_toler", OptionValue::Float(v)) => self.piv_toler = v,
            ("diag_toler", OptionValue::Float(v)) => self.diag_toler = v,
            ("trivial", OptionValue::Int(v)) => self.trivial = v as usize,
            ("worthwhile_dgemm", OptionValue::Int(v)) => self.worthwhile_dgemm = v as usize,
            ("worthwhile_trsm", OptionValue::Int(v)) => self.worthwhile_trsm = v as usize,
            ("paru_max_threads", OptionValue::Int(v)) => self.paru_max_threads = v as usize,
            (k, v) => {
                return Err(ParuError::invalid(format!(
                    "option '{}' cannot take value {}",
                    k, v
                )))
            }
        }
        Ok(())
    }

    /// Check every field against the option table.
    pub fn validate(&self) -> Result<()> {
        for def in OPTION_DEFS {
            let Some(value) = self.get(def.name) else {
                continue;
            };
            if !validate_range(&value, &def.range) {
                return Err(ParuError::invalid(format!(
                    "option '{}' value {} out of range ({})",
                    def.name,
                    value,
                    format_range(&def.range)
                )));
            }
        }
        Ok(())
    }
}

fn bad_value(key: &str, raw: &str, kind: &str) -> ParuError {
    ParuError::invalid(format!(
        "option '{}' value '{}' is not a valid {}",
        key, raw, kind
    ))
}

fn validate_range(value: &OptionValue, range: &OptionRange) -> bool {
    match (value, range) {
        (_, OptionRange::None) => true,
        (OptionValue::Float(v), OptionRange::FloatRange(min, max)) => *v > *min && *v <= *max,
        (OptionValue::Int(v), OptionRange::IntRange(min, max)) => *v >= *min && *v <= *max,
        (OptionValue::Str(v), OptionRange::StringEnum(allowed)) => {
            allowed.iter().any(|a| a.eq_ignore_ascii_case(v))
        }
        _ => false,
    }
}

fn format_range(range: &OptionRange) -> String {
    match range {
        OptionRange::None => "no range".to_string(),
        OptionRange::IntRange(min, max) => format!("{} to {}", min, max),
        OptionRange::FloatRange(min, max) => format!("above {} up to {}", min, max),
        OptionRange::StringEnum(values) => format!("one of: {}", values.join(", ")),
    }
}
