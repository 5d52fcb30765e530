//! Benchmark: one thread vs all threads for the multifrontal factorization
//!
//! Tests with:
//! 1. Matrix Market files given on the command line
//! 2. Synthetic 2D grid matrices (100x100 to 400x400)
//!
//! The analysis is done once per matrix; each run refactorizes with
//! scaled values and reports the median time per factorization.
//!
//! Run with:
//!   cargo run -p paru-core --release --example bench_parallel -- [file.mtx ...]

use paru_core::{analyze, factorize, residual, solve, Control, CscMatrix};
use std::path::Path;
use std::time::Instant;

// ============================================================================
// Matrix Market Parser
// ============================================================================

fn parse_matrix_market(path: &Path) -> Result<CscMatrix, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let mut lines = content.lines();

    let header = lines.next().ok_or("empty file")?.to_lowercase();
    let is_pattern = header.contains("pattern");
    let is_symmetric = header.contains("symmetric");

    let size_line = lines
        .by_ref()
        .find(|l| !l.starts_with('%'))
        .ok_or("missing size line")?;
    let dims: Vec<usize> = size_line
        .split_whitespace()
        .map(|s| s.parse().map_err(|_| format!("bad size line '{}'", size_line)))
        .collect::<Result<_, _>>()?;
    if dims.len() < 2 || dims[0] != dims[1] {
        return Err(format!("expected a square matrix, got '{}'", size_line));
    }
    let n = dims[0];

    let mut entries = Vec::new();
    for line in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 || line.starts_with('%') {
            continue;
        }
        let row = parts[0].parse::<usize>().map_err(|e| e.to_string())? - 1;
        let col = parts[1].parse::<usize>().map_err(|e| e.to_string())? - 1;
        let val = if is_pattern {
            if row == col {
                10.0
            } else {
                -0.1
            }
        } else {
            parts.get(2).ok_or("missing value")?.parse::<f64>().map_err(|_| "bad value")?
        };
        entries.push((row, col, val));
        if is_symmetric && row != col {
            entries.push((col, row, val));
        }
    }
    CscMatrix::from_triplets(n, n, &entries).map_err(|e| e.to_string())
}

// ============================================================================
// Grid Mesh Generator
// ============================================================================

fn build_grid_mesh(grid_size: usize) -> CscMatrix {
    let n = grid_size * grid_size;
    let mut entries = Vec::with_capacity(5 * n);
    for row in 0..grid_size {
        for col in 0..grid_size {
            let node = row * grid_size + col;
            let mut neighbors = Vec::with_capacity(4);
            if row > 0 {
                neighbors.push(node - grid_size);
            }
            if row + 1 < grid_size {
                neighbors.push(node + grid_size);
            }
            if col > 0 {
                neighbors.push(node - 1);
            }
            if col + 1 < grid_size {
                neighbors.push(node + 1);
            }
            entries.push((node, node, neighbors.len() as f64 + 0.1));
            entries.extend(neighbors.into_iter().map(|m| (node, m, -1.0)));
        }
    }
    CscMatrix::from_triplets(n, n, &entries).expect("grid entries are in range")
}

// ============================================================================
// Benchmark Runner
// ============================================================================

fn median(times: &mut [f64]) -> f64 {
    times.sort_by(|a, b| a.total_cmp(b));
    let mid = times.len() / 2;
    if times.len() % 2 == 0 {
        (times[mid - 1] + times[mid]) / 2.0
    } else {
        times[mid]
    }
}

/// Median factorization time in ms and the solution of the last run.
fn time_factorize(a: &CscMatrix, b: &[f64], threads: usize, runs: usize) -> (f64, Vec<f64>) {
    let control = Control {
        paru_max_threads: threads,
        ..Control::default()
    };
    let sym = analyze(a, &control).expect("analyze");
    let mut scaled = a.clone();
    let mut times = Vec::with_capacity(runs);
    let mut x = Vec::new();
    for i in 0..runs {
        let s = 1.0 + 0.01 * i as f64;
        for (v, &orig) in scaled.values_mut().iter_mut().zip(a.values()) {
            *v = orig * s;
        }
        let t0 = Instant::now();
        let num = factorize(&scaled, &sym, &control).expect("factorize");
        times.push(t0.elapsed().as_secs_f64() * 1000.0);
        x = solve(&sym, &num, b, &control).expect("solve");
    }
    (median(&mut times), x)
}

fn run_benchmark(label: &str, a: &CscMatrix, runs: usize) {
    let n = a.nrows();
    println!(
        "=== {} | n = {}, nnz = {}, avg nnz/col = {:.1} ===",
        label,
        n,
        a.nnz(),
        a.nnz() as f64 / n.max(1) as f64
    );
    let b: Vec<f64> = (0..n).map(|i| ((i * 7 + 3) % 100) as f64 * 0.01).collect();
    let num_cpus = std::thread::available_parallelism().map(|p| p.get()).unwrap_or(2);

    let (seq, x_seq) = time_factorize(a, &b, 1, runs);
    let (par, x_par) = time_factorize(a, &b, num_cpus, runs);

    let max_diff = x_seq
        .iter()
        .zip(&x_par)
        .map(|(u, v)| (u - v).abs())
        .fold(0.0f64, f64::max);

    let mut last = a.clone();
    let s = 1.0 + 0.01 * (runs - 1) as f64;
    last.values_mut().iter_mut().for_each(|v| *v *= s);
    let resid = residual(&last, &x_par, &b).map(|r| r.resid).unwrap_or(f64::NAN);

    println!("  1 thread    ({:>3} runs): median {:>10.3} ms/factorize", runs, seq);
    println!(
        "  {:>2} threads ({:>3} runs): median {:>10.3} ms/factorize",
        num_cpus, runs, par
    );
    let speedup = seq / par;
    if speedup >= 1.0 {
        println!("  >>> {:.2}x FASTER (parallel)", speedup);
    } else {
        println!("  >>> {:.2}x slower (parallel)", 1.0 / speedup);
    }
    println!(
        "  Solution match: max|diff| = {:.2e}  {}   residual {:.2e}",
        max_diff,
        if max_diff < 1e-6 { "OK" } else { "MISMATCH" },
        resid
    );
    println!();
}

fn main() {
    env_logger::init();
    let num_cpus = std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1);

    println!("================================================================");
    println!("  Multifrontal LU: 1 thread vs {} threads", num_cpus);
    println!("================================================================");
    println!();

    for arg in std::env::args().skip(1) {
        match parse_matrix_market(Path::new(&arg)) {
            Ok(a) => run_benchmark(&arg, &a, 10),
            Err(e) => println!("  Skipping {}: {}", arg, e),
        }
    }

    println!(">>> 2D GRID MATRICES (synthetic)");
    println!();
    for &grid_size in &[100, 200, 400] {
        let a = build_grid_mesh(grid_size);
        let runs = if grid_size >= 400 { 3 } else { 10 };
        run_benchmark(&format!("Grid {}x{}", grid_size, grid_size), &a, runs);
    }
}
