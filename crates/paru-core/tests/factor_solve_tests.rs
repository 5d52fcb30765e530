//! End-to-end tests: analyze, factorize, solve

use paru_core::{
    analyze, factorize, inv_perm, lsolve, perm, residual, solve, solve_matrix, solve_matrix_in_place, usolve,
    Control, CscMatrix, DenseSolver, Info, LinearSolver, ParuError, ParuSolver, EMPTY,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper: verify Ax = b entry by entry
fn check_residual(a: &CscMatrix, x: &[f64], b: &[f64], tol: f64) {
    let mut ax = vec![0.0; b.len()];
    a.mul_vec(x, &mut ax);
    for (row, (u, v)) in ax.iter().zip(b).enumerate() {
        let r = (u - v).abs();
        assert!(
            r < tol * (1.0 + v.abs()),
            "Residual too large at row {}: |Ax-b| = {:.2e} (Ax={}, b={})",
            row,
            r,
            u,
            v
        );
    }
}

/// Random sparse matrix with a strictly dominant diagonal.
fn random_dominant(n: usize, per_col: usize, seed: u64) -> CscMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut triplets = Vec::new();
    let mut row_sum = vec![0.0f64; n];
    for j in 0..n {
        for _ in 0..per_col {
            let i = rng.gen_range(0..n);
            if i == j {
                continue;
            }
            let v: f64 = rng.gen_range(-1.0..1.0);
            row_sum[i] += v.abs();
            triplets.push((i, j, v));
        }
    }
    for (i, s) in row_sum.iter().enumerate() {
        triplets.push((i, i, s + 1.0));
    }
    CscMatrix::from_triplets(n, n, &triplets).unwrap()
}

/// Random sparse matrix whose dominant entry in column j sits in row
/// p[j] for a random permutation p, so most pivots lie off the diagonal.
fn random_permuted_dominant(n: usize, per_col: usize, seed: u64) -> CscMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut p: Vec<usize> = (0..n).collect();
    for k in (1..n).rev() {
        p.swap(k, rng.gen_range(0..=k));
    }
    let mut triplets = Vec::new();
    let mut row_sum = vec![0.0f64; n];
    for j in 0..n {
        for _ in 0..per_col {
            let i = rng.gen_range(0..n);
            if i == p[j] {
                continue;
            }
            let v: f64 = rng.gen_range(-1.0..1.0);
            row_sum[i] += v.abs();
            triplets.push((i, j, v));
        }
    }
    for (j, &i) in p.iter().enumerate() {
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        triplets.push((i, j, sign * (row_sum[i] + 1.0)));
    }
    CscMatrix::from_triplets(n, n, &triplets).unwrap()
}

/// `blocks` copies of [2 1; 1 3] on the diagonal.
fn block_diagonal(blocks: usize) -> CscMatrix {
    let mut t = Vec::with_capacity(4 * blocks);
    for k in 0..blocks {
        let (i, j) = (2 * k, 2 * k + 1);
        t.extend([(i, i, 2.0), (j, i, 1.0), (i, j, 1.0), (j, j, 3.0)]);
    }
    CscMatrix::from_triplets(2 * blocks, 2 * blocks, &t).unwrap()
}

fn random_rhs(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-10.0..10.0)).collect()
}

fn arrow(n: usize) -> CscMatrix {
    let mut t = vec![(0, 0, n as f64)];
    for k in 1..n {
        t.push((k, k, 4.0 + k as f64));
        t.push((0, k, 1.0));
        t.push((k, 0, -1.0));
    }
    CscMatrix::from_triplets(n, n, &t).unwrap()
}

// ============================================================================
// Basic scenarios
// ============================================================================

#[test]
fn test_identity_returns_rhs_exactly() {
    init_logger();
    let a = CscMatrix::identity(5);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    assert_eq!(sym.n1, 5);
    assert_eq!(sym.nf, 0);
    let num = factorize(&a, &sym, &control).unwrap();

    let b = vec![1.0, -2.5, 3.0, 0.0, 7.25];
    let x = solve(&sym, &num, &b, &control).unwrap();
    assert_eq!(x, b);
}

#[test]
fn test_diagonal_is_all_singletons() {
    let n = 6;
    let t: Vec<_> = (0..n).map(|k| (k, k, (k + 1) as f64)).collect();
    let a = CscMatrix::from_triplets(n, n, &t).unwrap();
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    assert_eq!(sym.n1, n);
    assert_eq!(sym.rs1 + sym.cs1, sym.n1);
    assert_eq!(sym.nf, 0);

    let num = factorize(&a, &sym, &control).unwrap();
    let b = vec![1.0; n];
    let x = solve(&sym, &num, &b, &control).unwrap();
    for (k, v) in x.iter().enumerate() {
        assert!((v - 1.0 / (k + 1) as f64).abs() < 1e-15);
    }
}

#[test]
fn test_explicit_zero_row_is_singular() {
    // row 1 is structurally present but numerically zero
    let a = CscMatrix::from_triplets(
        3,
        3,
        &[(0, 0, 2.0), (0, 1, 1.0), (1, 0, 0.0), (1, 1, 0.0), (2, 1, 1.0), (2, 2, 3.0)],
    )
    .unwrap();
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    let err = factorize(&a, &sym, &control).unwrap_err();
    assert_eq!(err, ParuError::ZeroRow { row: 1 });
    assert_eq!(err.info(), Info::Singular);
    assert_eq!(err.info().code(), -3);
}

#[test]
fn test_structurally_singular_block() {
    // columns 0..3 live only in rows 0 and 1
    let a = CscMatrix::from_triplets(
        4,
        4,
        &[
            (0, 0, 2.0),
            (1, 0, 1.0),
            (0, 1, 1.0),
            (1, 1, 3.0),
            (0, 2, 3.0),
            (1, 2, 1.0),
            (2, 3, 4.0),
            (3, 3, 5.0),
        ],
    )
    .unwrap();
    let control = Control {
        singletons: false,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    let err = factorize(&a, &sym, &control).unwrap_err();
    assert_eq!(err.info(), Info::Singular);
    assert!(matches!(err, ParuError::Singular { .. }));
}

#[test]
fn test_arrow_matches_dense_reference() {
    let n = 8;
    let a = arrow(n);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    // every row and column holds two or more entries
    assert_eq!(sym.n1, 0);
    assert_eq!(sym.nf, 1);
    assert_eq!(sym.npiv(0), n);

    let num = factorize(&a, &sym, &control).unwrap();
    let b = random_rhs(n, 7);
    let x = solve(&sym, &num, &b, &control).unwrap();

    let mut dense = DenseSolver::new(n);
    let mut xd = b.clone();
    dense.factor(&a).unwrap();
    dense.solve(&mut xd).unwrap();
    for (u, v) in x.iter().zip(&xd) {
        assert!((u - v).abs() < 1e-12 * (1.0 + v.abs()), "{} vs {}", u, v);
    }
    check_residual(&a, &x, &b, 1e-12);
}

// ============================================================================
// Random matrices
// ============================================================================

#[test]
fn test_random_dominant_residual() {
    init_logger();
    for (seed, n) in [(1u64, 40usize), (2, 150), (3, 300)] {
        let a = random_dominant(n, 4, seed);
        let control = Control::default();
        let sym = analyze(&a, &control).unwrap();
        let num = factorize(&a, &sym, &control).unwrap();
        let b = random_rhs(n, seed + 100);
        let x = solve(&sym, &num, &b, &control).unwrap();

        let r = residual(&a, &x, &b).unwrap();
        assert!(r.resid < 1e-12, "seed {}: resid {:.2e}", seed, r.resid);
        assert!(num.rcond > 0.0);
    }
}

#[test]
fn test_refactorize_with_new_values() {
    let a = random_dominant(80, 3, 11);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    let mut a2 = a.clone();
    for v in a2.values_mut() {
        *v *= 3.0;
    }
    let num = factorize(&a2, &sym, &control).unwrap();
    let b = random_rhs(80, 12);
    let x = solve(&sym, &num, &b, &control).unwrap();
    check_residual(&a2, &x, &b, 1e-10);
}

#[test]
fn test_small_panels_and_tiny_kernels() {
    let a = random_dominant(120, 5, 21);
    let control = Control {
        panel_width: 1,
        trivial: 1,
        relaxed_amalgamation_threshold: 8,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    let num = factorize(&a, &sym, &control).unwrap();
    let b = random_rhs(120, 22);
    let x = solve(&sym, &num, &b, &control).unwrap();
    check_residual(&a, &x, &b, 1e-10);
}

#[test]
fn test_one_vs_many_threads_agree() {
    let n = 300;
    let a = random_dominant(n, 4, 5);
    let b = random_rhs(n, 6);
    let solve_with = |threads: usize| {
        let control = Control {
            paru_max_threads: threads,
            worthwhile_dgemm: 4,
            ..Control::default()
        };
        let sym = analyze(&a, &control).unwrap();
        let num = factorize(&a, &sym, &control).unwrap();
        solve(&sym, &num, &b, &control).unwrap()
    };
    let x1 = solve_with(1);
    let x4 = solve_with(4);
    for (u, v) in x1.iter().zip(&x4) {
        assert!((u - v).abs() < 1e-10 * (1.0 + u.abs()), "{} vs {}", u, v);
    }
}

#[test]
fn test_off_diagonal_pivots_across_threads_and_panels() {
    init_logger();
    for seed in [81u64, 82] {
        let n = 200;
        let a = random_permuted_dominant(n, 3, seed);
        let b = random_rhs(n, seed + 10);
        for threads in [1, 4] {
            for panel_width in [1, 32] {
                let control = Control {
                    paru_max_threads: threads,
                    panel_width,
                    worthwhile_dgemm: 4,
                    ..Control::default()
                };
                let sym = analyze(&a, &control).unwrap();
                let num = factorize(&a, &sym, &control).unwrap();
                let x = solve(&sym, &num, &b, &control).unwrap();
                let r = residual(&a, &x, &b).unwrap();
                assert!(
                    r.resid < 1e-10,
                    "seed {} threads {} panel {}: resid {:.2e}",
                    seed,
                    threads,
                    panel_width,
                    r.resid
                );
            }
        }
    }
}

#[test]
fn test_many_independent_blocks() {
    let blocks = 2000;
    let a = block_diagonal(blocks);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    assert_eq!(sym.n1, 0);
    assert!(sym.nf >= blocks);
    assert!(sym.ntasks >= blocks);

    let num = factorize(&a, &sym, &control).unwrap();
    let b = random_rhs(2 * blocks, 91);
    let x = solve(&sym, &num, &b, &control).unwrap();
    check_residual(&a, &x, &b, 1e-12);
}

#[test]
fn test_singular_subtree_cancels_parallel_siblings() {
    init_logger();
    // rows/cols 0..8: dense and dominant; rows/cols 8..12: columns
    // 8..11 reach only rows 8 and 9
    let mut t = Vec::new();
    for j in 0..8 {
        for i in 0..8 {
            let v = if i == j { 20.0 } else { 1.0 / (1 + i + j) as f64 };
            t.push((i, j, v));
        }
    }
    for j in 8..11 {
        t.push((8, j, 1.0 + j as f64));
        t.push((9, j, 2.0 - j as f64));
    }
    for i in 8..12 {
        t.push((i, 11, 3.0 + i as f64));
    }
    let a = CscMatrix::from_triplets(12, 12, &t).unwrap();
    let control = Control {
        singletons: false,
        paru_max_threads: 4,
        worthwhile_dgemm: 1,
        worthwhile_trsm: 1,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    let roots = sym.task_parent.iter().filter(|&&p| p == EMPTY).count();
    assert!(roots >= 2, "expected independent root tasks, got {}", roots);

    for _ in 0..8 {
        let err = factorize(&a, &sym, &control).unwrap_err();
        assert_eq!(err.info(), Info::Singular);
    }
    let mut solver = ParuSolver::new(control);
    assert!(solver.factor(&a).is_err());
    assert!(solver.numeric().is_none());
}

// ============================================================================
// Solve variants
// ============================================================================

#[test]
fn test_multiple_rhs_match_single_solves() {
    let n = 100;
    let nrhs = 3;
    let a = random_dominant(n, 4, 31);
    let control = Control {
        paru_max_threads: 4,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    let num = factorize(&a, &sym, &control).unwrap();

    let b: Vec<f64> = (0..nrhs).flat_map(|c| random_rhs(n, 40 + c as u64)).collect();
    let x = solve_matrix(&sym, &num, &b, nrhs, &control).unwrap();
    for c in 0..nrhs {
        let xc = solve(&sym, &num, &b[c * n..(c + 1) * n], &control).unwrap();
        for (u, v) in x[c * n..(c + 1) * n].iter().zip(&xc) {
            assert!((u - v).abs() < 1e-12 * (1.0 + v.abs()));
        }
    }
}

#[test]
fn test_matrix_solve_in_place() {
    let n = 70;
    let nrhs = 4;
    let a = random_dominant(n, 4, 33);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    let num = factorize(&a, &sym, &control).unwrap();

    let b: Vec<f64> = (0..nrhs).flat_map(|c| random_rhs(n, 60 + c as u64)).collect();
    let expected = solve_matrix(&sym, &num, &b, nrhs, &control).unwrap();
    let mut x = b.clone();
    solve_matrix_in_place(&sym, &num, &mut x, nrhs, &control).unwrap();
    assert_eq!(x, expected);

    // a block of the wrong shape is rejected and left untouched
    let mut short = b[..n * nrhs - 1].to_vec();
    let before = short.clone();
    assert!(solve_matrix_in_place(&sym, &num, &mut short, nrhs, &control).is_err());
    assert_eq!(short, before);
}

#[test]
fn test_lsolve_then_usolve_compose_to_solve() {
    let n = 90;
    let a = random_dominant(n, 4, 51);
    let control = Control {
        paru_max_threads: 1,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    let num = factorize(&a, &sym, &control).unwrap();
    let b = random_rhs(n, 52);

    let mut t = perm(&num.pfin, Some(&num.rs), &b).unwrap();
    lsolve(&sym, &num, &mut t, &control).unwrap();
    usolve(&sym, &num, &mut t, &control).unwrap();
    let x = inv_perm(&num.qfin, None, &t).unwrap();

    let expected = solve(&sym, &num, &b, &control).unwrap();
    for (u, v) in x.iter().zip(&expected) {
        assert!((u - v).abs() < 1e-12 * (1.0 + v.abs()));
    }
}

#[test]
fn test_factors_from_another_analysis_are_rejected() {
    let a = random_dominant(20, 3, 61);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    let other = analyze(&a, &control).unwrap();
    let num = factorize(&a, &sym, &control).unwrap();
    assert!(!num.pairs_with(&other));

    let err = solve(&other, &num, &[1.0; 20], &control).unwrap_err();
    assert_eq!(err.info(), Info::Invalid);
}

#[test]
fn test_changed_pattern_is_rejected() {
    let a = random_dominant(20, 3, 71);
    let control = Control::default();
    let sym = analyze(&a, &control).unwrap();
    let err = factorize(&CscMatrix::identity(20), &sym, &control).unwrap_err();
    assert_eq!(err.info(), Info::Invalid);
}
