//! Tests for the symbolic analysis, options and the solver front end

use paru_core::solver::{create_solver, SolverType};
use paru_core::{
    analyze, inv_perm_matrix, perm_matrix, Control, CscMatrix, Info, LinearSolver, OptionValue,
    OrderingMethod, ParuSolver, Strategy, EMPTY,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_pattern(n: usize, per_col: usize, seed: u64) -> CscMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t: Vec<(usize, usize, f64)> = (0..n).map(|k| (k, k, 10.0)).collect();
    for j in 0..n {
        for _ in 0..per_col {
            t.push((rng.gen_range(0..n), j, rng.gen_range(-1.0..1.0)));
        }
    }
    CscMatrix::from_triplets(n, n, &t).unwrap()
}

// ============================================================================
// Frontal tree structure
// ============================================================================

#[test]
fn test_tree_is_well_formed() {
    for seed in 0..4u64 {
        let a = random_pattern(200, 3, seed);
        let sym = analyze(&a, &Control::default()).unwrap();
        let nf = sym.nf;

        assert_eq!(sym.rs1 + sym.cs1, sym.n1);
        assert_eq!(sym.ms, sym.ns);
        assert_eq!(sym.n1 + sym.ns, sym.n);
        assert_eq!(sym.parent.len(), nf + 1);
        assert_eq!(sym.parent[nf], EMPTY);
        for f in 0..nf {
            assert!(sym.parent[f] > f && sym.parent[f] <= nf, "front {} parent {}", f, sym.parent[f]);
            assert!(sym.npiv(f) > 0);
            assert!(sym.first[f] <= f);
        }
        assert_eq!(sym.super_cols[0], 0);
        assert_eq!(*sym.super_cols.last().unwrap(), sym.ns);
    }
}

#[test]
fn test_chains_are_monotone() {
    let a = random_pattern(250, 2, 9);
    let sym = analyze(&a, &Control::default()).unwrap();
    assert_eq!(sym.chain_start[0], 0);
    assert!(sym.chain_start.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*sym.chain_start.last().unwrap(), sym.nf);

    // inside a chain every front is the only child of the next one
    for k in 0..sym.nchains() {
        for f in sym.chain_start[k]..sym.chain_start[k + 1] - 1 {
            assert_eq!(sym.parent[f], f + 1);
            assert_eq!(sym.children_of(f + 1), &[f]);
        }
        let rows = (sym.chain_start[k]..sym.chain_start[k + 1]).map(|f| sym.fm[f]).max();
        assert_eq!(rows, Some(sym.chain_maxrows[k]));
    }
}

#[test]
fn test_tasks_cover_fronts_in_order() {
    let a = random_pattern(300, 3, 4);
    let control = Control {
        paru_max_threads: 4,
        worthwhile_dgemm: 2,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    assert_eq!(sym.task_map.len(), sym.ntasks + 1);
    assert_eq!(sym.task_map[0], 0);
    assert_eq!(sym.task_map[sym.ntasks], sym.nf);
    assert!(sym.task_map.windows(2).all(|w| w[0] < w[1]));
    for t in 0..sym.ntasks {
        let p = sym.task_parent[t];
        if p != EMPTY {
            assert!(p > t);
            assert!(sym.task_depth[p] > sym.task_depth[t]);
        }
    }
    let children: usize = sym.task_num_child.iter().sum();
    let roots = sym.task_parent.iter().filter(|&&p| p == EMPTY).count();
    assert_eq!(children + roots, sym.ntasks);
}

#[test]
fn test_task_depth_counts_levels_below() {
    let a = random_pattern(300, 3, 4);
    let control = Control {
        paru_max_threads: 4,
        worthwhile_dgemm: 2,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    for t in 0..sym.ntasks {
        let kids: Vec<usize> = (0..sym.ntasks).filter(|&c| sym.task_parent[c] == t).collect();
        assert_eq!(kids.len(), sym.task_num_child[t]);
        let expected = kids.iter().map(|&c| sym.task_depth[c] + 1).max().unwrap_or(0);
        assert_eq!(sym.task_depth[t], expected, "task {}", t);
    }
}

#[test]
fn test_rows_are_assigned_to_their_leftmost_column() {
    let a = random_pattern(120, 3, 17);
    let sym = analyze(&a, &Control::default()).unwrap();
    for f in 0..sym.nf {
        let cols = sym.super_cols[f]..sym.super_cols[f + 1];
        for r in sym.rows_of(f) {
            assert!(cols.contains(&sym.sj[sym.sp[r]]));
        }
    }
    // every S row hangs below the front holding its leftmost column
    for r in 0..sym.ms {
        let node = sym.aparent[sym.row2atree[r]];
        assert!(node >= sym.ms && node <= sym.ms + sym.nf);
    }
}

#[test]
fn test_natural_ordering_keeps_tridiagonal_a_chain() {
    let n = 30;
    let mut t = Vec::new();
    for k in 0..n {
        t.push((k, k, 4.0));
        if k + 1 < n {
            t.push((k + 1, k, -1.0));
            t.push((k, k + 1, -1.0));
        }
    }
    let a = CscMatrix::from_triplets(n, n, &t).unwrap();
    let control = Control {
        ordering: OrderingMethod::Natural,
        singletons: false,
        ..Control::default()
    };
    let sym = analyze(&a, &control).unwrap();
    assert_eq!(sym.n1, 0);
    assert_eq!(sym.strategy, Strategy::Symmetric);
    assert_eq!(sym.qfill, (0..n).collect::<Vec<_>>());
    assert_eq!(sym.nchains(), 1);
}

#[test]
fn test_rectangular_is_invalid() {
    let a = CscMatrix::from_triplets(2, 3, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
    let err = analyze(&a, &Control::default()).unwrap_err();
    assert_eq!(err.info(), Info::Invalid);
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_control_serde_round_trip() {
    let control = Control {
        panel_width: 16,
        paru_strategy: Strategy::Symmetric,
        piv_toler: 0.5,
        ..Control::default()
    };
    let json = serde_json::to_string(&control).unwrap();
    let back: Control = serde_json::from_str(&json).unwrap();
    assert_eq!(back, control);

    // missing fields take their defaults
    let partial: Control = serde_json::from_str(r#"{"scale": false, "ordering": "natural"}"#).unwrap();
    assert!(!partial.scale);
    assert_eq!(partial.ordering, OrderingMethod::Natural);
    assert_eq!(partial.panel_width, Control::default().panel_width);
}

#[test]
fn test_control_set_by_name() {
    let mut control = Control::default();
    control.set("PIV_TOLER", "0.25").unwrap();
    control.set("singletons", "off").unwrap();
    control.set("umfpack_strategy", "sym").unwrap();
    assert_eq!(control.get("piv_toler"), Some(OptionValue::Float(0.25)));
    assert!(!control.singletons);
    assert_eq!(control.umfpack_strategy, Strategy::Symmetric);

    assert!(control.set("piv_toler", "0").is_err());
    assert!(control.set("panel_width", "wide").is_err());
    assert!(control.set("no_such_option", "1").is_err());
    assert_eq!(control.piv_toler, 0.25);

    let bad = Control {
        diag_toler: 2.0,
        ..Control::default()
    };
    assert!(analyze(&CscMatrix::identity(2), &bad).is_err());
}

// ============================================================================
// Permutations and the solver front end
// ============================================================================

#[test]
fn test_perm_round_trip_on_blocks() {
    let mut rng = StdRng::seed_from_u64(3);
    let n = 25;
    let nrhs = 4;
    let mut p: Vec<usize> = (0..n).collect();
    for k in (1..n).rev() {
        p.swap(k, rng.gen_range(0..=k));
    }
    let s: Vec<f64> = (0..n).map(|k| 2f64.powi(k as i32 % 5)).collect();
    let b: Vec<f64> = (0..n * nrhs).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let x = perm_matrix(&p, Some(&s), &b, n, nrhs).unwrap();
    assert_eq!(inv_perm_matrix(&p, Some(&s), &x, n, nrhs).unwrap(), b);
    let y = perm_matrix(&p, None, &b, n, nrhs).unwrap();
    assert_eq!(inv_perm_matrix(&p, None, &y, n, nrhs).unwrap(), b);
}

#[test]
fn test_paru_solver_reuses_analysis() {
    let a = random_pattern(60, 3, 8);
    let b = vec![1.0; 60];
    let mut solver = ParuSolver::new(Control::default());
    let mut x = b.clone();
    solver.analyze(&a).unwrap();
    solver.factor(&a).unwrap();
    solver.solve(&mut x).unwrap();
    assert_eq!(solver.stats.analyze_count, 1);
    assert_eq!(solver.stats.symbolic_reuse_count, 1);

    let mut dense = create_solver(SolverType::Dense);
    let mut xd = b.clone();
    dense.factor(&a).unwrap();
    dense.solve(&mut xd).unwrap();
    for (u, v) in x.iter().zip(&xd) {
        assert!((u - v).abs() < 1e-10 * (1.0 + v.abs()));
    }

    let other = random_pattern(60, 3, 9);
    solver.factor(&other).unwrap();
    assert_eq!(solver.stats.analyze_count, 2);
    assert!(solver.rcond().is_some_and(|r| r > 0.0));
}
