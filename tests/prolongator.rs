//! End-to-end prolongator generation, serial and on several ranks.

mod common;

use amgsa::{
    Aggregation, Comm, CsrMatrix, DistCsrMatrix, LevelOutcome, LevelState, Prolongation, SaError,
    SaMethod, SaOptions, SerialComm,
};
use approx::assert_relative_eq;
use common::{
    assert_dense_close, block_expand, distribute, init_logging, laplace_1d, laplace_2d, local_range,
    run_ranks,
};
use faer::Mat;

fn coarsened(out: LevelOutcome) -> Prolongation {
    match out {
        LevelOutcome::Coarsened(p) => p,
        LevelOutcome::TooSmall => panic!("expected a prolongator"),
    }
}

fn serial(global: &amgsa::CsrMatrix<f64>) -> DistCsrMatrix {
    distribute(&SerialComm, global)
}

#[test]
fn distributed_prolongator_matches_serial() {
    init_logging();
    let global = laplace_1d(36);
    let sa = SaMethod::new(SaOptions::default()).unwrap();

    let mut state = LevelState::finest(1);
    let reference = coarsened(sa.gen_prolongator(&serial(&global), &mut state, &SerialComm).unwrap());
    let reference = reference.p.local().to_dense();

    // 12 rows per rank aggregate exactly like the serial chain, so the
    // coarse column numbering agrees as well
    let gathered = run_ranks(3, |comm| {
        let a = distribute(comm, &global);
        let mut state = LevelState::finest(1);
        let p = coarsened(sa.gen_prolongator(&a, &mut state, comm).unwrap());
        assert_eq!(state.level, 1);
        p.p.gather_global(comm).to_dense()
    });
    for p in &gathered {
        assert_dense_close(p, &reference, 1e-10);
    }
}

#[test]
fn tentative_prolongator_reproduces_the_null_space() {
    let n = 30;
    let b = Mat::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { i as f64 / n as f64 });
    let opts = SaOptions { nullspace_dim: 2, p_weight: 0.0, ..Default::default() };
    let sa = SaMethod::new(opts).unwrap();
    let mut state = LevelState::finest(1).with_nullspace(b.clone());

    let p = coarsened(sa.gen_prolongator(&serial(&laplace_1d(n)), &mut state, &SerialComm).unwrap());
    assert!(p.rank_deficient.is_empty());
    assert_eq!(state.node_dofs, 2);
    let coarse = state.nullspace.as_ref().unwrap();
    assert_eq!(coarse.nrows(), p.aggregation.naggr() * 2);

    let pd = p.p.local().to_dense();
    let rebuilt = &pd * coarse;
    assert_dense_close(&rebuilt, &b, 1e-12);

    // columns of the tentative prolongator are orthonormal
    let gram = pd.transpose() * pd.as_ref();
    let eye = Mat::<f64>::identity(pd.ncols(), pd.ncols());
    assert_dense_close(&gram, &eye, 1e-12);
}

#[test]
fn node_blocks_stay_together() {
    let nodes = 15;
    let a = block_expand(&laplace_1d(nodes), 2);
    let opts = SaOptions {
        node_dofs: 2,
        nullspace_dim: 2,
        p_weight: 0.0,
        min_coarse_size: 2,
        ..Default::default()
    };
    let sa = SaMethod::new(opts).unwrap();
    let mut state = LevelState::finest(2);

    let p = coarsened(sa.gen_prolongator(&serial(&a), &mut state, &SerialComm).unwrap());
    let node2aggr = p.aggregation.node2aggr();
    for i in 0..nodes {
        assert_eq!(node2aggr[2 * i], node2aggr[2 * i + 1]);
    }
    let local = p.p.local();
    for r in 0..2 * nodes {
        let range = local.row_ptr()[r]..local.row_ptr()[r + 1];
        assert!(range.len() <= 2);
        let block = 2 * node2aggr[r];
        assert!(local.col_idx()[range].iter().all(|&c| c == block || c == block + 1));
    }
}

#[test]
fn initial_aggregation_skips_the_graph() {
    let init = Aggregation::new((0..20).map(|i| i / 5).collect(), 4).unwrap();
    let opts = SaOptions { min_coarse_size: 2, ..Default::default() };
    let sa = SaMethod::new(opts).unwrap();
    let mut state = LevelState::finest(1);

    let out = sa.gen_prolongator_with(&serial(&laplace_1d(20)), &mut state, &SerialComm, Some(&init));
    let p = coarsened(out.unwrap());
    assert!(p.stats.is_none());
    assert_eq!(p.aggregation, init);
    assert!(p.spectral_radius > 3.0 && p.spectral_radius <= 4.0 + 1e-10);
    assert_eq!(p.p.global_ncols(), 4);
}

#[test]
fn hierarchy_coarse_operators_are_symmetric() {
    init_logging();
    let sa = SaMethod::new(SaOptions { output_level: 2, ..Default::default() }).unwrap();
    let h = sa.build_hierarchy(&serial(&laplace_2d(20)), LevelState::finest(1), &SerialComm).unwrap();

    assert!(h.failure.is_none());
    assert!(h.num_levels() >= 2);
    assert!(h.levels.last().unwrap().p.is_none());
    for pair in h.levels.windows(2) {
        let (fine, coarse) = (&pair[0], &pair[1]);
        assert!(coarse.a.global_nrows() < fine.a.global_nrows());
        assert_eq!(fine.p.as_ref().map(|p| p.global_ncols()), Some(coarse.a.global_nrows()));
        assert!(fine.spectral_radius > 0.0);
    }
    for level in &h.levels[1..] {
        let a = level.a.local().to_dense();
        for i in 0..a.nrows() {
            for j in 0..i {
                assert_relative_eq!(a[(i, j)], a[(j, i)], epsilon = 1e-10, max_relative = 1e-10);
            }
        }
    }
}

#[test]
fn ranks_agree_on_when_to_stop() {
    let global = laplace_2d(12);
    let sa = SaMethod::new(SaOptions::default()).unwrap();
    let shapes = run_ranks(2, |comm| {
        let a = distribute(comm, &global);
        let h = sa.build_hierarchy(&a, LevelState::finest(1), comm).unwrap();
        assert!(h.failure.is_none());
        h.levels.iter().map(|l| l.a.global_nrows()).collect::<Vec<_>>()
    });
    assert_eq!(shapes[0], shapes[1]);
    assert!(shapes[0].len() >= 2);
    assert_eq!(shapes[0][0], 144);
}

/// 1-D Laplacian with row `cut` decoupled from its neighbors.
fn laplace_1d_cut(n: usize, cut: usize) -> CsrMatrix<f64> {
    let mut t = Vec::new();
    for i in 0..n {
        t.push((i, i, 2.0));
        if i + 1 < n && i != cut && i + 1 != cut {
            t.push((i, i + 1, -1.0));
            t.push((i + 1, i, -1.0));
        }
    }
    CsrMatrix::from_triplets(n, n, &t)
}

fn linear_nullspace(rows: std::ops::Range<usize>, n: usize) -> Mat<f64> {
    let start = rows.start;
    Mat::from_fn(rows.len(), 2, |i, j| if j == 0 { 1.0 } else { (start + i) as f64 / n as f64 })
}

#[test]
fn decoupled_row_joins_a_neighboring_aggregate() {
    let n = 30;
    let b = linear_nullspace(0..n, n);
    let opts = SaOptions { nullspace_dim: 2, p_weight: 0.0, ..Default::default() };
    let sa = SaMethod::new(opts).unwrap();
    let mut state = LevelState::finest(1).with_nullspace(b.clone());

    let p = coarsened(sa.gen_prolongator(&serial(&laplace_1d_cut(n, 15)), &mut state, &SerialComm).unwrap());
    let node2aggr = p.aggregation.node2aggr();
    assert_eq!(node2aggr[15], node2aggr[14]);
    assert!(p.aggregation.sizes().iter().all(|&s| s >= 3));
    assert!(p.rank_deficient.is_empty());

    let rebuilt = p.p.local().to_dense() * state.nullspace.as_ref().unwrap();
    assert_dense_close(&rebuilt, &b, 1e-12);
}

#[test]
fn failure_on_one_rank_fails_every_rank() {
    let n = 40;
    let global = laplace_1d(n);
    let opts = SaOptions { nullspace_dim: 2, min_coarse_size: 2, ..Default::default() };
    let sa = SaMethod::new(opts).unwrap();
    let outcomes = run_ranks(2, |comm| {
        let a = distribute(comm, &global);
        let rows = local_range(n, 2, comm.rank());
        // rank 1 starts with a single-row aggregate, too small for two vectors
        let node2aggr: Vec<usize> = match comm.rank() {
            0 => (0..rows.len()).map(|i| i / 5).collect(),
            _ => (0..rows.len()).map(|i| if i == 0 { 0 } else { 1 + (i - 1) / 5 }).collect(),
        };
        let naggr = node2aggr.iter().max().map_or(0, |&m| m + 1);
        let init = Aggregation::new(node2aggr, naggr).unwrap();
        let mut state = LevelState::finest(1).with_nullspace(linear_nullspace(rows, n));
        let out = sa.gen_prolongator_with(&a, &mut state, comm, Some(&init));
        assert_eq!(state.level, 0);
        match out {
            Err(SaError::UnderdeterminedAggregate { aggregate, size, .. }) => format!("short {} {}", aggregate, size),
            Err(SaError::Comm(_)) => "remote".to_string(),
            Err(e) => format!("unexpected error: {}", e),
            Ok(_) => "ok".to_string(),
        }
    });
    assert_eq!(outcomes, vec!["remote".to_string(), "short 0 1".to_string()]);
}

#[test]
fn hierarchy_stops_on_every_rank_after_a_local_error() {
    let global = laplace_2d(12);
    let sa = SaMethod::new(SaOptions::default()).unwrap();
    let results = run_ranks(2, |comm| {
        let a = distribute(comm, &global);
        // one label too few on rank 1
        let labels = vec![0; a.local_nrows() - comm.rank()];
        let h = sa.build_hierarchy(&a, LevelState::finest(1).with_labels(labels), comm).unwrap();
        let comm_error = matches!(h.failure, Some(SaError::Comm(_)));
        (h.num_levels(), h.failure.is_some(), comm_error)
    });
    assert_eq!(results, vec![(1, true, true), (1, true, false)]);
}
