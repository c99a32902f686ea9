//! Per-aggregate QR of the near-null-space basis.
//!
//! For aggregate `a` with members `m_0 < m_1 < … < m_{s-1}`, the rows
//! `B[m_k, :]` form an `s × d` block `B_a = Q_a R_a`. The rows of `Q_a` become
//! the tentative prolongator entries of the members and `R_a` becomes rows
//! `[a·d, (a+1)·d)` of the coarse null space, so that `P_tent · B_c = B`.

use faer::linalg::solvers::Qr;
use faer::Mat;

use crate::coarsen::aggregate::Aggregation;
use crate::error::SaError;
use crate::matrix::DenseMatrix;

/// Relative size of an `R` diagonal entry below which the aggregate block is
/// treated as rank deficient.
pub const RANK_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct NullSpaceFit {
    /// `nrows × d`: row `i` holds the tentative prolongator values of local
    /// row `i` within its aggregate's column block.
    pub q: Mat<f64>,
    /// `(naggr · d) × d` coarse null space.
    pub coarse: Mat<f64>,
    /// Aggregates whose block was numerically rank deficient.
    pub rank_deficient: Vec<usize>,
}

/// Default basis for `nrows` equations with `block_size` equations per
/// node: row `r` has a one in column `r mod block_size`.
pub fn default_nullspace(nrows: usize, nullspace_dim: usize, block_size: usize) -> Mat<f64> {
    let block = block_size.max(1);
    Mat::from_fn(nrows, nullspace_dim, |r, j| if r % block == j { 1.0 } else { 0.0 })
}

/// Orthonormalize the null space aggregate by aggregate.
///
/// Without a supplied basis the default one of [`default_nullspace`] is used.
/// An aggregate with fewer rows than `nullspace_dim` is a configuration error.
/// Rank-deficient blocks are only reported: the factors are used as they are.
pub fn fit_nullspace(
    aggregation: &Aggregation,
    nullspace: Option<&Mat<f64>>,
    nullspace_dim: usize,
    block_size: usize,
) -> Result<NullSpaceFit, SaError> {
    let n = aggregation.len();
    let d = nullspace_dim;
    let default;
    let b = match nullspace {
        Some(b) => {
            if b.nrows() != n {
                return Err(SaError::DimensionMismatch {
                    context: "fit_nullspace rows",
                    expected: n,
                    found: b.nrows(),
                });
            }
            if b.ncols() != d {
                return Err(SaError::DimensionMismatch {
                    context: "fit_nullspace columns",
                    expected: d,
                    found: b.ncols(),
                });
            }
            b
        }
        None => {
            default = default_nullspace(n, d, block_size);
            &default
        }
    };

    let naggr = aggregation.naggr();
    let mut q = Mat::<f64>::zeros(n, d);
    let mut coarse = Mat::<f64>::zeros(naggr * d, d);
    let mut rank_deficient = Vec::new();

    for (a, members) in aggregation.members().iter().enumerate() {
        let s = members.len();
        if s < d {
            return Err(SaError::UnderdeterminedAggregate { aggregate: a, size: s, nullspace_dim: d });
        }
        let mut raw = Vec::with_capacity(s * d);
        for j in 0..d {
            raw.extend(members.iter().map(|&r| b[(r, j)]));
        }
        let block: Mat<f64> = DenseMatrix::from_raw(s, d, raw);

        let qr = Qr::new(block.as_ref());
        let qa = qr.compute_thin_Q();
        let ra = qr.thin_R();

        let rdiag: Vec<f64> = (0..d).map(|k| ra[(k, k)].abs()).collect();
        let rmax = rdiag.iter().copied().fold(0.0, f64::max);
        let rank = rdiag.iter().filter(|&&x| x > 0.0 && x >= RANK_TOLERANCE * rmax).count();
        if rank < d {
            log::warn!(
                "aggregate {}: QR of the {} x {} null-space block has rank {}; continuing\n{:?}",
                a,
                s,
                d,
                rank,
                block
            );
            rank_deficient.push(a);
        }

        for j in 0..d {
            for k in 0..d {
                coarse[(a * d + j, k)] = ra[(j, k)];
            }
        }
        for (local, &r) in members.iter().enumerate() {
            for j in 0..d {
                q[(r, j)] = qa[(local, j)];
            }
        }
    }

    Ok(NullSpaceFit { q, coarse, rank_deficient })
}
