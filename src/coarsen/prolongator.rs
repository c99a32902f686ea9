//! Tentative and smoothed prolongators.

use faer::Mat;

use crate::coarsen::aggregate::Aggregation;
use crate::config::JacobiScaling;
use crate::error::SaError;
use crate::matrix::{CsrMatrix, DistCsrMatrix};
use crate::parallel::Comm;
use crate::utils::partition::gen_partition;

/// Piecewise prolongator `P_tent` from an aggregation and the orthonormal
/// factors `q` (`nrows × d`) of [`fit_nullspace`](super::nullspace::fit_nullspace).
///
/// This process owns `naggr · d` consecutive coarse columns starting at the
/// prefix sum over lower ranks. Row `r` has entries `q[(r, j)]` in columns
/// `start + aggr(r)·d + j`; exact zeros are not stored. Collective.
pub fn assemble_tentative<C: Comm + ?Sized>(
    comm: &C,
    aggregation: &Aggregation,
    q: &Mat<f64>,
) -> Result<DistCsrMatrix, SaError> {
    if q.nrows() != aggregation.len() {
        return Err(SaError::DimensionMismatch {
            context: "assemble_tentative rows",
            expected: aggregation.len(),
            found: q.nrows(),
        });
    }
    let d = q.ncols();
    let local_ncols = aggregation.naggr() * d;
    let col_starts = gen_partition(comm, local_ncols);
    let start = col_starts[comm.rank()];
    let global_ncols = *col_starts.last().unwrap_or(&0);

    let rows: Vec<(Vec<usize>, Vec<f64>)> = aggregation
        .node2aggr()
        .iter()
        .enumerate()
        .map(|(r, &a)| {
            (0..d)
                .filter(|&j| q[(r, j)] != 0.0)
                .map(|j| (start + a * d + j, q[(r, j)]))
                .unzip()
        })
        .collect();
    DistCsrMatrix::from_local(comm, local_ncols, CsrMatrix::from_rows(global_ncols, rows))
}

/// `P = (I − α A) P_tent`, or `(I − α D⁻¹ A) P_tent` under diagonal scaling.
/// Collective.
pub fn smooth_prolongator<C: Comm + ?Sized>(
    comm: &C,
    a: &DistCsrMatrix,
    p_tent: &DistCsrMatrix,
    alpha: f64,
    scaling: JacobiScaling,
) -> Result<DistCsrMatrix, SaError> {
    let jacobi = a.form_jacobi(alpha, scaling)?;
    jacobi.matmul(comm, p_tent)
}
