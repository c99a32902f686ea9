//! Extreme eigenvalue estimates from a short Lanczos run.
//!
//! The smoothed-aggregation damping weight is `p_weight / λ_max`, so only a
//! rough upper estimate of the spectrum is needed. A few Lanczos steps build a
//! symmetric tridiagonal matrix `T`; its extreme eigenvalues (Ritz values)
//! come from faer's dense self-adjoint eigensolver on `T`.
//!
//! # References
//! - Saad, Y. (2011). Numerical Methods for Large Eigenvalue Problems, 2nd Edition. SIAM. §6.6
//! - Golub & Van Loan (2013). Matrix Computations, 4th Edition. §8.4.1

use crate::config::JacobiScaling;
use crate::error::SaError;
use crate::matrix::DistCsrMatrix;
use crate::parallel::Comm;
use faer::Mat;

/// Largest and smallest Ritz values `[max, min]` of `A` (or of
/// `D^{-1/2} A D^{-1/2}` under diagonal scaling) after at most `steps`
/// Lanczos iterations. Collective.
///
/// The start vector depends only on global row indices, so every process
/// count yields the same estimate.
pub fn extreme_ritz_values<C: Comm + ?Sized>(
    a: &DistCsrMatrix,
    comm: &C,
    scaling: JacobiScaling,
    steps: usize,
) -> Result<[f64; 2], SaError> {
    if a.row_starts() != a.col_starts() {
        return Err(SaError::DimensionMismatch {
            context: "extreme_ritz_values square partition",
            expected: a.global_nrows(),
            found: a.global_ncols(),
        });
    }
    let n = a.local_nrows();
    let global_n = a.global_nrows();
    if global_n == 0 {
        return Ok([0.0, 0.0]);
    }
    let steps = steps.clamp(1, global_n);

    // D^{-1/2}, with zero-diagonal rows dropped from the operator
    let scale: Vec<f64> = match scaling {
        JacobiScaling::None => vec![1.0; n],
        JacobiScaling::Diagonal => a
            .diagonal()
            .into_iter()
            .map(|d| if d != 0.0 { 1.0 / d.abs().sqrt() } else { 0.0 })
            .collect(),
    };
    let apply = |x: &[f64]| -> Result<Vec<f64>, SaError> {
        let xs: Vec<f64> = x.iter().zip(&scale).map(|(&v, &s)| v * s).collect();
        let mut y = a.matvec(comm, &xs)?;
        for (yi, &s) in y.iter_mut().zip(&scale) {
            *yi *= s;
        }
        Ok(y)
    };

    let start = a.start_row();
    let mut v: Vec<f64> = (0..n)
        .map(|i| 1.5 + (0.7 * (start + i + 1) as f64).sin())
        .collect();
    let norm = comm.norm2(&v);
    v.iter_mut().for_each(|x| *x /= norm);

    let mut v_prev = vec![0.0; n];
    let mut alphas = Vec::with_capacity(steps);
    let mut betas: Vec<f64> = Vec::with_capacity(steps);
    let mut beta = 0.0;
    for _ in 0..steps {
        let mut w = apply(&v)?;
        let alpha = comm.dot(&v, &w);
        for i in 0..n {
            w[i] -= alpha * v[i] + beta * v_prev[i];
        }
        alphas.push(alpha);
        beta = comm.norm2(&w);
        if beta <= 1e-12 * alpha.abs().max(1.0) {
            // invariant subspace found; T is exact
            break;
        }
        betas.push(beta);
        for x in w.iter_mut() {
            *x /= beta;
        }
        v_prev = std::mem::replace(&mut v, w);
    }
    betas.truncate(alphas.len().saturating_sub(1));
    log::debug!("lanczos: {} steps on {} rows", alphas.len(), global_n);

    let k = alphas.len();
    let t = Mat::<f64>::from_fn(k, k, |i, j| match i.abs_diff(j) {
        0 => alphas[i],
        1 => betas[i.min(j)],
        _ => 0.0,
    });
    let eig = t
        .self_adjoint_eigen(faer::Side::Lower)
        .map_err(|e| SaError::Eigenvalue(format!("tridiagonal Ritz problem of size {}: {:?}", k, e)))?;
    let ritz = eig.S();
    let (min, max) = ritz
        .column_vector()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    Ok([max, min])
}
