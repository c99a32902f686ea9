//! Strength-of-connection graph over the locally owned rows.
//!
//! The graph has the same local row range as the matrix block it is built
//! from and keeps only the off-diagonal entries that pass the strength test.
//! Rows with different labels are never connected.

use crate::core::traits::RowAccess;
use crate::matrix::CsrMatrix;
use crate::parallel::map_rows;

/// Strength-of-connection test, chosen once per graph build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strength {
    /// Every nonzero off-diagonal entry is an edge, weighted by its value.
    Unweighted,
    /// Edge `(i, j)` iff `|a_ii a_jj| >= ε² a_ij²`, weighted by `|a_ii a_jj| / a_ij²`.
    Threshold { epsilon: f64 },
}

impl Strength {
    /// Strength test for `level`: the threshold halves with every level.
    pub fn for_level(threshold: f64, level: usize) -> Self {
        let epsilon = threshold * 0.5f64.powi(level as i32);
        if epsilon > 0.0 {
            Strength::Threshold { epsilon }
        } else {
            Strength::Unweighted
        }
    }

    /// Threshold in effect, zero for the unweighted test.
    pub fn epsilon(&self) -> f64 {
        match *self {
            Strength::Unweighted => 0.0,
            Strength::Threshold { epsilon } => epsilon,
        }
    }

    /// Edge weight of an off-diagonal entry `val` between rows with
    /// diagonals `di` and `dj`, or `None` if the entry is weak.
    #[inline]
    fn edge(&self, di: f64, dj: f64, val: f64) -> Option<f64> {
        match *self {
            Strength::Unweighted => (val != 0.0).then_some(val),
            Strength::Threshold { epsilon } => {
                let v2 = val * val;
                if v2 <= 0.0 {
                    return None;
                }
                let dd = (di * dj).abs();
                (dd >= epsilon * epsilon * v2).then(|| dd / v2)
            }
        }
    }
}

/// Build the aggregation graph of a square local block.
///
/// `block` holds the locally owned rows with local column indices (see
/// [`DistCsrMatrix::diag_block`](crate::matrix::DistCsrMatrix::diag_block)).
/// Surviving entries keep their column-storage order, which fixes the
/// neighbor order seen by the aggregation phases.
///
/// # Panics
/// Panics if `labels` is given with a length other than `block.nrows()`.
pub fn build_graph(block: &CsrMatrix<f64>, strength: Strength, labels: Option<&[usize]>) -> CsrMatrix<f64> {
    let n = block.nrows();
    if let Some(labels) = labels {
        assert_eq!(labels.len(), n, "one label per local row");
    }
    let label = |i: usize| labels.map_or(0, |l| l[i]);
    let diag = match strength {
        Strength::Unweighted => Vec::new(),
        Strength::Threshold { .. } => block.diagonal(),
    };
    let d = |i: usize| diag.get(i).copied().unwrap_or(0.0);

    let rows: Vec<(Vec<usize>, Vec<f64>)> = map_rows(n, |i| {
        let (cols, vals) = block.row(i);
        let li = label(i);
        cols.iter()
            .zip(vals)
            .filter(|&(&j, _)| j != i && j < n && label(j) == li)
            .filter_map(|(&j, &v)| strength.edge(d(i), d(j), v).map(|w| (j, w)))
            .unzip()
    });
    let graph = CsrMatrix::from_rows(n, rows);
    log::debug!(
        "strength graph: {} rows, {} edges, epsilon = {:.2e}",
        n,
        graph.nnz(),
        strength.epsilon()
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> CsrMatrix<f64> {
        // strong coupling 0-1, weak coupling 1-2
        CsrMatrix::from_triplets(
            3,
            3,
            &[
                (0, 0, 4.0), (0, 1, -2.0),
                (1, 0, -2.0), (1, 1, 4.0), (1, 2, -0.01),
                (2, 1, -0.01), (2, 2, 4.0),
            ],
        )
    }

    #[test]
    fn threshold_halves_per_level() {
        assert_eq!(Strength::for_level(0.08, 0), Strength::Threshold { epsilon: 0.08 });
        assert_eq!(Strength::for_level(0.08, 2), Strength::Threshold { epsilon: 0.02 });
        assert_eq!(Strength::for_level(0.0, 3), Strength::Unweighted);
    }

    #[test]
    fn unweighted_keeps_nonzero_off_diagonals() {
        let g = build_graph(&block(), Strength::Unweighted, None);
        assert_eq!(g.row(0), (&[1usize][..], &[-2.0][..]));
        assert_eq!(g.row(1).0, &[0, 2]);
        assert_eq!(g.row(1).1, &[-2.0, -0.01]);
        assert_eq!(g.nnz(), 4);
    }

    #[test]
    fn threshold_drops_weak_entries() {
        // 16 >= 0.25 * 4 and 16 >= 0.25 * 1e-4
        let g = build_graph(&block(), Strength::Threshold { epsilon: 0.5 }, None);
        assert_eq!(g.row(0).0, &[1]);
        assert!((g.row(0).1[0] - 4.0).abs() < 1e-12);
        assert_eq!(g.row(1).0, &[0, 2]);

        // eps large enough to reject the 0-1 coupling: 16 < 9 * 4
        let g = build_graph(&block(), Strength::Threshold { epsilon: 3.0 }, None);
        assert_eq!(g.row(0).0.len(), 0);
        assert_eq!(g.row(1).0, &[2]);
    }

    #[test]
    fn missing_diagonal_rejects_every_edge() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0), (1, 1, 2.0)]);
        let g = build_graph(&m, Strength::Threshold { epsilon: 0.1 }, None);
        assert_eq!(g.nnz(), 0);
        let g = build_graph(&m, Strength::Unweighted, None);
        assert_eq!(g.nnz(), 2);
    }

    #[test]
    fn labels_split_the_graph() {
        let labels = [0, 0, 1];
        let g = build_graph(&block(), Strength::Unweighted, Some(&labels));
        assert_eq!(g.row(1).0, &[0]);
        assert_eq!(g.row(2).0.len(), 0);
    }

    #[test]
    fn build_is_idempotent() {
        let s = Strength::for_level(0.08, 1);
        let a = build_graph(&block(), s, Some(&[3, 3, 3]));
        let b = build_graph(&block(), s, Some(&[3, 3, 3]));
        assert_eq!(a, b);
    }
}
