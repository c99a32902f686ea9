//! Dense‐matrix API on top of Faer.
//!
//! Per-aggregate null-space blocks are packed column-major (one column per
//! null-space vector) before factorization; this module provides the
//! `DenseMatrix` trait that turns such raw storage into a `faer::Mat<T>`.

use crate::core::traits::MatShape;
use faer::Mat;

/// Blanket impl so any Faer Mat<T> is a DenseMatrix.
pub trait DenseMatrix<T>: MatShape {
    /// Construct from raw column-major storage.
    fn from_raw(nrows: usize, ncols: usize, data: Vec<T>) -> Self;
}

impl<T: Copy + num_traits::Float> DenseMatrix<T> for Mat<T> {
    fn from_raw(nrows: usize, ncols: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i])
    }
}

impl<T: Copy + num_traits::Float> MatShape for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
    fn ncols(&self) -> usize {
        self.ncols()
    }
}
