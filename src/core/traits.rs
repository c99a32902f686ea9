//! Core linear-algebra traits for amgsa.

/// Shape query for matrices.
pub trait MatShape {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
}

/// Random access to the stored entries of one row.
pub trait RowAccess<T> {
    /// Column indices and values of row `i`, in storage order.
    fn row(&self, i: usize) -> (&[usize], &[T]);
}
