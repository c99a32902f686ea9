// SparseMatrix trait and the faer-backed CSR storage used for graphs and matrix row blocks

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[T], y: &mut [T]);
}

use std::fmt;

use faer::sparse::{
    SparseRowMat,            // owning numeric CSR alias
    SparseRowMatRef,
    SymbolicSparseRowMat,    // owning symbolic CSR alias
    Triplet,
};

use crate::core::traits::{MatShape, RowAccess};
use crate::error::SaError;

/// Compressed sparse row storage on top of `faer::sparse::SparseRowMat`.
///
/// Column indices of a row keep the order in which they were inserted; the
/// aggregation phases walk neighbors in exactly this order. Storage is always
/// compact: row `i` occupies `row_ptr[i]..row_ptr[i + 1]`.
#[derive(Clone)]
pub struct CsrMatrix<T> {
    inner: SparseRowMat<usize, T>,
}

impl CsrMatrix<f64> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    ///
    /// # Panics
    /// Panics if the arrays do not describe a valid `nrows × ncols` pattern.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        // unsorted: rows keep their insertion order; `None` means “no separate row_nnz”
        let symbolic = SymbolicSparseRowMat::new_unsorted_checked(nrows, ncols, row_ptr, None, col_idx);
        Self { inner: SparseRowMat::new(symbolic, values) }
    }

    /// Build from one `(columns, values)` pair per row.
    pub fn from_rows(ncols: usize, rows: Vec<(Vec<usize>, Vec<f64>)>) -> Self {
        let nrows = rows.len();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        row_ptr.push(0);
        let nnz = rows.iter().map(|(c, _)| c.len()).sum();
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        for (cols, vals) in rows {
            assert_eq!(cols.len(), vals.len());
            col_idx.extend(cols);
            values.extend(vals);
            row_ptr.push(col_idx.len());
        }
        Self::from_csr(nrows, ncols, row_ptr, col_idx, values)
    }

    /// Build from `(row, col, value)` triplets. Duplicates are summed and
    /// each row is sorted by column.
    ///
    /// # Panics
    /// Panics if a triplet lies outside `nrows × ncols`.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let triplets: Vec<Triplet<usize, usize, f64>> =
            triplets.iter().map(|&(i, j, v)| Triplet::new(i, j, v)).collect();
        match SparseRowMat::try_new_from_triplets(nrows, ncols, &triplets) {
            Ok(inner) => Self::from_faer(inner),
            Err(e) => panic!("invalid triplets for a {} x {} matrix: {:?}", nrows, ncols, e),
        }
    }

    /// Take ownership of a faer matrix, compacting it if rows carry slack.
    fn from_faer(inner: SparseRowMat<usize, f64>) -> Self {
        let m = inner.as_ref();
        if m.symbolic().row_nnz().is_none() {
            return Self { inner };
        }
        let rows = (0..m.nrows())
            .map(|i| {
                let range = m.row_range(i);
                (m.symbolic().col_idx()[range.clone()].to_vec(), m.val()[range].to_vec())
            })
            .collect();
        Self::from_rows(m.ncols(), rows)
    }

    /// Borrowed faer view.
    pub fn as_faer(&self) -> SparseRowMatRef<'_, usize, f64> {
        self.inner.as_ref()
    }

    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    pub fn nnz(&self) -> usize {
        self.col_idx().len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        self.inner.as_ref().symbolic().row_ptr()
    }

    pub fn col_idx(&self) -> &[usize] {
        self.inner.as_ref().symbolic().col_idx()
    }

    pub fn values(&self) -> &[f64] {
        self.inner.as_ref().val()
    }

    pub fn row_len(&self, i: usize) -> usize {
        let ptr = self.row_ptr();
        ptr[i + 1] - ptr[i]
    }

    /// Value of the first stored `(i, i)` entry of each row, zero when absent.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.nrows())
            .map(|i| {
                let (cols, vals) = self.row(i);
                cols.iter().position(|&j| j == i).map(|k| vals[k]).unwrap_or(0.0)
            })
            .collect()
    }

    /// Collapse `block × block` sub-blocks into single entries holding their
    /// Frobenius norm. Row and column counts must be multiples of `block`.
    pub fn compress_blocks(&self, block: usize) -> Self {
        assert!(block > 0);
        assert_eq!(self.nrows() % block, 0, "row count is not a multiple of the block size");
        assert_eq!(self.ncols() % block, 0, "column count is not a multiple of the block size");
        if block == 1 {
            return self.clone();
        }
        let nodes = self.nrows() / block;
        let rows = crate::parallel::map_rows(nodes, |node| {
            let mut cols: Vec<usize> = Vec::new();
            let mut sums: Vec<f64> = Vec::new();
            for i in node * block..(node + 1) * block {
                let (rc, rv) = self.row(i);
                for (&j, &v) in rc.iter().zip(rv) {
                    let jn = j / block;
                    match cols.iter().position(|&c| c == jn) {
                        Some(k) => sums[k] += v * v,
                        None => {
                            cols.push(jn);
                            sums.push(v * v);
                        }
                    }
                }
            }
            let vals = sums.into_iter().map(f64::sqrt).collect();
            (cols, vals)
        });
        Self::from_rows(self.ncols() / block, rows)
    }

    /// Transpose through faer's CSC view. Rows of the result are sorted.
    pub fn transpose(&self) -> Result<Self, SaError> {
        let t = self
            .inner
            .as_ref()
            .transpose()
            .to_row_major()
            .map_err(|e| SaError::Sparse(format!("transpose: {:?}", e)))?;
        Ok(Self::from_faer(t))
    }

    /// Sparse product `self · rhs` with faer's sparse-sparse kernel.
    pub fn matmul(&self, rhs: &CsrMatrix<f64>) -> Result<Self, SaError> {
        if self.ncols() != rhs.nrows() {
            return Err(SaError::DimensionMismatch {
                context: "CsrMatrix::matmul inner dimension",
                expected: self.ncols(),
                found: rhs.nrows(),
            });
        }
        let (lhs, rhs) = (self.sorted(), rhs.sorted());
        Ok(Self::from_faer(lhs.as_faer() * rhs.as_faer()))
    }

    /// Copy with every row sorted by column; `self` when already sorted.
    fn sorted(&self) -> std::borrow::Cow<'_, Self> {
        let sorted = (0..self.nrows()).all(|i| self.row(i).0.windows(2).all(|w| w[0] < w[1]));
        if sorted {
            return std::borrow::Cow::Borrowed(self);
        }
        let rows = (0..self.nrows())
            .map(|i| {
                let (cols, vals) = self.row(i);
                let mut entries: Vec<(usize, f64)> = cols.iter().copied().zip(vals.iter().copied()).collect();
                entries.sort_by_key(|&(j, _)| j);
                let mut merged: (Vec<usize>, Vec<f64>) = (Vec::new(), Vec::new());
                for (j, v) in entries {
                    if merged.0.last() == Some(&j) {
                        if let Some(last) = merged.1.last_mut() {
                            *last += v;
                        }
                    } else {
                        merged.0.push(j);
                        merged.1.push(v);
                    }
                }
                merged
            })
            .collect();
        std::borrow::Cow::Owned(Self::from_rows(self.ncols(), rows))
    }

    /// Dense copy, mostly for diagnostics and tests.
    pub fn to_dense(&self) -> faer::Mat<f64> {
        let mut dense = faer::Mat::<f64>::zeros(self.nrows(), self.ncols());
        for i in 0..self.nrows() {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                dense[(i, j)] += v;
            }
        }
        dense
    }
}

impl RowAccess<f64> for CsrMatrix<f64> {
    fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let m = self.inner.as_ref();
        let range = m.row_range(i);
        (&m.symbolic().col_idx()[range.clone()], &m.val()[range])
    }
}

impl MatShape for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }
    fn ncols(&self) -> usize {
        self.inner.ncols()
    }
}

impl PartialEq for CsrMatrix<f64> {
    fn eq(&self, other: &Self) -> bool {
        self.nrows() == other.nrows()
            && self.ncols() == other.ncols()
            && self.row_ptr() == other.row_ptr()
            && self.col_idx() == other.col_idx()
            && self.values() == other.values()
    }
}

impl fmt::Debug for CsrMatrix<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrMatrix")
            .field("nrows", &self.nrows())
            .field("ncols", &self.ncols())
            .field("row_ptr", &self.row_ptr())
            .field("col_idx", &self.col_idx())
            .field("values", &self.values())
            .finish()
    }
}

impl SparseMatrix<f64> for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }
    fn ncols(&self) -> usize {
        self.inner.ncols()
    }
    fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.inner.ncols());
        assert_eq!(y.len(), self.inner.nrows());
        for (i, yi) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum();
        }
    }
}
