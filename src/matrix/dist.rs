//! Row-partitioned distributed CSR matrix.
//!
//! Each process owns a contiguous block of rows `[start_row, end_row)` and a
//! contiguous block of columns `[start_col, end_col)`. Local rows are stored
//! with *global* column indices. The product and transpose below gather the
//! other operand's rows through [`Comm::all_gather_varcount_f64`] and hand the
//! arithmetic to faer's sparse kernels on the owned block.

use crate::config::JacobiScaling;
use crate::core::traits::RowAccess;
use crate::error::SaError;
use crate::matrix::sparse::{CsrMatrix, SparseMatrix};
use crate::parallel::{map_rows, Comm};
use crate::utils::partition::gen_partition;

#[derive(Debug, Clone, PartialEq)]
pub struct DistCsrMatrix {
    rank: usize,
    row_starts: Vec<usize>,
    col_starts: Vec<usize>,
    local: CsrMatrix<f64>,
}

/// Every process' rows, concatenated in global row order.
struct GatheredRows {
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
}

impl DistCsrMatrix {
    /// Wrap this process' rows. `local` must use global column indices and
    /// have as many columns as the global column count. Collective.
    pub fn from_local<C: Comm + ?Sized>(
        comm: &C,
        local_ncols: usize,
        local: CsrMatrix<f64>,
    ) -> Result<Self, SaError> {
        let row_starts = gen_partition(comm, local.nrows());
        let col_starts = gen_partition(comm, local_ncols);
        let global_ncols = *col_starts.last().unwrap_or(&0);
        if local.ncols() != global_ncols {
            return Err(SaError::DimensionMismatch {
                context: "DistCsrMatrix::from_local columns",
                expected: global_ncols,
                found: local.ncols(),
            });
        }
        Ok(Self { rank: comm.rank(), row_starts, col_starts, local })
    }

    /// Take this process' slice of a matrix every process holds in full.
    /// Collective.
    pub fn from_global<C: Comm + ?Sized>(
        comm: &C,
        global: &CsrMatrix<f64>,
        local_nrows: usize,
        local_ncols: usize,
    ) -> Result<Self, SaError> {
        let row_starts = gen_partition(comm, local_nrows);
        let rank = comm.rank();
        let global_nrows = *row_starts.last().unwrap_or(&0);
        if global_nrows != global.nrows() {
            return Err(SaError::DimensionMismatch {
                context: "DistCsrMatrix::from_global rows",
                expected: global.nrows(),
                found: global_nrows,
            });
        }
        let rows = (row_starts[rank]..row_starts[rank + 1])
            .map(|g| {
                let (cols, vals) = global.row(g);
                (cols.to_vec(), vals.to_vec())
            })
            .collect();
        Self::from_local(comm, local_ncols, CsrMatrix::from_rows(global.ncols(), rows))
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn row_starts(&self) -> &[usize] {
        &self.row_starts
    }

    pub fn col_starts(&self) -> &[usize] {
        &self.col_starts
    }

    pub fn start_row(&self) -> usize {
        self.row_starts[self.rank]
    }

    /// One past the last owned row.
    pub fn end_row(&self) -> usize {
        self.row_starts[self.rank + 1]
    }

    pub fn local_nrows(&self) -> usize {
        self.end_row() - self.start_row()
    }

    pub fn global_nrows(&self) -> usize {
        *self.row_starts.last().unwrap_or(&0)
    }

    pub fn start_col(&self) -> usize {
        self.col_starts[self.rank]
    }

    pub fn end_col(&self) -> usize {
        self.col_starts[self.rank + 1]
    }

    pub fn local_ncols(&self) -> usize {
        self.end_col() - self.start_col()
    }

    pub fn global_ncols(&self) -> usize {
        *self.col_starts.last().unwrap_or(&0)
    }

    /// Locally owned rows with global column indices.
    pub fn local(&self) -> &CsrMatrix<f64> {
        &self.local
    }

    /// Row `global_row` if this process owns it.
    pub fn get_row(&self, global_row: usize) -> Option<(&[usize], &[f64])> {
        if global_row < self.start_row() || global_row >= self.end_row() {
            return None;
        }
        Some(self.local.row(global_row - self.start_row()))
    }

    /// Entries whose column lies in the owned column range, re-indexed
    /// locally. Storage order within each row is preserved.
    pub fn diag_block(&self) -> CsrMatrix<f64> {
        let (c0, c1) = (self.start_col(), self.end_col());
        let rows: Vec<(Vec<usize>, Vec<f64>)> = (0..self.local_nrows())
            .map(|i| {
                let (cols, vals) = self.local.row(i);
                cols.iter()
                    .zip(vals)
                    .filter(|&(&j, _)| j >= c0 && j < c1)
                    .map(|(&j, &v)| (j - c0, v))
                    .unzip()
            })
            .collect();
        CsrMatrix::from_rows(self.local_ncols(), rows)
    }

    /// Diagonal entries of the owned rows, zero when not stored.
    pub fn diagonal(&self) -> Vec<f64> {
        let start = self.start_row();
        (0..self.local_nrows())
            .map(|i| {
                let (cols, vals) = self.local.row(i);
                cols.iter()
                    .position(|&j| j == start + i)
                    .map(|k| vals[k])
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// y = A x for the owned slices of `x` (column partition) and `y` (row
    /// partition). Collective.
    pub fn matvec<C: Comm + ?Sized>(&self, comm: &C, x: &[f64]) -> Result<Vec<f64>, SaError> {
        if x.len() != self.local_ncols() {
            return Err(SaError::DimensionMismatch {
                context: "DistCsrMatrix::matvec input",
                expected: self.local_ncols(),
                found: x.len(),
            });
        }
        let x_full = comm.all_gather_varcount_f64(x);
        let mut y = vec![0.0; self.local_nrows()];
        self.local.spmv(&x_full, &mut y);
        Ok(y)
    }

    fn gather_rows<C: Comm + ?Sized>(&self, comm: &C) -> GatheredRows {
        let lens: Vec<usize> = (0..self.local_nrows()).map(|i| self.local.row_len(i)).collect();
        let lens = comm.all_gather_varcount_usize(&lens);
        let cols = comm.all_gather_varcount_usize(self.local.col_idx());
        let vals = comm.all_gather_varcount_f64(self.local.values());
        let mut row_ptr = Vec::with_capacity(lens.len() + 1);
        row_ptr.push(0);
        for len in lens {
            let last = *row_ptr.last().unwrap_or(&0);
            row_ptr.push(last + len);
        }
        GatheredRows { row_ptr, cols, vals }
    }

    /// Sparse product `self · other`. Collective.
    ///
    /// The result has this matrix' row partition and `other`'s column
    /// partition; each row is sorted by column.
    pub fn matmul<C: Comm + ?Sized>(&self, comm: &C, other: &DistCsrMatrix) -> Result<DistCsrMatrix, SaError> {
        if self.global_ncols() != other.global_nrows() {
            return Err(SaError::DimensionMismatch {
                context: "DistCsrMatrix::matmul inner dimension",
                expected: self.global_ncols(),
                found: other.global_nrows(),
            });
        }
        let b = other.gather_global(comm);
        Ok(DistCsrMatrix {
            rank: self.rank,
            row_starts: self.row_starts.clone(),
            col_starts: other.col_starts.clone(),
            local: self.local.matmul(&b)?,
        })
    }

    /// Distributed transpose: the result's rows follow this matrix' column
    /// partition. Collective.
    pub fn transpose<C: Comm + ?Sized>(&self, comm: &C) -> Result<DistCsrMatrix, SaError> {
        let t = self.gather_global(comm).transpose()?;
        let rows = (self.start_col()..self.end_col())
            .map(|g| {
                let (cols, vals) = t.row(g);
                (cols.to_vec(), vals.to_vec())
            })
            .collect();
        Ok(DistCsrMatrix {
            rank: self.rank,
            row_starts: self.col_starts.clone(),
            col_starts: self.row_starts.clone(),
            local: CsrMatrix::from_rows(self.global_nrows(), rows),
        })
    }

    /// Damped Jacobi operator `I − α A` (or `I − α D⁻¹ A`).
    ///
    /// Requires a square matrix with matching row and column partitions.
    /// Rows with a zero diagonal are left as identity rows under diagonal
    /// scaling.
    pub fn form_jacobi(&self, alpha: f64, scaling: JacobiScaling) -> Result<DistCsrMatrix, SaError> {
        if self.row_starts != self.col_starts {
            return Err(SaError::DimensionMismatch {
                context: "DistCsrMatrix::form_jacobi square partition",
                expected: self.global_nrows(),
                found: self.global_ncols(),
            });
        }
        let start = self.start_row();
        let diag = self.diagonal();
        let rows: Vec<(Vec<usize>, Vec<f64>)> = map_rows(self.local_nrows(), |i| {
            let scale = match scaling {
                JacobiScaling::None => alpha,
                JacobiScaling::Diagonal if diag[i] != 0.0 => alpha / diag[i],
                JacobiScaling::Diagonal => 0.0,
            };
            let (cols, vals) = self.local.row(i);
            let mut out_cols = Vec::with_capacity(cols.len() + 1);
            let mut out_vals = Vec::with_capacity(cols.len() + 1);
            let mut has_diag = false;
            for (&j, &v) in cols.iter().zip(vals) {
                out_cols.push(j);
                if j == start + i && !has_diag {
                    has_diag = true;
                    out_vals.push(1.0 - scale * v);
                } else {
                    out_vals.push(-scale * v);
                }
            }
            if !has_diag {
                out_cols.push(start + i);
                out_vals.push(1.0);
            }
            (out_cols, out_vals)
        });
        Ok(DistCsrMatrix {
            rank: self.rank,
            row_starts: self.row_starts.clone(),
            col_starts: self.col_starts.clone(),
            local: CsrMatrix::from_rows(self.global_ncols(), rows),
        })
    }

    /// Every row on every process, as one global CSR. Collective.
    pub fn gather_global<C: Comm + ?Sized>(&self, comm: &C) -> CsrMatrix<f64> {
        let all = self.gather_rows(comm);
        CsrMatrix::from_csr(self.global_nrows(), self.global_ncols(), all.row_ptr, all.cols, all.vals)
    }
}
