//! Matrix module: dense helpers, local CSR storage and the row-partitioned distributed matrix.

pub mod dense;
pub use dense::DenseMatrix;
pub mod sparse;
pub use sparse::{CsrMatrix, SparseMatrix};
pub mod dist;
pub use dist::DistCsrMatrix;
