//! Error type shared by every fallible operation in amgsa.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaError {
    #[error("aggregate {aggregate} has {size} rows, fewer than the null space dimension {nullspace_dim}")]
    UnderdeterminedAggregate {
        aggregate: usize,
        size: usize,
        nullspace_dim: usize,
    },
    #[error("dimension mismatch in {context}: expected {expected}, got {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },
    #[error("eigenvalue estimate failed: {0}")]
    Eigenvalue(String),
    #[error("communication error: {0}")]
    Comm(String),
    #[error("sparse kernel failed: {0}")]
    Sparse(String),
}
