//! amgsa: smoothed-aggregation AMG coarsening over Faer
//!
//! This crate builds the transfer operators of a smoothed-aggregation
//! algebraic multigrid hierarchy for row-distributed sparse matrices: a
//! strength-of-connection graph, greedy local aggregation, per-aggregate QR of
//! the near-null-space basis and the (optionally Jacobi-smoothed) prolongator.

pub mod parallel;

pub mod coarsen;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod matrix;
pub mod utils;

// Re-exports for convenience
pub use coarsen::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use matrix::*;
pub use parallel::{Comm, SerialComm, UniverseComm};
pub use utils::*;

#[cfg(feature = "rayon")]
pub use parallel::RayonComm;
#[cfg(feature = "mpi")]
pub use parallel::MpiComm;
