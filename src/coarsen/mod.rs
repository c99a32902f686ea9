//! Smoothed-aggregation coarsening: strength graph, greedy local
//! aggregation, per-aggregate null-space QR and prolongator assembly.
//!
//! Modules:
//! - [`graph`]: strength-of-connection graph over the local rows.
//! - [`aggregate`]: five-phase greedy aggregation.
//! - [`nullspace`]: QR of the null-space restriction to each aggregate.
//! - [`prolongator`]: tentative prolongator and its Jacobi smoothing.

pub mod aggregate;
pub mod graph;
pub mod nullspace;
pub mod prolongator;

pub use aggregate::{aggregate, Aggregation, AggregationStats, PhaseCount};
pub use graph::{build_graph, Strength};
pub use nullspace::{default_nullspace, fit_nullspace, NullSpaceFit};
pub use prolongator::{assemble_tentative, smooth_prolongator};
