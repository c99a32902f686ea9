//! MPI-based parallel communication module.
//!
//! This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
//! backend for distributed-memory parallelism. Each process owns a contiguous block of matrix rows;
//! the collectives below are what the coarsening engine needs to agree on row/column partitions,
//! to decide collectively whether a level is too small, and to move matrix rows for the
//! distributed sparse product.
//!
//! # Usage
//!
//! - `MpiComm::new()` initializes MPI and keeps the universe alive for the lifetime of the value.
//! - The `Comm` trait is implemented for `MpiComm`, allowing it to be used as a drop-in replacement
//!   for the serial or rayon backends.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! #[cfg(feature = "mpi")]
//! {
//!     use amgsa::parallel::{Comm, MpiComm};
//!     let comm = MpiComm::new().unwrap();
//!     println!("Rank: {} / {}", comm.rank(), comm.size());
//!     comm.barrier();
//! }
//! ```

use mpi::collective::SystemOperation;
use mpi::datatype::PartitionMut;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

use super::Comm;
use crate::error::SaError;

/// MPI communicator wrapper for distributed parallelism.
///
/// Holds the MPI world communicator, the rank of the current process, and the total number of processes.
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
    // MPI is finalized when the universe is dropped.
    _universe: Universe,
}

impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// Fails if MPI has already been initialized in this process.
    pub fn new() -> Result<Self, SaError> {
        let universe = mpi::initialize()
            .ok_or_else(|| SaError::Comm("MPI already initialized".to_string()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { world, rank, size, _universe: universe })
    }

    fn counts_and_displs(&self, len: usize) -> (Vec<Count>, Vec<Count>, usize) {
        let counts: Vec<Count> = self
            .all_gather_usize(len)
            .into_iter()
            .map(|c| c as Count)
            .collect();
        let displs: Vec<Count> = counts
            .iter()
            .scan(0, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect();
        let total = counts.iter().map(|&c| c as usize).sum();
        (counts, displs, total)
    }
}

impl Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize { self.rank }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize { self.size }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) { self.world.barrier(); }

    /// Performs an all-reduce sum operation across all processes.
    fn all_reduce(&self, x: f64) -> f64 {
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }

    /// Gathers one count from every process onto every process.
    fn all_gather_usize(&self, x: usize) -> Vec<usize> {
        let mut buf = vec![0u64; self.size];
        self.world.all_gather_into(&(x as u64), &mut buf[..]);
        buf.into_iter().map(|v| v as usize).collect()
    }

    /// Gathers variable-length index slices from every process onto every process.
    fn all_gather_varcount_usize(&self, local: &[usize]) -> Vec<usize> {
        let (counts, displs, total) = self.counts_and_displs(local.len());
        let send: Vec<u64> = local.iter().map(|&v| v as u64).collect();
        let mut buf = vec![0u64; total];
        {
            let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(&send[..], &mut partition);
        }
        buf.into_iter().map(|v| v as usize).collect()
    }

    /// Gathers variable-length value slices from every process onto every process.
    fn all_gather_varcount_f64(&self, local: &[f64]) -> Vec<f64> {
        let (counts, displs, total) = self.counts_and_displs(local.len());
        let mut buf = vec![0.0f64; total];
        {
            let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        buf
    }
}
