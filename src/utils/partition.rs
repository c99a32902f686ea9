//! Contiguous block partitions of rows and columns across processes.

use crate::parallel::Comm;

/// Prefix-sum partition of `local_n` items per process.
///
/// Returns `size + 1` offsets; process `p` owns `[offsets[p], offsets[p + 1])`.
/// Collective.
pub fn gen_partition<C: Comm + ?Sized>(comm: &C, local_n: usize) -> Vec<usize> {
    let counts = comm.all_gather_usize(local_n);
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    offsets.push(0);
    for c in counts {
        let last = *offsets.last().unwrap_or(&0);
        offsets.push(last + c);
    }
    offsets
}
