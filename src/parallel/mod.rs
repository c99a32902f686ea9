//! Process-level communication used by the coarsening engine.
//!
//! Every collective the engine needs goes through the [`Comm`] trait: prefix sums
//! for row/column partitions, the too-small reductions, and the all-gathers that
//! back the distributed mat-vec and sparse product. `SerialComm` is always
//! available; `RayonComm` and `MpiComm` are feature gated.

/// Collective operations over a group of processes.
pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Sum of `x` over all processes.
    fn all_reduce(&self, x: f64) -> f64;
    /// One value per process, in rank order.
    fn all_gather_usize(&self, x: usize) -> Vec<usize>;
    /// Concatenation of every process' slice, in rank order.
    fn all_gather_varcount_usize(&self, local: &[usize]) -> Vec<usize>;
    /// Concatenation of every process' slice, in rank order.
    fn all_gather_varcount_f64(&self, local: &[f64]) -> Vec<f64>;

    fn all_reduce_usize(&self, x: usize) -> usize {
        self.all_gather_usize(x).iter().sum()
    }
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce(local)
    }
    fn norm2(&self, a: &[f64]) -> f64 {
        self.dot(a, a).sqrt()
    }
}

/// A single process with no threading.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 { x }
    fn all_gather_usize(&self, x: usize) -> Vec<usize> { vec![x] }
    fn all_gather_varcount_usize(&self, local: &[usize]) -> Vec<usize> { local.to_vec() }
    fn all_gather_varcount_f64(&self, local: &[f64]) -> Vec<f64> { local.to_vec() }
}

#[cfg(feature="mpi")]
pub mod mpi_comm;
#[cfg(feature="mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature="rayon")]
pub mod rayon_comm;
#[cfg(feature="rayon")]
pub use rayon_comm::RayonComm;

pub enum UniverseComm {
    #[cfg(feature="mpi")]
    Mpi(MpiComm),
    #[cfg(feature="rayon")]
    Rayon(RayonComm),
    Serial(SerialComm),
}

macro_rules! dispatch {
    ($self:ident, $comm:ident => $body:expr) => {
        match $self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi($comm) => $body,
            #[cfg(feature="rayon")]
            UniverseComm::Rayon($comm) => $body,
            UniverseComm::Serial($comm) => $body,
        }
    };
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        dispatch!(self, comm => comm.rank())
    }
    fn size(&self) -> usize {
        dispatch!(self, comm => comm.size())
    }
    fn barrier(&self) {
        dispatch!(self, comm => comm.barrier())
    }
    fn all_reduce(&self, x: f64) -> f64 {
        dispatch!(self, comm => comm.all_reduce(x))
    }
    fn all_gather_usize(&self, x: usize) -> Vec<usize> {
        dispatch!(self, comm => comm.all_gather_usize(x))
    }
    fn all_gather_varcount_usize(&self, local: &[usize]) -> Vec<usize> {
        dispatch!(self, comm => comm.all_gather_varcount_usize(local))
    }
    fn all_gather_varcount_f64(&self, local: &[f64]) -> Vec<f64> {
        dispatch!(self, comm => comm.all_gather_varcount_f64(local))
    }
}

/// Evaluate `f` for every row index in `0..n`, collecting results in row order.
///
/// Runs on the rayon pool when the `rayon` feature is enabled.
pub(crate) fn map_rows<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Send + Sync,
{
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        (0..n).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..n).map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_collectives_are_identity() {
        let comm = SerialComm;
        assert_eq!(comm.all_reduce(2.5), 2.5);
        assert_eq!(comm.all_reduce_usize(7), 7);
        assert_eq!(comm.all_gather_usize(3), vec![3]);
        assert_eq!(comm.all_gather_varcount_f64(&[1.0, 2.0]), vec![1.0, 2.0]);
        assert_eq!(comm.dot(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
    }

    #[test]
    fn universe_dispatches_to_the_backend() {
        let comm = UniverseComm::Serial(SerialComm);
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        assert_eq!(comm.all_reduce(-1.5), -1.5);
        assert_eq!(comm.all_gather_varcount_usize(&[4, 5]), vec![4, 5]);
    }

    #[test]
    fn map_rows_keeps_order() {
        let squares = map_rows(6, |i| i * i);
        assert_eq!(squares, vec![0, 1, 4, 9, 16, 25]);
    }
}
