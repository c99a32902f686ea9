//! Shared helpers for the integration tests: model matrices and an in-process
//! multi-rank communicator built on threads.

#![allow(dead_code)]

use std::sync::{Arc, Barrier, Mutex};

use amgsa::{Comm, CsrMatrix, DistCsrMatrix};

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// 1-D Poisson matrix `tridiag(-1, 2, -1)`.
pub fn laplace_1d(n: usize) -> CsrMatrix<f64> {
    let mut t = Vec::new();
    for i in 0..n {
        if i > 0 {
            t.push((i, i - 1, -1.0));
        }
        t.push((i, i, 2.0));
        if i + 1 < n {
            t.push((i, i + 1, -1.0));
        }
    }
    CsrMatrix::from_triplets(n, n, &t)
}

/// 5-point 2-D Poisson matrix on an `nx × nx` grid.
pub fn laplace_2d(nx: usize) -> CsrMatrix<f64> {
    let n = nx * nx;
    let mut t = Vec::new();
    for y in 0..nx {
        for x in 0..nx {
            let i = y * nx + x;
            t.push((i, i, 4.0));
            if x > 0 {
                t.push((i, i - 1, -1.0));
            }
            if x + 1 < nx {
                t.push((i, i + 1, -1.0));
            }
            if y > 0 {
                t.push((i, i - nx, -1.0));
            }
            if y + 1 < nx {
                t.push((i, i + nx, -1.0));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, &t)
}

/// `A ⊗ I_b`: every scalar entry becomes a `b × b` diagonal block.
pub fn block_expand(a: &CsrMatrix<f64>, b: usize) -> CsrMatrix<f64> {
    use amgsa::core::traits::RowAccess;
    let mut t = Vec::new();
    for i in 0..a.nrows() {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            for k in 0..b {
                t.push((i * b + k, j * b + k, v));
            }
        }
    }
    CsrMatrix::from_triplets(a.nrows() * b, a.ncols() * b, &t)
}

/// Rows owned by `rank` when `n` rows are split as evenly as possible.
pub fn local_range(n: usize, size: usize, rank: usize) -> std::ops::Range<usize> {
    let base = n / size;
    let extra = n % size;
    let start = rank * base + rank.min(extra);
    let len = base + usize::from(rank < extra);
    start..start + len
}

/// This rank's slice of a square matrix every rank holds in full.
pub fn distribute<C: Comm + ?Sized>(comm: &C, global: &CsrMatrix<f64>) -> DistCsrMatrix {
    let range = local_range(global.nrows(), comm.size(), comm.rank());
    DistCsrMatrix::from_global(comm, global, range.len(), range.len()).unwrap()
}

struct Shared {
    barrier: Barrier,
    f64_slots: Mutex<Vec<Vec<f64>>>,
    usize_slots: Mutex<Vec<Vec<usize>>>,
}

/// One rank of a group of threads that exchange data through shared slots.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    fn exchange_f64(&self, local: &[f64]) -> Vec<Vec<f64>> {
        self.shared.f64_slots.lock().unwrap()[self.rank] = local.to_vec();
        self.shared.barrier.wait();
        let all = self.shared.f64_slots.lock().unwrap().clone();
        // nobody may overwrite a slot before everyone has read it
        self.shared.barrier.wait();
        all
    }

    fn exchange_usize(&self, local: &[usize]) -> Vec<Vec<usize>> {
        self.shared.usize_slots.lock().unwrap()[self.rank] = local.to_vec();
        self.shared.barrier.wait();
        let all = self.shared.usize_slots.lock().unwrap().clone();
        self.shared.barrier.wait();
        all
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {
        self.shared.barrier.wait();
    }
    fn all_reduce(&self, x: f64) -> f64 {
        self.exchange_f64(&[x]).iter().map(|v| v[0]).sum()
    }
    fn all_gather_usize(&self, x: usize) -> Vec<usize> {
        self.exchange_usize(&[x]).into_iter().map(|v| v[0]).collect()
    }
    fn all_gather_varcount_usize(&self, local: &[usize]) -> Vec<usize> {
        self.exchange_usize(local).concat()
    }
    fn all_gather_varcount_f64(&self, local: &[f64]) -> Vec<f64> {
        self.exchange_f64(local).concat()
    }
}

/// Run `f` on `size` ranks, one thread each, and collect the results in
/// rank order.
pub fn run_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&ThreadComm) -> R + Sync,
{
    let shared = Arc::new(Shared {
        barrier: Barrier::new(size),
        f64_slots: Mutex::new(vec![Vec::new(); size]),
        usize_slots: Mutex::new(vec![Vec::new(); size]),
    });
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..size)
            .map(|rank| {
                let comm = ThreadComm { rank, size, shared: Arc::clone(&shared) };
                let f = &f;
                s.spawn(move || f(&comm))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

pub fn assert_dense_close(a: &faer::Mat<f64>, b: &faer::Mat<f64>, tol: f64) {
    assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()));
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            approx::assert_abs_diff_eq!(a[(i, j)], b[(i, j)], epsilon = tol);
        }
    }
}
