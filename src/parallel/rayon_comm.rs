// rayon-based shared-memory communication: one process, row loops on the global pool

pub struct RayonComm;

impl RayonComm {
    pub fn new() -> Self {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build_global()
            .ok();
        RayonComm
    }

    /// Number of worker threads available to row-parallel loops.
    pub fn num_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}

impl Default for RayonComm {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Comm for RayonComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) { rayon::scope(|_| {}); }
    fn all_reduce(&self, x: f64) -> f64 {
        x // single address space
    }
    fn all_gather_usize(&self, x: usize) -> Vec<usize> { vec![x] }
    fn all_gather_varcount_usize(&self, local: &[usize]) -> Vec<usize> { local.to_vec() }
    fn all_gather_varcount_f64(&self, local: &[f64]) -> Vec<f64> { local.to_vec() }
}
