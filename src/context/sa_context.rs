//! Smoothed-aggregation method: per-level prolongator generation and the
//! level driver.
//!
//! `SaMethod` owns only the options. Everything that changes from one level
//! to the next (level index, equations per node, null space and labels) lives
//! in an explicit [`LevelState`] that the caller passes in and gets back
//! advanced to the next level.
//!
//! # References
//! - Vaněk, Mandel & Brezina (1996). Algebraic multigrid by smoothed
//!   aggregation for second and fourth order elliptic problems. Computing 56.

use faer::Mat;

use crate::coarsen::{
    aggregate, assemble_tentative, build_graph, fit_nullspace, smooth_prolongator, Aggregation,
    AggregationStats, Strength,
};
use crate::config::SaOptions;
use crate::error::SaError;
use crate::matrix::DistCsrMatrix;
use crate::parallel::Comm;
use crate::utils::ritz::extreme_ritz_values;

/// Per-level inputs that are replaced after every coarsening step.
#[derive(Debug, Clone)]
pub struct LevelState {
    pub level: usize,
    /// Equations per graph node on this level.
    pub node_dofs: usize,
    /// `local rows × nullspace_dim` basis; `None` selects the default basis.
    pub nullspace: Option<Mat<f64>>,
    /// One label per local row; rows with different labels never share an
    /// aggregate.
    pub labels: Option<Vec<usize>>,
}

impl LevelState {
    /// Finest level with the default null space and no labels.
    pub fn finest(node_dofs: usize) -> Self {
        Self { level: 0, node_dofs, nullspace: None, labels: None }
    }

    pub fn with_nullspace(mut self, nullspace: Mat<f64>) -> Self {
        self.nullspace = Some(nullspace);
        self
    }

    pub fn with_labels(mut self, labels: Vec<usize>) -> Self {
        self.labels = Some(labels);
        self
    }
}

/// A prolongator and what was learned while building it.
#[derive(Debug, Clone)]
pub struct Prolongation {
    pub p: DistCsrMatrix,
    /// Estimated spectral radius of `A`, `0.0` when it was not needed.
    pub spectral_radius: f64,
    /// Equation-to-aggregate assignment of the local rows.
    pub aggregation: Aggregation,
    /// Per-phase counts; `None` for a supplied initial aggregation.
    pub stats: Option<AggregationStats>,
    /// Aggregates whose null-space block was rank deficient.
    pub rank_deficient: Vec<usize>,
}

#[derive(Debug, Clone)]
pub enum LevelOutcome {
    Coarsened(Prolongation),
    /// The problem is too small to coarsen further; stop adding levels.
    TooSmall,
}

impl LevelOutcome {
    /// Spectral radius estimate, `0.0` when the level was too small.
    pub fn spectral_radius(&self) -> f64 {
        match self {
            LevelOutcome::Coarsened(p) => p.spectral_radius,
            LevelOutcome::TooSmall => 0.0,
        }
    }

    pub fn prolongator(&self) -> Option<&DistCsrMatrix> {
        match self {
            LevelOutcome::Coarsened(p) => Some(&p.p),
            LevelOutcome::TooSmall => None,
        }
    }
}

/// One level of a hierarchy: its operator and the prolongator from the next
/// coarser level (absent on the coarsest level).
#[derive(Debug, Clone)]
pub struct Level {
    pub a: DistCsrMatrix,
    pub p: Option<DistCsrMatrix>,
    pub spectral_radius: f64,
}

#[derive(Debug)]
pub struct Hierarchy {
    pub levels: Vec<Level>,
    /// Error that stopped coarsening early, if any. The levels built before
    /// it remain usable.
    pub failure: Option<SaError>,
}

impl Hierarchy {
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

/// Smoothed-aggregation prolongator generator.
#[derive(Debug, Clone)]
pub struct SaMethod {
    opts: SaOptions,
}

impl SaMethod {
    pub fn new(opts: SaOptions) -> Result<Self, SaError> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn options(&self) -> &SaOptions {
        &self.opts
    }

    /// Aggregate the local rows of `a` and build the prolongator. Collective.
    ///
    /// On success `state` describes the next coarser level.
    pub fn gen_prolongator<C: Comm + ?Sized>(
        &self,
        a: &DistCsrMatrix,
        state: &mut LevelState,
        comm: &C,
    ) -> Result<LevelOutcome, SaError> {
        self.gen_prolongator_with(a, state, comm, None)
    }

    /// Like [`gen_prolongator`](Self::gen_prolongator), but with an optional
    /// equation-level initial aggregation that replaces the graph build and
    /// aggregation phases. Collective.
    pub fn gen_prolongator_with<C: Comm + ?Sized>(
        &self,
        a: &DistCsrMatrix,
        state: &mut LevelState,
        comm: &C,
        init: Option<&Aggregation>,
    ) -> Result<LevelOutcome, SaError> {
        let opts = &self.opts;
        let nsd = opts.nullspace_dim;
        let dofs = state.node_dofs.max(1);
        let nprocs = comm.size();
        let root = comm.rank() == 0;

        if a.row_starts() != a.col_starts() {
            return Err(SaError::DimensionMismatch {
                context: "gen_prolongator square partition",
                expected: a.global_nrows(),
                found: a.global_ncols(),
            });
        }
        let global_nodes = a.global_nrows() / dofs;
        if global_nodes < opts.min_coarse_size || global_nodes <= nprocs {
            if root && opts.output_level > 0 {
                log::info!("level {}: {} nodes, too small to coarsen", state.level, global_nodes);
            }
            return Ok(LevelOutcome::TooSmall);
        }

        let local = self.local_aggregation(a, state, comm, init);
        let (aggregation, stats) = agree(comm, state.level, local)?;
        if let Some(stats) = &stats {
            if opts.output_level > 1 {
                let total = stats.reduce(comm);
                if root {
                    total.log_summary();
                }
            }
        }

        let naggr = aggregation.naggr();
        let global_coarse = comm.all_reduce_usize(naggr * nsd) / nsd;
        if global_coarse <= opts.min_coarse_size || global_coarse <= nprocs {
            if root && opts.output_level > 0 {
                log::info!(
                    "level {}: only {} coarse nodes, stopping",
                    state.level,
                    global_coarse
                );
            }
            return Ok(LevelOutcome::TooSmall);
        }

        let mut spectral_radius = 0.0;
        let mut alpha = 0.0;
        if opts.needs_spectral_radius(init.is_some()) {
            let [max, _] = extreme_ritz_values(a, comm, opts.jacobi_scaling, opts.ritz_steps)?;
            if root && opts.output_level > 1 {
                log::info!("estimated spectral radius of A = {:e}", max);
            }
            if !(max > 0.0) {
                return Err(SaError::Eigenvalue(format!(
                    "non-positive spectral radius estimate {:e} on level {}",
                    max, state.level
                )));
            }
            spectral_radius = max;
            alpha = opts.p_weight / max;
        }

        let fit = agree(comm, state.level, fit_nullspace(&aggregation, state.nullspace.as_ref(), nsd, dofs))?;

        // coarse row a·d + k inherits the label of the first member of a
        let next_labels = match &state.labels {
            Some(labels) if state.level + 1 < opts.max_levels => {
                let members = aggregation.members();
                Some((0..naggr * nsd).map(|c| labels[members[c / nsd][0]]).collect::<Vec<_>>())
            }
            _ => None,
        };
        let p_tent = assemble_tentative(comm, &aggregation, &fit.q)?;
        let p = if opts.p_weight == 0.0 {
            p_tent
        } else {
            smooth_prolongator(comm, a, &p_tent, alpha, opts.jacobi_scaling)?
        };

        if root && opts.output_level > 0 {
            log::info!(
                "level {}: {} rows -> {} coarse columns, {} nonzeros in local P",
                state.level,
                a.global_nrows(),
                p.global_ncols(),
                p.local().nnz()
            );
        }

        state.level += 1;
        state.node_dofs = nsd;
        state.nullspace = Some(fit.coarse);
        state.labels = next_labels;

        Ok(LevelOutcome::Coarsened(Prolongation {
            p,
            spectral_radius,
            aggregation,
            stats,
            rank_deficient: fit.rank_deficient,
        }))
    }

    /// This process' aggregation: the supplied one, checked against the
    /// local rows, or a fresh one from the local graph. No communication.
    fn local_aggregation<C: Comm + ?Sized>(
        &self,
        a: &DistCsrMatrix,
        state: &LevelState,
        comm: &C,
        init: Option<&Aggregation>,
    ) -> Result<(Aggregation, Option<AggregationStats>), SaError> {
        let n = a.local_nrows();
        if let Some(labels) = &state.labels {
            if labels.len() != n {
                return Err(SaError::DimensionMismatch {
                    context: "gen_prolongator labels",
                    expected: n,
                    found: labels.len(),
                });
            }
        }
        match init {
            Some(init) if init.len() != n => Err(SaError::DimensionMismatch {
                context: "gen_prolongator initial aggregation",
                expected: n,
                found: init.len(),
            }),
            Some(init) => Ok((init.clone(), None)),
            None => {
                let (aggregation, stats) = self.aggregate_level(a, state, comm)?;
                Ok((aggregation, Some(stats)))
            }
        }
    }

    /// Graph build and aggregation on the local diagonal block, compressed
    /// to nodes when a node carries several equations.
    fn aggregate_level<C: Comm + ?Sized>(
        &self,
        a: &DistCsrMatrix,
        state: &LevelState,
        comm: &C,
    ) -> Result<(Aggregation, AggregationStats), SaError> {
        let opts = &self.opts;
        let dofs = state.node_dofs.max(1);
        let n = a.local_nrows();
        if n % dofs != 0 {
            return Err(SaError::DimensionMismatch {
                context: "gen_prolongator rows per node",
                expected: n - n % dofs,
                found: n,
            });
        }

        let block = a.diag_block();
        let (block, labels) = if dofs > 1 {
            let node_labels = state
                .labels
                .as_ref()
                .map(|l| l.iter().step_by(dofs).copied().collect::<Vec<_>>());
            (block.compress_blocks(dofs), node_labels)
        } else {
            (block, state.labels.clone())
        };

        let strength = Strength::for_level(opts.threshold, state.level);
        if comm.rank() == 0 && opts.output_level > 1 {
            log::info!("aggregation: strength threshold = {:8.2e}", strength.epsilon());
        }
        let graph = build_graph(&block, strength, labels.as_deref());

        let min_size = opts.effective_min_aggr_size(dofs);
        let (nodes, stats) = aggregate(&graph, min_size);
        let aggregation = if dofs > 1 { nodes.expand(dofs) } else { nodes };
        Ok((aggregation, stats))
    }

    /// Coarsen repeatedly, forming `A_c = Pᵀ A P` on every level, until the
    /// problem is too small or `max_levels` is reached. Collective.
    ///
    /// An error while generating a prolongator ends coarsening on every
    /// process; it is kept in [`Hierarchy::failure`] next to the levels built
    /// so far.
    pub fn build_hierarchy<C: Comm + ?Sized>(
        &self,
        a: &DistCsrMatrix,
        mut state: LevelState,
        comm: &C,
    ) -> Result<Hierarchy, SaError> {
        let mut levels = Vec::new();
        let mut failure = None;
        let mut current = a.clone();
        while levels.len() + 1 < self.opts.max_levels {
            let prolongation = match self.gen_prolongator(&current, &mut state, comm) {
                Ok(LevelOutcome::Coarsened(p)) => p,
                Ok(LevelOutcome::TooSmall) => break,
                Err(e) => {
                    log::warn!("coarsening stopped at level {}: {}", state.level, e);
                    failure = Some(e);
                    break;
                }
            };
            let r = prolongation.p.transpose(comm)?;
            let ap = current.matmul(comm, &prolongation.p)?;
            let coarse = r.matmul(comm, &ap)?;
            levels.push(Level {
                a: current,
                p: Some(prolongation.p),
                spectral_radius: prolongation.spectral_radius,
            });
            current = coarse;
        }
        levels.push(Level { a: current, p: None, spectral_radius: 0.0 });
        Ok(Hierarchy { levels, failure })
    }
}

/// Combine a process-local outcome across all processes. Collective.
///
/// Every process gets an error when any of them failed: its own error, or
/// [`SaError::Comm`] naming how many processes failed elsewhere.
fn agree<T, C: Comm + ?Sized>(comm: &C, level: usize, local: Result<T, SaError>) -> Result<T, SaError> {
    let failed = comm.all_reduce_usize(usize::from(local.is_err()));
    match local {
        Err(e) => Err(e),
        Ok(_) if failed > 0 => Err(SaError::Comm(format!(
            "{} of {} processes failed to coarsen level {}",
            failed,
            comm.size(),
            level
        ))),
        ok => ok,
    }
}
