//! Greedy local aggregation (phases 1 to 5).
//!
//! Aggregates never cross process boundaries: only locally owned rows are
//! inspected and no communication happens while aggregating. Rows are visited
//! in ascending order and neighbors in column-storage order, so the result is
//! fully determined by the graph.

use crate::core::traits::RowAccess;
use crate::error::SaError;
use crate::matrix::CsrMatrix;
use crate::parallel::Comm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeStatus {
    Ready,
    Selected,
    Pending,
    NotSelected,
}

/// Assignment of local rows (or nodes) to local aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    node2aggr: Vec<usize>,
    naggr: usize,
}

impl Aggregation {
    /// Wrap an externally computed assignment, e.g. an initial aggregation.
    pub fn new(node2aggr: Vec<usize>, naggr: usize) -> Result<Self, SaError> {
        if let Some(&bad) = node2aggr.iter().find(|&&a| a >= naggr) {
            return Err(SaError::DimensionMismatch {
                context: "Aggregation::new aggregate id",
                expected: naggr,
                found: bad,
            });
        }
        Ok(Self { node2aggr, naggr })
    }

    pub fn naggr(&self) -> usize {
        self.naggr
    }

    pub fn node2aggr(&self) -> &[usize] {
        &self.node2aggr
    }

    pub fn len(&self) -> usize {
        self.node2aggr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node2aggr.is_empty()
    }

    /// Number of members of each aggregate.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.naggr];
        for &a in &self.node2aggr {
            sizes[a] += 1;
        }
        sizes
    }

    /// Members of each aggregate in ascending order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.naggr];
        for (row, &a) in self.node2aggr.iter().enumerate() {
            members[a].push(row);
        }
        members
    }

    /// Node assignment expanded to equations: equation `i` belongs to the
    /// aggregate of node `i / block`.
    pub fn expand(&self, block: usize) -> Aggregation {
        let node2aggr = (0..self.node2aggr.len() * block)
            .map(|i| self.node2aggr[i / block])
            .collect();
        Aggregation { node2aggr, naggr: self.naggr }
    }
}

/// Aggregate count and aggregated-row count after one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCount {
    pub naggr: usize,
    pub selected: usize,
}

/// Progress of one aggregation call, phase by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub nodes: usize,
    /// Isolated rows (no graph edges).
    pub isolated: usize,
    /// Rows still unassigned after phase 4 although they have neighbors.
    pub unresolved: usize,
    pub phases: [PhaseCount; 5],
}

impl AggregationStats {
    /// Sum over all processes. Collective.
    pub fn reduce<C: Comm + ?Sized>(&self, comm: &C) -> AggregationStats {
        let mut out = AggregationStats {
            nodes: comm.all_reduce_usize(self.nodes),
            isolated: comm.all_reduce_usize(self.isolated),
            unresolved: comm.all_reduce_usize(self.unresolved),
            ..Default::default()
        };
        for (o, p) in out.phases.iter_mut().zip(&self.phases) {
            o.naggr = comm.all_reduce_usize(p.naggr);
            o.selected = comm.all_reduce_usize(p.selected);
        }
        out
    }

    pub fn log_summary(&self) {
        log::info!("aggregation: total nodes to aggregate = {}", self.nodes);
        for (k, p) in self.phases.iter().enumerate() {
            log::info!(
                "aggregation P{}: no. of aggregates = {}, no. nodes aggregated = {}",
                k + 1,
                p.naggr,
                p.selected
            );
        }
    }
}

struct Aggregator<'g> {
    graph: &'g CsrMatrix<f64>,
    status: Vec<NodeStatus>,
    node2aggr: Vec<usize>,
    naggr: usize,
    selected: usize,
    min_size: usize,
}

impl<'g> Aggregator<'g> {
    fn new(graph: &'g CsrMatrix<f64>, min_size: usize) -> Self {
        let n = graph.nrows();
        let status = (0..n)
            .map(|i| if graph.row_len(i) == 0 { NodeStatus::NotSelected } else { NodeStatus::Ready })
            .collect();
        Self { graph, status, node2aggr: vec![usize::MAX; n], naggr: 0, selected: 0, min_size }
    }

    fn n(&self) -> usize {
        self.status.len()
    }

    /// Local neighbors of `i` in storage order.
    fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + use<'g> {
        let graph: &'g CsrMatrix<f64> = self.graph;
        let n = graph.nrows();
        graph.row(i).0.iter().copied().filter(move |&j| j < n)
    }

    fn assign(&mut self, i: usize, aggr: usize, status: NodeStatus) {
        self.node2aggr[i] = aggr;
        self.status[i] = status;
        if status == NodeStatus::Selected {
            self.selected += 1;
        }
    }

    fn isolated(&self) -> usize {
        self.status.iter().filter(|&&s| s == NodeStatus::NotSelected).count()
    }

    fn has_ready(&self) -> bool {
        self.status.contains(&NodeStatus::Ready)
    }

    fn count(&self) -> PhaseCount {
        PhaseCount { naggr: self.naggr, selected: self.selected }
    }

    /// A row whose neighbors are all untouched forms an aggregate with them.
    fn phase1(&mut self) {
        for i in 0..self.n() {
            if self.status[i] != NodeStatus::Ready {
                continue;
            }
            let mut count = 1;
            let mut free = true;
            for j in self.neighbors(i) {
                if self.status[j] != NodeStatus::Ready {
                    free = false;
                    break;
                }
                count += 1;
            }
            if free && count >= self.min_size {
                let id = self.naggr;
                self.assign(i, id, NodeStatus::Selected);
                for j in self.neighbors(i) {
                    self.assign(j, id, NodeStatus::Selected);
                }
                self.naggr += 1;
            }
        }
    }

    /// Join the aggregate of the first selected neighbor. With `deferred`
    /// the join only becomes visible after the sweep.
    fn join_neighbors(&mut self, deferred: bool) {
        for i in 0..self.n() {
            if self.status[i] != NodeStatus::Ready {
                continue;
            }
            let found = self.neighbors(i).find(|&j| self.status[j] == NodeStatus::Selected);
            if let Some(j) = found {
                let status = if deferred { NodeStatus::Pending } else { NodeStatus::Selected };
                self.assign(i, self.node2aggr[j], status);
            }
        }
        if deferred {
            for i in 0..self.n() {
                if self.status[i] == NodeStatus::Pending {
                    self.status[i] = NodeStatus::Selected;
                    self.selected += 1;
                }
            }
        }
    }

    /// New aggregates from a row and its remaining ready neighbors.
    fn phase3(&mut self) {
        for i in 0..self.n() {
            if self.status[i] != NodeStatus::Ready {
                continue;
            }
            let count = 1 + self.neighbors(i).filter(|&j| self.status[j] == NodeStatus::Ready).count();
            if count > 1 && count >= self.min_size {
                let id = self.naggr;
                self.assign(i, id, NodeStatus::Selected);
                for j in self.neighbors(i) {
                    if self.status[j] == NodeStatus::Ready {
                        self.assign(j, id, NodeStatus::Selected);
                    }
                }
                self.naggr += 1;
            }
        }
    }

    /// Rows left over with neighbors point at an inconsistent graph.
    fn report_unresolved(&self) -> usize {
        let unresolved: Vec<usize> = (0..self.n())
            .filter(|&i| self.status[i] == NodeStatus::Ready && self.graph.row_len(i) > 0)
            .collect();
        if !unresolved.is_empty() {
            log::warn!("aggregation: {} rows with neighbors left unaggregated after phase 4", unresolved.len());
            for &i in &unresolved {
                log::debug!("unaggregated row {} has neighbors {:?}", i, self.graph.row(i).0);
            }
        }
        unresolved.len()
    }

    /// Split `rows` into `max(1, rows / min)` new aggregates of `min`
    /// consecutive rows; the last one takes the rest.
    fn sweep(&mut self, rows: Vec<usize>) {
        if rows.is_empty() {
            return;
        }
        let count = (rows.len() / self.min_size).max(1);
        let first = self.naggr;
        for (k, i) in rows.into_iter().enumerate() {
            let id = first + (k / self.min_size).min(count - 1);
            self.assign(i, id, NodeStatus::Selected);
        }
        self.naggr = first + count;
    }

    /// Leftover rows with neighbors get aggregates of their own. Isolated
    /// rows join the aggregate of the closest assigned row before them (after
    /// them for a leading run), and are swept into new aggregates only when
    /// the process has no aggregate at all.
    fn phase5(&mut self) {
        let ready: Vec<usize> = (0..self.n()).filter(|&i| self.status[i] == NodeStatus::Ready).collect();
        self.sweep(ready);

        let isolated: Vec<usize> = (0..self.n()).filter(|&i| self.status[i] == NodeStatus::NotSelected).collect();
        if self.naggr == 0 {
            self.sweep(isolated);
            return;
        }
        let Some(first) = (0..self.n()).find(|&i| self.status[i] == NodeStatus::Selected) else {
            return;
        };
        let mut current = self.node2aggr[first];
        for i in 0..self.n() {
            match self.status[i] {
                NodeStatus::NotSelected => self.assign(i, current, NodeStatus::Selected),
                _ => current = self.node2aggr[i],
            }
        }
    }
}

/// Aggregate the rows of `graph` so that aggregates formed from scratch have
/// at least `min_aggr_size` members.
///
/// Every row is assigned on return, isolated rows included: the final phase
/// attaches them to a neighboring aggregate in row order, or groups them
/// when there is nothing to attach to.
pub fn aggregate(graph: &CsrMatrix<f64>, min_aggr_size: usize) -> (Aggregation, AggregationStats) {
    let mut agg = Aggregator::new(graph, min_aggr_size.max(1));
    let mut stats = AggregationStats { nodes: agg.n(), isolated: agg.isolated(), ..Default::default() };

    agg.phase1();
    stats.phases[0] = agg.count();
    if agg.has_ready() {
        agg.join_neighbors(true);
    }
    stats.phases[1] = agg.count();
    if agg.has_ready() {
        agg.phase3();
    }
    stats.phases[2] = agg.count();
    if agg.has_ready() {
        agg.join_neighbors(false);
    }
    stats.phases[3] = agg.count();
    stats.unresolved = agg.report_unresolved();
    agg.phase5();
    stats.phases[4] = agg.count();

    debug_assert!(agg.node2aggr.iter().all(|&a| a < agg.naggr));
    (Aggregation { node2aggr: agg.node2aggr, naggr: agg.naggr }, stats)
}
