//! Command-line or API options for smoothed-aggregation coarsening.
//!
//! This module provides the `SaOptions` struct, which is used to specify
//! the parameters of the coarsening engine via command-line style
//! `name value` pairs or direct field access. The available parameters cover
//! the strength threshold, aggregate and coarse-grid size limits, the
//! prolongator damping weight and the null-space description.

use std::str::FromStr;

use crate::error::SaError;

/// Smoother used on a level. Only MLS changes how a prolongator is built:
/// it needs the spectral radius even when the prolongator is not smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmootherKind {
    Jacobi,
    GaussSeidel,
    Mls,
}

impl FromStr for SmootherKind {
    type Err = SaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jacobi" => Ok(SmootherKind::Jacobi),
            "gs" | "gaussseidel" | "gauss-seidel" => Ok(SmootherKind::GaussSeidel),
            "mls" => Ok(SmootherKind::Mls),
            other => Err(SaError::InvalidOption {
                name: "smoother".to_string(),
                reason: format!("unknown smoother `{}`", other),
            }),
        }
    }
}

/// Form of the damped Jacobi operator used to smooth the tentative prolongator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JacobiScaling {
    /// `I − α A`, with α sized by the spectral radius of `A`.
    #[default]
    None,
    /// `I − α D⁻¹ A`, with α sized by the spectral radius of `D⁻¹ A`.
    Diagonal,
}

impl FromStr for JacobiScaling {
    type Err = SaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(JacobiScaling::None),
            "diagonal" | "diag" => Ok(JacobiScaling::Diagonal),
            other => Err(SaError::InvalidOption {
                name: "jacobi_scaling".to_string(),
                reason: format!("unknown scaling `{}`", other),
            }),
        }
    }
}

/// Smoothed-aggregation types & parameters.
#[derive(Debug, Clone)]
pub struct SaOptions {
    /// Strength threshold; `0` keeps every nonzero off-diagonal entry
    pub threshold: f64,

    /// Minimum size of aggregates formed in phases 1 and 3
    pub min_aggr_size: usize,

    /// Stop coarsening below this many coarse nodes
    pub min_coarse_size: usize,

    /// Prolongator damping weight; `0` disables smoothing
    pub p_weight: f64,

    /// Number of near-null-space vectors
    pub nullspace_dim: usize,

    /// Degrees of freedom per node on the finest level
    pub node_dofs: usize,

    /// Maximum number of levels built by the level driver
    pub max_levels: usize,

    pub pre_smoother: SmootherKind,
    pub post_smoother: SmootherKind,
    pub jacobi_scaling: JacobiScaling,

    /// 0 = quiet, 1 = level summaries, 2 = per-phase statistics
    pub output_level: usize,

    /// Lanczos steps for the spectral radius estimate
    pub ritz_steps: usize,
}

impl Default for SaOptions {
    fn default() -> Self {
        Self {
            threshold: 0.08,
            min_aggr_size: 3,
            min_coarse_size: 5,
            p_weight: 4.0 / 3.0,
            nullspace_dim: 1,
            node_dofs: 1,
            max_levels: 10,
            pre_smoother: SmootherKind::Jacobi,
            post_smoother: SmootherKind::Jacobi,
            jacobi_scaling: JacobiScaling::None,
            output_level: 0,
            ritz_steps: 10,
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, SaError> {
    value.trim().parse::<T>().map_err(|_| SaError::InvalidOption {
        name: name.to_string(),
        reason: format!("cannot parse `{}`", value),
    })
}

fn invalid(name: &str, reason: &str) -> SaError {
    SaError::InvalidOption { name: name.to_string(), reason: reason.to_string() }
}

impl SaOptions {
    /// Set one parameter from its textual form, e.g. `("threshold", "0.05")`.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<(), SaError> {
        match name {
            "threshold" => self.threshold = parse(name, value)?,
            "min_aggr_size" => self.min_aggr_size = parse(name, value)?,
            "min_coarse_size" => self.min_coarse_size = parse(name, value)?,
            "p_weight" => self.p_weight = parse(name, value)?,
            "nullspace_dim" => self.nullspace_dim = parse(name, value)?,
            "node_dofs" => self.node_dofs = parse(name, value)?,
            "max_levels" => self.max_levels = parse(name, value)?,
            "pre_smoother" => self.pre_smoother = value.parse()?,
            "post_smoother" => self.post_smoother = value.parse()?,
            "jacobi_scaling" => self.jacobi_scaling = value.parse()?,
            "output_level" => self.output_level = parse(name, value)?,
            "ritz_steps" => self.ritz_steps = parse(name, value)?,
            _ => return Err(invalid(name, "unknown parameter")),
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), SaError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(invalid("threshold", "must be a finite value >= 0"));
        }
        if !self.p_weight.is_finite() {
            return Err(invalid("p_weight", "must be finite"));
        }
        if self.min_aggr_size == 0 {
            return Err(invalid("min_aggr_size", "must be at least 1"));
        }
        if self.nullspace_dim == 0 {
            return Err(invalid("nullspace_dim", "must be at least 1"));
        }
        if self.node_dofs == 0 {
            return Err(invalid("node_dofs", "must be at least 1"));
        }
        if self.ritz_steps == 0 {
            return Err(invalid("ritz_steps", "must be at least 1"));
        }
        Ok(())
    }

    /// Minimum aggregate size in graph nodes for a level whose nodes carry
    /// `node_dofs` equations: large enough that every aggregate has more
    /// equations than null-space vectors.
    pub fn effective_min_aggr_size(&self, node_dofs: usize) -> usize {
        let per_node = self.nullspace_dim / node_dofs.max(1);
        if per_node >= self.min_aggr_size {
            per_node + 1
        } else {
            self.min_aggr_size
        }
    }

    /// Whether building a prolongator needs the spectral radius of `A`.
    pub fn needs_spectral_radius(&self, initial_aggregation: bool) -> bool {
        self.p_weight != 0.0
            || self.pre_smoother == SmootherKind::Mls
            || self.post_smoother == SmootherKind::Mls
            || initial_aggregation
    }
}
