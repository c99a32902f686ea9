//! Context module for the smoothed-aggregation engine.
//!
//! This module provides the method object that turns options and per-level
//! state into prolongators, and the driver that stacks them into a hierarchy.
//!
//! Modules:
//! - [`sa_context`]: `SaMethod`, `LevelState`, `LevelOutcome` and `Hierarchy`.
//!
//! # Example
//! ```rust,ignore
//! use amgsa::{LevelState, SaMethod, SaOptions, SerialComm};
//! let sa = SaMethod::new(SaOptions::default())?;
//! let hierarchy = sa.build_hierarchy(&a, LevelState::finest(1), &SerialComm)?;
//! ```

pub mod sa_context;
pub use sa_context::{Hierarchy, Level, LevelOutcome, LevelState, Prolongation, SaMethod};
