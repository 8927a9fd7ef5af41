//! # pool-algo: Adaptive Discretization for the Pooling Problem
//!
//! This crate turns the nonconvex pooling problem into a sequence of MILPs.
//! Each MILP fixes one factor of every bilinear term to a finite set of
//! breakpoints; between solves the breakpoints are moved and narrowed around
//! the selected values.
//!
//! ## Formulations and Schemes
//!
//! | Formulation | Variant | Discretized |
//! |-------------|---------|-------------|
//! | TP | [`DiscVariant::Proportion`] | demand share `PR(p,d)` of each pool |
//! | TP | [`DiscVariant::Flow`] | source to pool flow `FL(s,p)` |
//! | TP, PQ | [`DiscVariant::Pool`] | pool outflow, split into routed slots |
//!
//! ### Architecture
//!
//! - **[`formulation`]**: the TP and PQ base programs without their bilinear coupling
//! - **[`discretization::DiscretizedProblem`]**: one scheme (`initialize`, `solve`, `adapt`)
//! - **[`RefinementSession`]**: the solve/adapt loop and its stopping rules
//! - **[`FeasibilityChecker`]**: independent certification of the final flows
//! - **[`runner`]**: wires the above together and produces a [`RunReport`]
//!
//! ## Example
//!
//! ```ignore
//! use pool_algo::{run, DiscVariant, RunConfig};
//! use pool_core::{instance::load_instance, NetworkModel};
//!
//! let raw = load_instance("haverly1.dat")?;
//! let network = NetworkModel::from_raw(&raw)?;
//!
//! let config = RunConfig {
//!     variant: DiscVariant::Pool,
//!     time_limit: 120.0,
//!     iteration_limit: 60.0,
//!     ..RunConfig::default()
//! };
//! let report = run(&network, &config)?;
//! println!("{}: {:?}", report.status, report.objective);
//! ```

pub mod checker;
pub mod config;
pub mod discretization;
pub mod formulation;
pub mod refinement;
pub mod runner;

pub use checker::{CheckReport, CheckVerdict, FeasibilityChecker, Violation, ViolationKind};
pub use config::{DiscType, DiscVariant, Formulation, RunConfig};
pub use discretization::{build_scheme, DiscretizedProblem, SolveOutcome};
pub use refinement::{RefinementOutcome, RefinementSession, RefinementSettings, RefinementState};
pub use runner::{run, run_with_solver, RunReport, TerminalStatus};
