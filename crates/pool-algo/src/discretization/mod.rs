//! Discretization schemes.
//!
//! Each scheme replaces the bilinear coupling of a base formulation with a
//! MILP over a finite set of breakpoints and refines the breakpoints between
//! solves:
//!
//! | Variant | Forms | Discretized quantity | State |
//! |---------|-------|----------------------|-------|
//! | proportion | TP | `PR(p,d)` | one [`IntervalGrid`] per pool/demand pair |
//! | flow | TP | `FL(s,p)` | one [`IntervalGrid`] per source/pool pair |
//! | pool | TP, PQ | pool outflow split into slots | one [`PoolSlots`] per pool |
//!
//! All schemes implement [`DiscretizedProblem`], which is what the
//! refinement loop drives.

pub mod flow;
pub mod grid;
pub mod pool;
pub mod proportion;
pub mod slots;

use std::time::Duration;

use pool_core::{NetworkModel, PipeFlows, PoolError, PoolResult};
use pool_solver::{ModelStatus, SolveRequest, SolveResponse, Solver, VarId};
use tracing::debug;

use crate::config::{DiscType, DiscVariant, Formulation, RunConfig};

pub use flow::FlowScheme;
pub use grid::IntervalGrid;
pub use pool::PoolScheme;
pub use proportion::ProportionScheme;
pub use slots::{PoolSlots, SlotChange, SlotUse};

/// Result of one scheme solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: ModelStatus,
    pub objective: Option<f64>,
    /// Candidate pipe flows when the status is solved
    pub flows: Option<PipeFlows>,
}

impl SolveOutcome {
    pub fn not_solved(status: ModelStatus) -> Self {
        Self {
            status,
            objective: None,
            flows: None,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status.is_solved() && self.flows.is_some()
    }

    pub fn is_infeasible(&self) -> bool {
        self.status.is_infeasible()
    }
}

/// A discretized MILP driven by the refinement loop.
pub trait DiscretizedProblem {
    /// Scheme label used in logs, e.g. `tp-proportion`.
    fn name(&self) -> String;

    /// Reset the breakpoint state to its first discretization.
    fn initialize(&mut self);

    /// Build the MILP for the current breakpoints, solve it and record the
    /// selected breakpoints for the next [`adapt`](Self::adapt).
    fn solve(
        &mut self,
        solver: &dyn Solver,
        time_limit: Duration,
        gap: f64,
    ) -> PoolResult<SolveOutcome>;

    /// Refine the breakpoints from the last recorded selection.
    fn adapt(&mut self);
}

/// Settings shared by all schemes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemeSettings {
    pub disc_size: usize,
    pub feasibility_tolerance: f64,
    pub integer_tolerance: f64,
    /// Adaptive runs start coarse; non-iterative runs start at full size
    pub iterative: bool,
}

impl From<&RunConfig> for SchemeSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            disc_size: config.disc_size,
            feasibility_tolerance: config.feasibility_tolerance,
            integer_tolerance: config.integer_tolerance,
            iterative: config.disc_type == DiscType::Adaptive,
        }
    }
}

/// Pick the scheme for the configured formulation and variant.
pub fn build_scheme<'a>(
    config: &RunConfig,
    network: &'a NetworkModel,
) -> PoolResult<Box<dyn DiscretizedProblem + 'a>> {
    let settings = SchemeSettings::from(config);
    match (config.formulation, config.variant) {
        (Formulation::Tp, DiscVariant::Proportion) => {
            Ok(Box::new(ProportionScheme::new(network, settings)))
        }
        (Formulation::Tp, DiscVariant::Flow) => Ok(Box::new(FlowScheme::new(network, settings))),
        (formulation, DiscVariant::Pool) => {
            Ok(Box::new(PoolScheme::new(network, formulation, settings)))
        }
        (formulation, variant) => Err(PoolError::Config(format!(
            "the {} formulation has no {} variant",
            formulation, variant
        ))),
    }
}

/// Submit `model` and log the outcome.
pub(crate) fn submit(
    solver: &dyn Solver,
    model: &pool_solver::MilpModel,
    time_limit: Duration,
    gap: f64,
) -> PoolResult<SolveResponse> {
    model.check()?;
    debug!(
        model = model.name(),
        vars = model.num_vars(),
        binaries = model.num_binaries(),
        rows = model.num_rows(),
        "submitting model"
    );
    let response = solver.solve(&SolveRequest::new(model, time_limit, gap))?;
    debug!(
        model = model.name(),
        status = %response.status,
        objective = ?response.objective,
        seconds = response.solve_time.as_secs_f64(),
        "model solved"
    );
    Ok(response)
}

/// First binary in `chi` whose level reaches `1 - tolerance`.
pub(crate) fn first_selected(
    response: &SolveResponse,
    chi: impl IntoIterator<Item = VarId>,
    tolerance: f64,
) -> Option<usize> {
    chi.into_iter()
        .position(|var| response.value(var) >= 1.0 - tolerance)
}
