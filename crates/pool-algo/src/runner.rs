//! End-to-end run: refine, then certify the incumbent.

use std::fmt;

use pool_core::flows::FlowEntry;
use pool_core::{NetworkModel, PipeFlows, PoolResult};
use pool_solver::Solver;
use serde::Serialize;
use tracing::info;

use crate::checker::{CheckVerdict, FeasibilityChecker};
use crate::config::RunConfig;
use crate::discretization::build_scheme;
use crate::refinement::{IterationRecord, RefinementSession, RefinementSettings, RefinementState};

/// Flows at or below this are left out of reports.
const FLOW_THRESHOLD: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminalStatus {
    Solved,
    Infeasible,
    #[serde(rename = "Checker infeasible")]
    CheckerInfeasible,
    #[serde(rename = "Not solved")]
    NotSolved,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Solved => "Solved",
            TerminalStatus::Infeasible => "Infeasible",
            TerminalStatus::CheckerInfeasible => "Checker infeasible",
            TerminalStatus::NotSolved => "Not solved",
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CheckVerdict> for TerminalStatus {
    fn from(verdict: CheckVerdict) -> Self {
        match verdict {
            CheckVerdict::Solved => TerminalStatus::Solved,
            CheckVerdict::CheckerInfeasible => TerminalStatus::CheckerInfeasible,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub instance: String,
    pub config: RunConfig,
    pub status: TerminalStatus,
    pub refinement: RefinementState,
    /// Discretization runs never prove a bound; `None` stands for infinity
    pub dual_bound: Option<f64>,
    pub objective: Option<f64>,
    pub elapsed_seconds: f64,
    pub iterations: usize,
    pub flows: Vec<FlowEntry>,
    pub checker_messages: Vec<String>,
    pub history: Vec<IterationRecord>,
    #[serde(skip)]
    pub pipe_flows: Option<PipeFlows>,
}

/// Validate `config`, build its solver and run.
pub fn run(network: &NetworkModel, config: &RunConfig) -> PoolResult<RunReport> {
    config.ensure_valid()?;
    let solver = config.solver.build_solver()?;
    run_with_solver(network, config, solver.as_ref())
}

pub fn run_with_solver(
    network: &NetworkModel,
    config: &RunConfig,
    solver: &dyn Solver,
) -> PoolResult<RunReport> {
    info!(
        instance = network.name(),
        formulation = %config.formulation,
        disc_type = %config.disc_type,
        variant = %config.variant,
        disc_size = config.disc_size,
        solver = solver.id(),
        "starting run"
    );

    let scheme = build_scheme(config, network)?;
    let outcome = RefinementSession::new(scheme, RefinementSettings::from(config)).run(solver)?;

    let (status, checker_messages) = match (&outcome.best_flows, outcome.best_objective) {
        (Some(flows), Some(objective)) => {
            let report =
                FeasibilityChecker::from_config(network, config).check(solver, flows, objective);
            (TerminalStatus::from(report.verdict), report.messages())
        }
        _ if outcome.state == RefinementState::Infeasible => {
            (TerminalStatus::Infeasible, Vec::new())
        }
        _ => (TerminalStatus::NotSolved, Vec::new()),
    };

    info!(
        status = %status,
        objective = ?outcome.best_objective,
        iterations = outcome.iterations,
        seconds = outcome.elapsed.as_secs_f64(),
        "run finished"
    );

    Ok(RunReport {
        instance: network.name().to_string(),
        config: config.clone(),
        status,
        refinement: outcome.state,
        dual_bound: None,
        objective: outcome.best_objective,
        elapsed_seconds: outcome.elapsed.as_secs_f64(),
        iterations: outcome.iterations,
        flows: outcome
            .best_flows
            .as_ref()
            .map(|f| f.positive(network, FLOW_THRESHOLD))
            .unwrap_or_default(),
        checker_messages,
        history: outcome.history,
        pipe_flows: outcome.best_flows,
    })
}
