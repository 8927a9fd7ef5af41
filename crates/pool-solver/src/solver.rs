use std::time::Duration;

use crate::error::SolverResult;
use crate::model::{MilpModel, VarId};
use crate::status::ModelStatus;

/// One solve call.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    pub model: &'a MilpModel,
    pub time_limit: Duration,
    /// Relative MIP gap at which the backend may stop
    pub relative_gap: f64,
}

impl<'a> SolveRequest<'a> {
    pub fn new(model: &'a MilpModel, time_limit: Duration, relative_gap: f64) -> Self {
        Self {
            model,
            time_limit,
            relative_gap,
        }
    }
}

/// What a backend returns for one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResponse {
    pub status: ModelStatus,
    /// Objective at the returned levels
    pub objective: Option<f64>,
    /// Best proven bound, when the backend knows one
    pub dual_bound: Option<f64>,
    /// One level per model variable; empty without a solution
    pub levels: Vec<f64>,
    pub solve_time: Duration,
}

impl SolveResponse {
    pub fn without_solution(status: ModelStatus, solve_time: Duration) -> Self {
        Self {
            status,
            objective: None,
            dual_bound: None,
            levels: Vec::new(),
            solve_time,
        }
    }

    pub fn has_solution(&self) -> bool {
        !self.levels.is_empty()
    }

    /// Level of `var`; 0 when there is no solution.
    pub fn value(&self, var: VarId) -> f64 {
        self.levels.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Level looked up by family name and index tuple.
    pub fn level(&self, model: &MilpModel, family: &str, index: &[usize]) -> Option<f64> {
        let var = model.var(family, index)?;
        self.levels.get(var.index()).copied()
    }
}

/// Stateless request/response solver boundary.
pub trait Solver: Send + Sync {
    /// Short backend name, as accepted by [`crate::SolverKind`].
    fn id(&self) -> &'static str;

    fn solve(&self, request: &SolveRequest<'_>) -> SolverResult<SolveResponse>;
}
