//! `good_lp` backend.
//!
//! The model is rebuilt from scratch on every call; backends keep no state
//! between solves. Both backends receive the request's time limit, its
//! relative MIP gap and the model's starting values. Starts are hints: a
//! partial or infeasible start is completed or ignored by the backend.

use std::time::Instant;

#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as highs_solver;
#[cfg(feature = "solver-microlp")]
use good_lp::solvers::microlp::microlp as microlp_solver;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable, WithMipGap, WithTimeLimit,
};
use tracing::{debug, warn};

use crate::error::{SolverError, SolverResult};
use crate::model::{LinearExpr, MilpModel, Sense, VarKind};
use crate::registry::SolverKind;
use crate::solver::{SolveRequest, SolveResponse, Solver};
use crate::status::ModelStatus;

/// Bound violation above which a time-limited answer is not trusted.
const TRUSTED_VIOLATION: f64 = 1e-5;

#[derive(Debug, Clone, Copy)]
pub struct GoodLpSolver {
    kind: SolverKind,
}

impl GoodLpSolver {
    pub fn new(kind: SolverKind) -> Self {
        Self { kind }
    }
}

/// Limits handed to the backend for one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SolveLimits {
    time_limit: f64,
    /// `None` when the requested gap is not a usable relative gap
    mip_gap: Option<f32>,
}

impl SolveLimits {
    fn from_request(request: &SolveRequest<'_>) -> Self {
        let gap = request.relative_gap;
        Self {
            time_limit: request.time_limit.as_secs_f64(),
            mip_gap: (gap.is_finite() && gap >= 0.0).then_some(gap as f32),
        }
    }

    fn apply<M>(&self, problem: M) -> SolverResult<M>
    where
        M: WithTimeLimit + WithMipGap,
    {
        let problem = problem.with_time_limit(self.time_limit);
        match self.mip_gap {
            Some(gap) => problem
                .with_mip_gap(gap)
                .map_err(|err| SolverError::Backend(format!("mip gap {}: {:?}", gap, err))),
            None => Ok(problem),
        }
    }
}

fn expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant);
    for (var, coef) in &expr.terms {
        out += *coef * handles[var.index()];
    }
    out
}

fn solve_with<M>(
    mut problem: M,
    model: &MilpModel,
    handles: &[Variable],
) -> Result<Vec<f64>, ResolutionError>
where
    M: SolverModel<Error = ResolutionError>,
{
    for row in model.rows() {
        let lhs = expression(&row.expr, handles);
        let rhs = row.rhs;
        problem = problem.with(match row.sense {
            Sense::Le => constraint!(lhs <= rhs),
            Sense::Ge => constraint!(lhs >= rhs),
            Sense::Eq => constraint!(lhs == rhs),
        });
    }
    let solution = problem.solve()?;
    Ok(handles.iter().map(|v| solution.value(*v)).collect())
}

impl Solver for GoodLpSolver {
    fn id(&self) -> &'static str {
        self.kind.as_str()
    }

    fn solve(&self, request: &SolveRequest<'_>) -> SolverResult<SolveResponse> {
        let model = request.model;
        model.check()?;

        debug!(
            backend = self.id(),
            model = model.name(),
            vars = model.num_vars(),
            binaries = model.num_binaries(),
            rows = model.num_rows(),
            "submitting model"
        );

        let limits = SolveLimits::from_request(request);
        let clock = Instant::now();
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .vars()
            .iter()
            .map(|spec| {
                let def = match spec.kind {
                    VarKind::Continuous => variable(),
                    VarKind::Binary => variable().integer(),
                };
                let def = def.min(spec.lower).max(spec.upper);
                match spec.start {
                    Some(value) => vars.add(def.initial(value.clamp(spec.lower, spec.upper))),
                    None => vars.add(def),
                }
            })
            .collect();
        let unsolved = vars.maximise(expression(model.objective(), &handles));

        let outcome = match self.kind {
            SolverKind::Microlp => {
                #[cfg(feature = "solver-microlp")]
                {
                    let problem = limits.apply(unsolved.using(microlp_solver))?;
                    solve_with(problem, model, &handles)
                }
                #[cfg(not(feature = "solver-microlp"))]
                {
                    drop(unsolved);
                    return Err(SolverError::Unavailable {
                        solver: "microlp",
                        feature: "solver-microlp",
                    });
                }
            }
            SolverKind::Highs => {
                #[cfg(feature = "solver-highs")]
                {
                    let quiet = unsolved.using(highs_solver).set_option("output_flag", false);
                    let problem = limits.apply(quiet)?;
                    solve_with(problem, model, &handles)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    drop(unsolved);
                    return Err(SolverError::Unavailable {
                        solver: "highs",
                        feature: "solver-highs",
                    });
                }
            }
        };
        let elapsed = clock.elapsed();

        match outcome {
            Ok(levels) => {
                let hit_limit = elapsed >= request.time_limit;
                if hit_limit && model.max_violation(&levels) > TRUSTED_VIOLATION {
                    warn!(
                        backend = self.id(),
                        model = model.name(),
                        "time limit reached without a feasible point"
                    );
                    return Ok(SolveResponse::without_solution(ModelStatus::Other, elapsed));
                }
                let status = if hit_limit {
                    ModelStatus::IntegerSolutionFound
                } else {
                    ModelStatus::Optimal
                };
                let objective = model.objective().evaluate(&levels);
                Ok(SolveResponse {
                    status,
                    objective: Some(objective),
                    dual_bound: (status == ModelStatus::Optimal).then_some(objective),
                    levels,
                    solve_time: elapsed,
                })
            }
            Err(ResolutionError::Infeasible) => Ok(SolveResponse::without_solution(
                ModelStatus::Infeasible,
                elapsed,
            )),
            Err(err) => {
                warn!(backend = self.id(), model = model.name(), error = %err, "solve failed");
                Ok(SolveResponse::without_solution(ModelStatus::Other, elapsed))
            }
        }
    }
}

#[cfg(all(test, feature = "solver-microlp"))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn solve(model: &MilpModel) -> SolveResponse {
        let solver = GoodLpSolver::new(SolverKind::Microlp);
        solver
            .solve(&SolveRequest::new(model, Duration::from_secs(60), 1e-4))
            .unwrap()
    }

    #[test]
    fn solves_small_lp() {
        let mut model = MilpModel::new("lp");
        let x = model.add_continuous("x", &[], 0.0, 4.0);
        let y = model.add_continuous("y", &[], 0.0, 4.0);
        model.add_row("cap", LinearExpr::new().term(x, 1.0).term(y, 2.0), Sense::Le, 6.0);
        model.set_objective(LinearExpr::new().term(x, 3.0).term(y, 2.0));

        let response = solve(&model);
        assert_eq!(response.status, ModelStatus::Optimal);
        // x = 4, y = 1
        assert!((response.objective.unwrap() - 14.0).abs() < 1e-6);
        assert!((response.level(&model, "y", &[]).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn respects_binaries() {
        let mut model = MilpModel::new("knapsack");
        let items = [(5.0, 4.0), (4.0, 3.0), (3.0, 2.0)];
        let mut weight = LinearExpr::new();
        let mut value = LinearExpr::new();
        for (i, (v, w)) in items.iter().enumerate() {
            let pick = model.add_binary("pick", &[i]);
            weight.add_term(pick, *w);
            value.add_term(pick, *v);
        }
        model.add_row("weight", weight, Sense::Le, 5.0);
        model.set_objective(value);

        let response = solve(&model);
        assert!(response.status.is_solved());
        // items 1 and 2
        assert!((response.objective.unwrap() - 7.0).abs() < 1e-6);
        for level in &response.levels {
            assert!(level.abs() < 1e-6 || (level - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn fixed_variables_stay_fixed() {
        let mut model = MilpModel::new("fixed");
        let x = model.add_continuous("x", &[], 0.0, 10.0);
        model.fix(x, 2.5);
        model.set_objective(LinearExpr::new().term(x, 1.0));
        let response = solve(&model);
        assert!((response.value(x) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn reports_infeasibility() {
        let mut model = MilpModel::new("infeasible");
        let x = model.add_continuous("x", &[], 0.0, 1.0);
        model.add_row("low", LinearExpr::new().term(x, 1.0), Sense::Ge, 2.0);
        model.set_objective(LinearExpr::new().term(x, 1.0));

        let response = solve(&model);
        assert!(response.status.is_infeasible());
        assert!(!response.has_solution());
        assert_eq!(response.objective, None);
    }

    #[test]
    fn malformed_model_is_an_error() {
        let mut model = MilpModel::new("nan");
        let x = model.add_continuous("x", &[], 0.0, 1.0);
        model.set_objective(LinearExpr::new().term(x, f64::NAN));
        let solver = GoodLpSolver::new(SolverKind::Microlp);
        let result = solver.solve(&SolveRequest::new(&model, Duration::from_secs(1), 0.0));
        assert!(matches!(result, Err(SolverError::InvalidModel { .. })));
    }

    #[test]
    fn limits_follow_request() {
        let model = MilpModel::new("limits");
        let limits =
            SolveLimits::from_request(&SolveRequest::new(&model, Duration::from_secs(30), 1e-4));
        assert_eq!(limits.time_limit, 30.0);
        assert_eq!(limits.mip_gap, Some(1e-4_f32));

        for gap in [-1.0, f64::NAN, f64::INFINITY] {
            let limits =
                SolveLimits::from_request(&SolveRequest::new(&model, Duration::from_secs(1), gap));
            assert_eq!(limits.mip_gap, None);
        }
    }

    #[test]
    fn starts_are_hints_only() {
        let mut model = MilpModel::new("started");
        let items = [(5.0, 4.0), (4.0, 3.0), (3.0, 2.0)];
        let mut weight = LinearExpr::new();
        let mut value = LinearExpr::new();
        for (i, (v, w)) in items.iter().enumerate() {
            let pick = model.add_binary("pick", &[i]);
            // feasible but suboptimal: item 0 alone
            model.set_start(pick, if i == 0 { 1.0 } else { 0.0 });
            weight.add_term(pick, *w);
            value.add_term(pick, *v);
        }
        let x = model.add_continuous("x", &[], 0.0, 4.0);
        model.set_start(x, 99.0);
        model.add_row("weight", weight, Sense::Le, 5.0);
        model.set_objective(value);

        let response = solve(&model);
        assert!(response.status.is_solved());
        assert!((response.objective.unwrap() - 7.0).abs() < 1e-6);
    }
}
