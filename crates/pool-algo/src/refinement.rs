//! Adaptive refinement loop.
//!
//! A [`RefinementSession`] owns one discretization scheme and alternates
//! solve and adapt until the incumbent stops improving, a solve fails, or
//! the wall-clock budget runs out.

use std::time::{Duration, Instant};

use pool_core::{PipeFlows, PoolResult};
use pool_solver::{ModelStatus, Solver};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DiscType, RunConfig};
use crate::discretization::DiscretizedProblem;

/// Seconds of the budget kept back for the final check.
const RESERVE_SECONDS: f64 = 10.0;
/// Relative improvement below which the loop stops.
const CONVERGENCE_GAP: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementState {
    Running,
    Converged,
    Infeasible,
    TimedOut,
}

/// Budgets of one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementSettings {
    /// Whole loop, in seconds
    pub time_limit: f64,
    /// One solve, in seconds
    pub iteration_limit: f64,
    pub gap: f64,
    /// An objective must beat the incumbent by more than this to replace it
    pub improvement_tolerance: f64,
    /// Non-iterative sessions stop after one solve
    pub iterative: bool,
}

impl From<&RunConfig> for RefinementSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            time_limit: config.time_limit,
            iteration_limit: config.effective_iteration_limit(),
            gap: config.gap,
            improvement_tolerance: config.feasibility_tolerance,
            iterative: config.disc_type == DiscType::Adaptive,
        }
    }
}

/// One solve of the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub status: ModelStatus,
    pub objective: Option<f64>,
    /// Incumbent objective after this solve
    pub best: f64,
    /// Budget given to the solve, in seconds
    pub time_limit: f64,
    pub elapsed: f64,
}

/// What a finished session hands back.
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub state: RefinementState,
    /// Completed solves with a usable solution
    pub iterations: usize,
    /// Incumbent objective; `None` when nothing beat 0
    pub best_objective: Option<f64>,
    pub best_flows: Option<PipeFlows>,
    pub history: Vec<IterationRecord>,
    pub elapsed: Duration,
}

pub struct RefinementSession<'a> {
    scheme: Box<dyn DiscretizedProblem + 'a>,
    settings: RefinementSettings,
    state: RefinementState,
    iteration: usize,
    best_objective: f64,
    best_flows: Option<PipeFlows>,
    last: f64,
    second_last: f64,
    history: Vec<IterationRecord>,
}

impl<'a> RefinementSession<'a> {
    pub fn new(scheme: Box<dyn DiscretizedProblem + 'a>, settings: RefinementSettings) -> Self {
        Self {
            scheme,
            settings,
            state: RefinementState::Running,
            iteration: 0,
            best_objective: 0.0,
            best_flows: None,
            last: 0.0,
            second_last: 0.0,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> RefinementState {
        self.state
    }

    pub fn run(mut self, solver: &dyn Solver) -> PoolResult<RefinementOutcome> {
        let clock = Instant::now();
        let mut iteration_limit = self.settings.iteration_limit;
        let mut solves = 0;

        self.scheme.initialize();
        info!(
            scheme = %self.scheme.name(),
            time_limit = self.settings.time_limit,
            iteration_limit,
            "starting refinement"
        );

        while self.state == RefinementState::Running {
            let remaining = self.settings.time_limit - clock.elapsed().as_secs_f64();
            if remaining <= RESERVE_SECONDS {
                self.state = RefinementState::TimedOut;
                break;
            }
            if !self.settings.iterative && solves == 1 {
                self.state = RefinementState::Converged;
                break;
            }
            if remaining < iteration_limit {
                iteration_limit = (remaining - RESERVE_SECONDS).round();
            }

            info!(iteration = self.iteration, time_limit = iteration_limit, "solving");
            let outcome = match self.scheme.solve(
                solver,
                Duration::from_secs_f64(iteration_limit.max(0.0)),
                self.settings.gap,
            ) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(
                        iteration = self.iteration,
                        error = %err,
                        "solve failed; keeping incumbent"
                    );
                    self.state = RefinementState::Converged;
                    self.record(ModelStatus::Other, None, iteration_limit, &clock);
                    break;
                }
            };
            solves += 1;

            let (objective, flows) = match (outcome.is_solved(), outcome.objective, outcome.flows) {
                (true, Some(objective), Some(flows)) => (objective, flows),
                (_, objective, _) => {
                    self.state = if outcome.status.is_infeasible() {
                        RefinementState::Infeasible
                    } else {
                        RefinementState::Converged
                    };
                    warn!(status = %outcome.status, "discretized model not solved");
                    self.record(outcome.status, objective, iteration_limit, &clock);
                    break;
                }
            };

            if objective > self.best_objective + self.settings.improvement_tolerance {
                self.best_objective = objective;
                self.best_flows = Some(flows);
            }
            info!(
                iteration = self.iteration,
                status = %outcome.status,
                objective,
                best = self.best_objective,
                "iteration finished"
            );
            self.record(outcome.status, Some(objective), iteration_limit, &clock);

            if self.iteration >= 2 && self.has_stalled() {
                debug!(best = self.best_objective, "objective stalled");
                self.state = RefinementState::Converged;
            }
            self.second_last = self.last;
            self.last = self.best_objective;
            self.iteration += 1;

            if self.state == RefinementState::Running && self.settings.iterative {
                self.scheme.adapt();
            }
        }

        info!(
            state = ?self.state,
            iterations = self.iteration,
            best = self.best_objective,
            "refinement finished"
        );
        Ok(RefinementOutcome {
            state: self.state,
            iterations: self.iteration,
            best_objective: self.best_flows.as_ref().map(|_| self.best_objective),
            best_flows: self.best_flows,
            history: self.history,
            elapsed: clock.elapsed(),
        })
    }

    fn has_stalled(&self) -> bool {
        let best = self.best_objective;
        (best != 0.0 && ((best - self.second_last) / best).abs() <= CONVERGENCE_GAP)
            || best == self.second_last
    }

    fn record(
        &mut self,
        status: ModelStatus,
        objective: Option<f64>,
        time_limit: f64,
        clock: &Instant,
    ) {
        self.history.push(IterationRecord {
            iteration: self.iteration,
            status,
            objective,
            best: self.best_objective,
            time_limit,
            elapsed: clock.elapsed().as_secs_f64(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::SolveOutcome;
    use pool_core::{PoolError, Table};
    use pool_solver::{SolveRequest, SolveResponse, SolverError, SolverResult};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    struct NoSolver;

    impl Solver for NoSolver {
        fn id(&self) -> &'static str {
            "none"
        }

        fn solve(&self, _request: &SolveRequest<'_>) -> SolverResult<SolveResponse> {
            Err(SolverError::Backend("scripted schemes never call the solver".into()))
        }
    }

    #[derive(Default)]
    struct Calls {
        solves: usize,
        adapts: usize,
        limits: Vec<Duration>,
    }

    /// Replays a fixed list of outcomes.
    struct Scripted {
        outcomes: VecDeque<PoolResult<SolveOutcome>>,
        calls: Rc<RefCell<Calls>>,
    }

    impl DiscretizedProblem for Scripted {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        fn initialize(&mut self) {}

        fn solve(
            &mut self,
            _solver: &dyn Solver,
            time_limit: Duration,
            _gap: f64,
        ) -> PoolResult<SolveOutcome> {
            let mut calls = self.calls.borrow_mut();
            calls.solves += 1;
            calls.limits.push(time_limit);
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Ok(SolveOutcome::not_solved(ModelStatus::Other)))
        }

        fn adapt(&mut self) {
            self.calls.borrow_mut().adapts += 1;
        }
    }

    fn solved(objective: f64) -> SolveOutcome {
        SolveOutcome {
            status: ModelStatus::Optimal,
            objective: Some(objective),
            flows: Some(PipeFlows {
                source_pool: Table::filled(1, 1, objective),
                source_demand: Table::filled(1, 1, 0.0),
                pool_demand: Table::filled(1, 1, objective),
            }),
        }
    }

    fn settings() -> RefinementSettings {
        RefinementSettings {
            time_limit: 3600.0,
            iteration_limit: 1200.0,
            gap: 1e-4,
            improvement_tolerance: 1e-6,
            iterative: true,
        }
    }

    fn run(
        outcomes: Vec<SolveOutcome>,
        settings: RefinementSettings,
    ) -> (RefinementOutcome, Rc<RefCell<Calls>>) {
        run_results(outcomes.into_iter().map(Ok).collect(), settings)
    }

    fn run_results(
        outcomes: Vec<PoolResult<SolveOutcome>>,
        settings: RefinementSettings,
    ) -> (RefinementOutcome, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let scheme = Scripted {
            outcomes: outcomes.into(),
            calls: Rc::clone(&calls),
        };
        let outcome = RefinementSession::new(Box::new(scheme), settings)
            .run(&NoSolver)
            .unwrap();
        (outcome, calls)
    }

    #[test]
    fn constant_objective_converges_after_three_solves() {
        let (outcome, calls) = run(vec![solved(50.0); 5], settings());
        assert_eq!(outcome.state, RefinementState::Converged);
        assert_eq!(calls.borrow().solves, 3);
        assert_eq!(calls.borrow().adapts, 2);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.best_objective, Some(50.0));
        assert_eq!(outcome.history.len(), 3);
    }

    #[test]
    fn improving_objective_keeps_refining() {
        let script = vec![
            solved(10.0),
            solved(20.0),
            solved(30.0),
            solved(40.0),
            solved(40.0),
            solved(40.0),
        ];
        let (outcome, calls) = run(script, settings());
        assert_eq!(outcome.state, RefinementState::Converged);
        assert_eq!(calls.borrow().solves, 6);
        assert_eq!(outcome.best_objective, Some(40.0));
    }

    #[test]
    fn worse_solution_does_not_replace_incumbent() {
        let script = vec![solved(30.0), solved(10.0), solved(20.0)];
        let (outcome, calls) = run(script, settings());
        assert_eq!(calls.borrow().solves, 3);
        assert_eq!(outcome.best_objective, Some(30.0));
        let flows = outcome.best_flows.unwrap();
        assert_eq!(flows.source_pool.at(0, 0), 30.0);
        assert_eq!(outcome.history[1].best, 30.0);
    }

    #[test]
    fn infeasible_solve_ends_loop() {
        let script = vec![
            solved(10.0),
            SolveOutcome::not_solved(ModelStatus::Infeasible),
        ];
        let (outcome, calls) = run(script, settings());
        assert_eq!(outcome.state, RefinementState::Infeasible);
        assert_eq!(calls.borrow().solves, 2);
        assert_eq!(outcome.best_objective, Some(10.0));
    }

    #[test]
    fn unsolved_first_iteration_has_no_incumbent() {
        let script = vec![SolveOutcome::not_solved(ModelStatus::Other)];
        let (outcome, _) = run(script, settings());
        assert_eq!(outcome.state, RefinementState::Converged);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.best_objective.is_none());
        assert!(outcome.best_flows.is_none());
    }

    #[test]
    fn zero_objective_is_never_stored() {
        let (outcome, calls) = run(vec![solved(0.0); 4], settings());
        assert_eq!(outcome.state, RefinementState::Converged);
        assert_eq!(calls.borrow().solves, 3);
        assert!(outcome.best_objective.is_none());
    }

    #[test]
    fn solver_error_keeps_incumbent() {
        let script = vec![
            Ok(solved(400.0)),
            Err(PoolError::Solver("backend crashed".to_string())),
        ];
        let (outcome, calls) = run_results(script, settings());
        assert_eq!(outcome.state, RefinementState::Converged);
        assert_eq!(calls.borrow().solves, 2);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.best_objective, Some(400.0));
        assert!(outcome.best_flows.is_some());
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.history[1].status, ModelStatus::Other);
        assert!(outcome.history[1].objective.is_none());
    }

    #[test]
    fn rounding_noise_is_not_an_improvement() {
        let (outcome, _) = run(vec![solved(1.4e-13); 4], settings());
        assert!(outcome.best_objective.is_none());
        assert!(outcome.best_flows.is_none());

        let script = vec![solved(50.0), solved(50.0 + 1e-9), solved(50.0)];
        let (outcome, _) = run(script, settings());
        assert_eq!(outcome.best_objective, Some(50.0));
    }

    #[test]
    fn short_budget_times_out_before_solving() {
        let settings = RefinementSettings {
            time_limit: 10.0,
            iteration_limit: 10.0,
            ..settings()
        };
        let (outcome, calls) = run(vec![solved(1.0)], settings);
        assert_eq!(outcome.state, RefinementState::TimedOut);
        assert_eq!(calls.borrow().solves, 0);
    }

    #[test]
    fn iteration_limit_is_capped_by_remaining_budget() {
        let settings = RefinementSettings {
            time_limit: 100.0,
            iteration_limit: 100.0,
            ..settings()
        };
        let (_, calls) = run(vec![solved(5.0); 3], settings);
        let limits = &calls.borrow().limits;
        assert!(limits.iter().all(|l| *l <= Duration::from_secs(90)));
    }

    #[test]
    fn non_iterative_solves_once() {
        let settings = RefinementSettings {
            iterative: false,
            ..settings()
        };
        let (outcome, calls) = run(vec![solved(7.0), solved(9.0)], settings);
        assert_eq!(outcome.state, RefinementState::Converged);
        assert_eq!(calls.borrow().solves, 1);
        assert_eq!(calls.borrow().adapts, 0);
        assert_eq!(outcome.best_objective, Some(7.0));
    }
}
