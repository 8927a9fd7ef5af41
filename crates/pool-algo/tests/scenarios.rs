//! End-to-end runs on small instances with the default backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pool_algo::{
    run, run_with_solver, DiscType, DiscVariant, Formulation, RefinementState, RunConfig,
    TerminalStatus,
};
use pool_core::instance::{RawDemand, RawInstance, RawPool, RawSource};
use pool_core::NetworkModel;
use pool_solver::{
    GoodLpSolver, ModelStatus, SolveRequest, SolveResponse, Solver, SolverError, SolverKind,
    SolverResult,
};

/// Proves every model infeasible.
struct InfeasibleSolver;

impl Solver for InfeasibleSolver {
    fn id(&self) -> &'static str {
        "infeasible"
    }

    fn solve(&self, _request: &SolveRequest<'_>) -> SolverResult<SolveResponse> {
        Ok(SolveResponse::without_solution(ModelStatus::Infeasible, Duration::ZERO))
    }
}

/// Solves the first `healthy` models, then fails.
struct FailingAfter {
    healthy: usize,
    calls: AtomicUsize,
    inner: GoodLpSolver,
}

impl Solver for FailingAfter {
    fn id(&self) -> &'static str {
        "failing-after"
    }

    fn solve(&self, request: &SolveRequest<'_>) -> SolverResult<SolveResponse> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.healthy {
            self.inner.solve(request)
        } else {
            Err(SolverError::Backend("lost connection to backend".to_string()))
        }
    }
}

fn pipes(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

fn haverly1() -> NetworkModel {
    let raw = RawInstance {
        name: "haverly1".to_string(),
        contaminants: vec!["sulfur".to_string()],
        sources: vec![
            RawSource::new("s1", 300.0, 6.0, vec![3.0]),
            RawSource::new("s2", 300.0, 16.0, vec![1.0]),
            RawSource::new("s3", 300.0, 10.0, vec![2.0]),
        ],
        pools: vec![RawPool::new("p1", 300.0)],
        demands: vec![
            RawDemand::new("d1", 100.0, 9.0, vec![0.0], vec![2.5]),
            RawDemand::new("d2", 200.0, 15.0, vec![0.0], vec![1.5]),
        ],
        pipes: pipes(&[
            ("s1", "p1"),
            ("s2", "p1"),
            ("p1", "d1"),
            ("p1", "d2"),
            ("s3", "d1"),
            ("s3", "d2"),
        ]),
    };
    NetworkModel::from_raw(&raw).unwrap()
}

fn chain(source_quality: f64, min_quality: f64) -> NetworkModel {
    let raw = RawInstance {
        name: "chain".to_string(),
        contaminants: vec!["k".to_string()],
        sources: vec![RawSource::new("s1", 100.0, 1.0, vec![source_quality])],
        pools: vec![RawPool::new("p1", 80.0)],
        demands: vec![RawDemand::new(
            "d1",
            50.0,
            3.0,
            vec![min_quality],
            vec![10.0],
        )],
        pipes: pipes(&[("s1", "p1"), ("p1", "d1")]),
    };
    NetworkModel::from_raw(&raw).unwrap()
}

fn config(formulation: Formulation, variant: DiscVariant) -> RunConfig {
    RunConfig {
        formulation,
        variant,
        time_limit: 60.0,
        iteration_limit: 20.0,
        ..RunConfig::default()
    }
}

#[test]
fn tp_proportion_finds_haverly_optimum() {
    let report = run(&haverly1(), &config(Formulation::Tp, DiscVariant::Proportion)).unwrap();
    assert_eq!(report.status, TerminalStatus::Solved);
    assert!((report.objective.unwrap() - 400.0).abs() < 0.04);
    assert_eq!(report.refinement, RefinementState::Converged);
    assert!(report.checker_messages.is_empty());
}

#[test]
fn tp_pool_finds_haverly_optimum() {
    let report = run(&haverly1(), &config(Formulation::Tp, DiscVariant::Pool)).unwrap();
    assert_eq!(report.status, TerminalStatus::Solved);
    assert!((report.objective.unwrap() - 400.0).abs() < 0.04);
}

#[test]
fn pq_pool_finds_haverly_optimum() {
    let report = run(&haverly1(), &config(Formulation::Pq, DiscVariant::Pool)).unwrap();
    assert_eq!(report.status, TerminalStatus::Solved);
    assert!((report.objective.unwrap() - 400.0).abs() < 0.04);
    assert!(report
        .flows
        .iter()
        .any(|f| f.from == "p1" && f.to == "d2" && (f.flow - 100.0).abs() < 1e-4));
}

#[test]
fn tp_flow_returns_a_feasible_blend() {
    let report = run(&haverly1(), &config(Formulation::Tp, DiscVariant::Flow)).unwrap();
    assert_eq!(report.status, TerminalStatus::Solved);
    let objective = report.objective.unwrap();
    assert!(objective > 0.0 && objective <= 400.0 + 1e-4);
}

#[test]
fn chain_is_limited_by_demand_capacity() {
    let report = run(&chain(1.0, 0.0), &config(Formulation::Tp, DiscVariant::Proportion)).unwrap();
    assert_eq!(report.status, TerminalStatus::Solved);
    assert!((report.objective.unwrap() - 100.0).abs() < 0.01);
    assert_eq!(report.iterations, 3);

    let into_demand = report
        .flows
        .iter()
        .find(|f| f.from == "p1" && f.to == "d1")
        .unwrap();
    assert!((into_demand.flow - 50.0).abs() < 0.01);
}

#[test]
fn unattainable_quality_is_not_solved() {
    let report = run(&chain(1.0, 2.0), &config(Formulation::Tp, DiscVariant::Proportion)).unwrap();
    assert_eq!(report.status, TerminalStatus::NotSolved);
    assert!(report.objective.is_none());
    assert!(report.flows.is_empty());
}

#[test]
fn non_iterative_run_solves_once() {
    let config = RunConfig {
        disc_type: DiscType::NonIterative,
        ..config(Formulation::Tp, DiscVariant::Proportion)
    };
    let report = run(&haverly1(), &config).unwrap();
    assert_eq!(report.iterations, 1);
    assert_eq!(report.status, TerminalStatus::Solved);
    assert!((report.objective.unwrap() - 400.0).abs() < 0.04);
}

#[test]
fn report_serializes_status_labels() {
    let report = run(&chain(1.0, 2.0), &config(Formulation::Tp, DiscVariant::Proportion)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "Not solved");
    assert!(json["dual_bound"].is_null());
    assert_eq!(json["config"]["variant"], "proportion");
}

#[test]
fn proven_infeasible_model_ends_infeasible() {
    let config = config(Formulation::Tp, DiscVariant::Proportion);
    let report = run_with_solver(&haverly1(), &config, &InfeasibleSolver).unwrap();
    assert_eq!(report.status, TerminalStatus::Infeasible);
    assert_eq!(report.refinement, RefinementState::Infeasible);
    assert!(report.objective.is_none());
    assert!(report.flows.is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "Infeasible");
}

#[test]
fn backend_failure_keeps_first_solution() {
    let solver = FailingAfter {
        healthy: 1,
        calls: AtomicUsize::new(0),
        inner: GoodLpSolver::new(SolverKind::Microlp),
    };
    let config = config(Formulation::Tp, DiscVariant::Proportion);
    let report = run_with_solver(&haverly1(), &config, &solver).unwrap();

    assert_eq!(report.iterations, 1);
    assert!((report.objective.unwrap() - 400.0).abs() < 0.04);
    assert!(!report.flows.is_empty());
    // the resolve check fails with the backend, the constraint check still certifies
    assert_eq!(report.status, TerminalStatus::Solved);
}
