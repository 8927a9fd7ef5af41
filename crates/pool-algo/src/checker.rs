//! Independent feasibility check of candidate pipe flows.
//!
//! Two checks run on every candidate; either one passing certifies it:
//!
//! 1. **Resolve check.** The flows are fixed in the PQ program. With
//!    `FL(p,d)` fixed the coupling `FL_PR = PR(s,p)·FL(p,d)` is linear in
//!    `PR`, so the remaining problem is an LP that the backend settles.
//! 2. **Constraint check.** Proportions and path flows are reconstructed
//!    from the pipe flows and every PQ constraint family is evaluated against
//!    the unpreprocessed capacities, within the checker tolerance.

use std::fmt;
use std::time::Duration;

use pool_core::{Cube, InUnit, NetworkModel, OutUnit, PipeFlows, PoolResult, Table};
use pool_solver::{MilpModel, Solver};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::discretization::submit;
use crate::formulation::pq;

/// Constraint family a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    Bilinear,
    ProportionSum,
    SpecMax,
    SpecMin,
    /// Source outflow
    Capacity1,
    /// Pool outflow
    Capacity2,
    /// Demand inflow
    Capacity3,
    /// Pipe flow
    Capacity4,
    /// Pipe flow sign
    NonNeg1,
    /// Path flow sign
    NonNeg2,
    /// Proportion sign
    NonNeg3,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ViolationKind::Bilinear => "Bilinear",
            ViolationKind::ProportionSum => "Proportion Sum",
            ViolationKind::SpecMax => "SpecMax",
            ViolationKind::SpecMin => "SpecMin",
            ViolationKind::Capacity1 => "Capacity1",
            ViolationKind::Capacity2 => "Capacity2",
            ViolationKind::Capacity3 => "Capacity3",
            ViolationKind::Capacity4 => "Capacity4",
            ViolationKind::NonNeg1 => "NonNeg1",
            ViolationKind::NonNeg2 => "NonNeg2",
            ViolationKind::NonNeg3 => "NonNeg3",
        };
        f.write_str(tag)
    }
}

/// One violated constraint, named by the units it involves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub entities: Vec<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Not feasible: {}", self.kind)?;
        for entity in &self.entities {
            write!(f, " {}", entity)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckVerdict {
    Solved,
    CheckerInfeasible,
}

impl fmt::Display for CheckVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckVerdict::Solved => write!(f, "Solved"),
            CheckVerdict::CheckerInfeasible => write!(f, "Checker infeasible"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub verdict: CheckVerdict,
    pub resolve_passed: bool,
    pub constraints_passed: bool,
    /// Objective recomputed from the pipe flows
    pub objective: f64,
    pub violations: Vec<Violation>,
}

impl CheckReport {
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }
}

/// Proportions and path flows implied by a set of pipe flows.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// `PR(p,s)`
    pub proportions: Table<f64>,
    /// `FL_PR(s,p,d)`
    pub path_flows: Cube<f64>,
}

impl Reconstruction {
    pub fn from_flows(network: &NetworkModel, flows: &PipeFlows) -> Self {
        let (n_s, n_p, n_d) = (
            network.num_sources(),
            network.num_pools(),
            network.num_demands(),
        );
        let mut proportions = Table::filled(n_p, n_s, 0.0);
        for p in 0..n_p {
            let inflow = flows.pool_inflow(p);
            if inflow > 0.0 {
                for s in 0..n_s {
                    proportions.set(p, s, flows.source_pool.at(s, p) / inflow);
                }
            } else if n_s > 0 {
                proportions.set(p, 0, 1.0);
            }
        }
        let path_flows = Cube::from_fn(n_s, n_p, n_d, |s, p, d| {
            proportions.at(p, s) * flows.pool_demand.at(p, d)
        });
        Self {
            proportions,
            path_flows,
        }
    }
}

pub struct FeasibilityChecker<'a> {
    network: &'a NetworkModel,
    tolerance: f64,
    time_limit: Duration,
    gap: f64,
}

impl<'a> FeasibilityChecker<'a> {
    pub fn new(network: &'a NetworkModel, tolerance: f64, time_limit: Duration, gap: f64) -> Self {
        Self {
            network,
            tolerance,
            time_limit,
            gap,
        }
    }

    pub fn from_config(network: &'a NetworkModel, config: &RunConfig) -> Self {
        Self::new(
            network,
            config.checker_tolerance,
            config.checker_duration(),
            config.gap,
        )
    }

    /// Run both checks on `flows`, which claim objective `claimed`.
    pub fn check(&self, solver: &dyn Solver, flows: &PipeFlows, claimed: f64) -> CheckReport {
        let rebuilt = Reconstruction::from_flows(self.network, flows);

        let resolve_passed = match self.resolve(solver, flows, &rebuilt) {
            Ok(Some(objective)) => (objective - claimed).abs() <= self.tolerance,
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "resolve check failed to run");
                false
            }
        };

        let violations = self.violations(flows, &rebuilt);
        for violation in &violations {
            warn!("{}", violation);
        }
        let objective = flows.objective(self.network);
        let constraints_passed =
            violations.is_empty() && (objective - claimed).abs() <= self.tolerance;

        debug!(resolve_passed, constraints_passed, objective, claimed, "checked candidate");
        CheckReport {
            verdict: if resolve_passed || constraints_passed {
                CheckVerdict::Solved
            } else {
                CheckVerdict::CheckerInfeasible
            },
            resolve_passed,
            constraints_passed,
            objective,
            violations,
        }
    }

    /// Objective of the fixed-flow PQ program, `None` when it is not solved.
    fn resolve(
        &self,
        solver: &dyn Solver,
        flows: &PipeFlows,
        rebuilt: &Reconstruction,
    ) -> PoolResult<Option<f64>> {
        let network = self.network;
        let mut model = MilpModel::new(format!("{}-checker", network.name()));
        let vars = pq::build(network, &mut model);

        for ((s, d), var) in vars.fl_sd.iter() {
            model.fix(*var, flows.source_demand.at(s, d));
        }
        for ((p, d), var) in vars.fl_pd.iter() {
            model.fix(*var, flows.pool_demand.at(p, d));
        }
        let (n_s, n_p, n_d) = vars.fl_pr.dims();
        for s in 0..n_s {
            for p in 0..n_p {
                for d in 0..n_d {
                    model.fix(vars.fl_pr.at(s, p, d), rebuilt.path_flows.at(s, p, d));
                }
            }
        }
        vars.add_fixed_outflow_coupling(&mut model, &flows.pool_demand);

        let response = submit(solver, &model, self.time_limit, self.gap)?;
        Ok(response
            .objective
            .filter(|_| response.status.is_solved() && response.has_solution()))
    }

    /// Every violated constraint, in a fixed order.
    pub fn violations(&self, flows: &PipeFlows, rebuilt: &Reconstruction) -> Vec<Violation> {
        let network = self.network;
        let tol = self.tolerance;
        let is_equal = |lhs: f64, rhs: f64| lhs - tol <= rhs && rhs <= lhs + tol;
        let is_leq = |lhs: f64, rhs: f64| lhs - tol <= rhs;

        let sources = network.sources();
        let pools = network.pools();
        let demands = network.demands();
        let mut found = Vec::new();
        let mut flag = |kind: ViolationKind, entities: &[&str]| {
            found.push(Violation {
                kind,
                entities: entities.iter().map(|e| e.to_string()).collect(),
            });
        };

        for (s, source) in sources.iter().enumerate() {
            for (p, pool) in pools.iter().enumerate() {
                for (d, demand) in demands.iter().enumerate() {
                    let product = rebuilt.proportions.at(p, s) * flows.pool_demand.at(p, d);
                    if !is_equal(rebuilt.path_flows.at(s, p, d), product) {
                        flag(
                            ViolationKind::Bilinear,
                            &[source.name.as_str(), pool.name.as_str(), demand.name.as_str()],
                        );
                    }
                }
            }
        }

        for (p, pool) in pools.iter().enumerate() {
            let total: f64 = rebuilt.proportions.row(p).iter().sum();
            if !is_equal(total, 1.0) {
                flag(ViolationKind::ProportionSum, &[pool.name.as_str()]);
            }
        }

        for (d, demand) in demands.iter().enumerate() {
            for (k, contaminant) in network.contaminants().iter().enumerate() {
                let mut load = 0.0;
                let mut volume = 0.0;
                for (s, source) in sources.iter().enumerate() {
                    let delivered = flows.source_demand.at(s, d)
                        + (0..pools.len())
                            .map(|p| rebuilt.path_flows.at(s, p, d))
                            .sum::<f64>();
                    load += source.quality[k] * delivered;
                    volume += delivered;
                }
                if demand.active_max[k] && !is_leq(load, volume * demand.max_quality[k]) {
                    flag(ViolationKind::SpecMax, &[demand.name.as_str(), contaminant.as_str()]);
                }
                if demand.active_min[k] && !is_leq(-load, -volume * demand.min_quality[k]) {
                    flag(ViolationKind::SpecMin, &[demand.name.as_str(), contaminant.as_str()]);
                }
            }
        }

        for (s, source) in sources.iter().enumerate() {
            if !is_leq(flows.source_outflow(s), source.raw_capacity) {
                flag(ViolationKind::Capacity1, &[source.name.as_str()]);
            }
        }
        for (p, pool) in pools.iter().enumerate() {
            if !is_leq(flows.pool_outflow(p), pool.raw_capacity) {
                flag(ViolationKind::Capacity2, &[pool.name.as_str()]);
            }
        }
        for (d, demand) in demands.iter().enumerate() {
            if !is_leq(flows.demand_inflow(d), demand.raw_capacity) {
                flag(ViolationKind::Capacity3, &[demand.name.as_str()]);
            }
        }

        let pipe_flow = |from: OutUnit, to: InUnit| match (from, to) {
            (OutUnit::Source(s), InUnit::Pool(p)) => flows.source_pool.at(s.value(), p.value()),
            (OutUnit::Source(s), InUnit::Demand(d)) => {
                flows.source_demand.at(s.value(), d.value())
            }
            (OutUnit::Pool(p), InUnit::Demand(d)) => flows.pool_demand.at(p.value(), d.value()),
            (OutUnit::Pool(_), InUnit::Pool(_)) => 0.0,
        };
        for from in network.out_units() {
            for to in network.in_units() {
                if !is_leq(pipe_flow(from, to), network.pipe_capacity(from, to)) {
                    flag(
                        ViolationKind::Capacity4,
                        &[network.out_name(from), network.in_name(to)],
                    );
                }
            }
        }
        for from in network.out_units() {
            for to in network.in_units() {
                if !is_leq(-pipe_flow(from, to), 0.0) {
                    flag(
                        ViolationKind::NonNeg1,
                        &[network.out_name(from), network.in_name(to)],
                    );
                }
            }
        }

        for (s, source) in sources.iter().enumerate() {
            for (p, pool) in pools.iter().enumerate() {
                for (d, demand) in demands.iter().enumerate() {
                    if !is_leq(-rebuilt.path_flows.at(s, p, d), 0.0) {
                        flag(
                            ViolationKind::NonNeg2,
                            &[source.name.as_str(), pool.name.as_str(), demand.name.as_str()],
                        );
                    }
                }
            }
        }
        for (p, pool) in pools.iter().enumerate() {
            for (s, source) in sources.iter().enumerate() {
                if !is_leq(-rebuilt.proportions.at(p, s), 0.0) {
                    flag(ViolationKind::NonNeg3, &[pool.name.as_str(), source.name.as_str()]);
                }
            }
        }

        found
    }
}
