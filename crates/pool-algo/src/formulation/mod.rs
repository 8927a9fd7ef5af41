//! Base MILP formulations of the pooling problem.
//!
//! Both forms share the path flow variables `FL_PR(s,p,d)` and the
//! specification rows; they differ in which flows and proportions are
//! modelled explicitly:
//!
//! | Form | Flows | Proportions | Bilinear term |
//! |------|-------|-------------|---------------|
//! | TP | `FL(s,p)`, `FL(s,d)` | `PR(p,d)` | `FL_PR = FL(s,p)·PR(p,d)` |
//! | PQ | `FL(s,d)`, `FL(p,d)` | `PR(s,p)` | `FL_PR = PR(s,p)·FL(p,d)` |
//!
//! The builders add everything except the bilinear coupling, which each
//! discretization scheme replaces with its own linear rows.

pub mod pq;
pub mod tp;

use pool_core::{Cube, NetworkModel, PipeFlows, PipeTable, Table};
use pool_solver::{LinearExpr, MilpModel, Sense, SolveResponse, VarId};

use crate::config::Formulation;

pub use pq::PqVars;
pub use tp::TpVars;

/// Variables of a built base formulation.
#[derive(Debug, Clone)]
pub enum BaseVars {
    Tp(TpVars),
    Pq(PqVars),
}

impl BaseVars {
    pub fn build(network: &NetworkModel, formulation: Formulation, model: &mut MilpModel) -> Self {
        match formulation {
            Formulation::Tp => BaseVars::Tp(tp::build(network, model)),
            Formulation::Pq => BaseVars::Pq(pq::build(network, model)),
        }
    }

    pub fn fl_pr(&self) -> &Cube<VarId> {
        match self {
            BaseVars::Tp(vars) => &vars.fl_pr,
            BaseVars::Pq(vars) => &vars.fl_pr,
        }
    }

    /// Flow from source `s` into pool `p`.
    pub fn pool_inflow(&self, s: usize, p: usize) -> LinearExpr {
        match self {
            BaseVars::Tp(vars) => LinearExpr::new().term(vars.fl_sp.at(s, p), 1.0),
            BaseVars::Pq(vars) => {
                let (_, _, n_d) = vars.fl_pr.dims();
                (0..n_d).map(|d| (vars.fl_pr.at(s, p, d), 1.0)).collect()
            }
        }
    }

    pub fn extract_flows(&self, network: &NetworkModel, response: &SolveResponse) -> PipeFlows {
        match self {
            BaseVars::Tp(vars) => vars.extract_flows(network, response),
            BaseVars::Pq(vars) => vars.extract_flows(network, response),
        }
    }
}

/// One flow variable per pipe slot, fixed to 0 where the pipe is missing.
pub(crate) fn pipe_vars(model: &mut MilpModel, family: &str, pipes: &PipeTable) -> Table<VarId> {
    Table::from_fn(pipes.rows(), pipes.cols(), |r, c| {
        let var = model.add_continuous(family, &[r, c], 0.0, pipes.capacity(r, c));
        if !pipes.exists(r, c) {
            model.fix(var, 0.0);
        }
        var
    })
}

/// `FL_PR(s,p,d)`, fixed to 0 unless both pipes of the path exist.
pub(crate) fn path_vars(model: &mut MilpModel, network: &NetworkModel) -> Cube<VarId> {
    let sp = network.source_pool();
    let pd = network.pool_demand();
    Cube::from_fn(
        network.num_sources(),
        network.num_pools(),
        network.num_demands(),
        |s, p, d| {
            let upper = sp.capacity(s, p).min(pd.capacity(p, d));
            let var = model.add_continuous("FL_PR", &[s, p, d], 0.0, upper);
            if !(sp.exists(s, p) && pd.exists(p, d)) {
                model.fix(var, 0.0);
            }
            var
        },
    )
}

/// Quality rows: for each active bound `b` of demand `d` and contaminant `k`,
/// `Σ_s (c(s,k) - b)·delivered(s,d)` is `>= 0` (minimum) or `<= 0` (maximum).
pub(crate) fn add_spec_rows(
    model: &mut MilpModel,
    network: &NetworkModel,
    delivered: impl Fn(usize, usize) -> LinearExpr,
) {
    for (d, demand) in network.demands().iter().enumerate() {
        let inflows: Vec<LinearExpr> = (0..network.num_sources())
            .map(|s| delivered(s, d))
            .collect();

        for k in 0..network.num_contaminants() {
            let bounds = [
                ("spec_min", demand.active_min[k], demand.min_quality[k], Sense::Ge),
                ("spec_max", demand.active_max[k], demand.max_quality[k], Sense::Le),
            ];
            for (family, active, bound, sense) in bounds {
                if !active {
                    continue;
                }
                let mut expr = LinearExpr::new();
                for (s, inflow) in inflows.iter().enumerate() {
                    let factor = network.sources()[s].quality[k] - bound;
                    expr.add_scaled(inflow, factor);
                }
                model.add_row(format!("{}[{},{}]", family, d, k), expr, sense, 0.0);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use pool_core::instance::{RawDemand, RawInstance, RawPool, RawSource};
    use pool_core::NetworkModel;

    fn pipes(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    /// Haverly's first instance: optimum 400.
    pub fn haverly1() -> NetworkModel {
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

    /// One source, one pool, one demand.
    pub fn chain(source_quality: f64, min_quality: f64) -> NetworkModel {
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
}
