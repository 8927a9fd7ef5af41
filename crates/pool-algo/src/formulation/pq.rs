//! Path-flow (PQ) base formulation.

use pool_core::{Cube, NetworkModel, PipeFlows, Table};
use pool_solver::{LinearExpr, MilpModel, Sense, SolveResponse, VarId};

use super::{add_spec_rows, path_vars, pipe_vars};

/// Variables of the PQ form.
#[derive(Debug, Clone)]
pub struct PqVars {
    /// `FL(s,d)`
    pub fl_sd: Table<VarId>,
    /// `FL(p,d)`
    pub fl_pd: Table<VarId>,
    /// `FL_PR(s,p,d)`
    pub fl_pr: Cube<VarId>,
    /// `PR(s,p)`: share of the inflow of `p` coming from `s`
    pub pr: Table<VarId>,
}

/// Add the PQ variables, rows and objective to `model`.
pub fn build(network: &NetworkModel, model: &mut MilpModel) -> PqVars {
    let (n_s, n_p, n_d) = (
        network.num_sources(),
        network.num_pools(),
        network.num_demands(),
    );
    let sp = network.source_pool();

    let fl_sd = pipe_vars(model, "FL_SD", network.source_demand());
    let fl_pd = pipe_vars(model, "FL_PD", network.pool_demand());
    let fl_pr = path_vars(model, network);
    let pr = Table::from_fn(n_s, n_p, |s, p| {
        let var = model.add_continuous("PR", &[s, p], 0.0, 1.0);
        if !sp.exists(s, p) {
            model.fix(var, 0.0);
        }
        var
    });

    for s in 0..n_s {
        let mut out: LinearExpr = (0..n_d).map(|d| (fl_sd.at(s, d), 1.0)).collect();
        for p in 0..n_p {
            for d in 0..n_d {
                out.add_term(fl_pr.at(s, p, d), 1.0);
            }
        }
        model.add_row(format!("cap_source[{}]", s), out, Sense::Le, network.sources()[s].capacity);
    }
    for p in 0..n_p {
        let out: LinearExpr = (0..n_d).map(|d| (fl_pd.at(p, d), 1.0)).collect();
        model.add_row(format!("cap_pool[{}]", p), out, Sense::Le, network.pools()[p].capacity);
    }
    for d in 0..n_d {
        let inflow: LinearExpr = (0..n_s)
            .map(|s| (fl_sd.at(s, d), 1.0))
            .chain((0..n_p).map(|p| (fl_pd.at(p, d), 1.0)))
            .collect();
        model.add_row(format!("cap_demand[{}]", d), inflow, Sense::Le, network.demands()[d].capacity);
    }
    for s in 0..n_s {
        for p in 0..n_p {
            let through: LinearExpr = (0..n_d).map(|d| (fl_pr.at(s, p, d), 1.0)).collect();
            model.add_row(format!("cap_pipe[{},{}]", s, p), through, Sense::Le, sp.capacity(s, p));
        }
    }

    for p in 0..n_p {
        if network.has_inlet(p) {
            let shares: LinearExpr = (0..n_s).map(|s| (pr.at(s, p), 1.0)).collect();
            model.add_row(format!("pr_sum[{}]", p), shares, Sense::Eq, 1.0);
        }
    }

    for p in 0..n_p {
        for d in 0..n_d {
            let mut path: LinearExpr = (0..n_s).map(|s| (fl_pr.at(s, p, d), 1.0)).collect();
            path.add_term(fl_pd.at(p, d), -1.0);
            model.add_row(format!("path[{},{}]", p, d), path, Sense::Eq, 0.0);
        }
    }

    add_spec_rows(model, network, |s, d| {
        let mut delivered = LinearExpr::new().term(fl_sd.at(s, d), 1.0);
        for p in 0..n_p {
            delivered.add_term(fl_pr.at(s, p, d), 1.0);
        }
        delivered
    });

    // valid inequality
    for s in 0..n_s {
        for p in 0..n_p {
            let cap = network.pools()[p].capacity;
            let mut share: LinearExpr = (0..n_d).map(|d| (fl_pr.at(s, p, d), 1.0)).collect();
            share.add_term(pr.at(s, p), -cap);
            model.add_row(format!("pr_cap[{},{}]", s, p), share, Sense::Le, 0.0);
        }
    }

    let sd = network.source_demand();
    let pd = network.pool_demand();
    let mut objective: LinearExpr = fl_sd
        .iter()
        .map(|((s, d), var)| (*var, sd.cost(s, d)))
        .chain(fl_pd.iter().map(|((p, d), var)| (*var, pd.cost(p, d))))
        .collect();
    for s in 0..n_s {
        for p in 0..n_p {
            for d in 0..n_d {
                objective.add_term(fl_pr.at(s, p, d), sp.cost(s, p));
            }
        }
    }
    model.set_objective(objective);

    PqVars {
        fl_sd,
        fl_pd,
        fl_pr,
        pr,
    }
}

impl PqVars {
    /// Source to pool flow is the sum of the path flows leaving the pipe.
    pub fn extract_flows(&self, network: &NetworkModel, response: &SolveResponse) -> PipeFlows {
        let n_d = network.num_demands();
        let mut flows = PipeFlows::zeros(network);
        flows.source_pool = Table::from_fn(network.num_sources(), network.num_pools(), |s, p| {
            (0..n_d).map(|d| response.value(self.fl_pr.at(s, p, d))).sum()
        });
        flows.source_demand = self.fl_sd.map(|v| response.value(*v));
        flows.pool_demand = self.fl_pd.map(|v| response.value(*v));
        flows
    }

    /// Add `FL_PR(s,p,d) = PR(s,p)·flow(p,d)` for fixed pool outflows, which
    /// makes the bilinear coupling linear in `PR`.
    pub fn add_fixed_outflow_coupling(&self, model: &mut MilpModel, pool_demand: &Table<f64>) {
        let (n_s, n_p, n_d) = self.fl_pr.dims();
        for s in 0..n_s {
            for p in 0..n_p {
                for d in 0..n_d {
                    let expr = LinearExpr::new()
                        .term(self.fl_pr.at(s, p, d), 1.0)
                        .term(self.pr.at(s, p), -pool_demand.at(p, d));
                    model.add_row(format!("bilinear[{},{},{}]", s, p, d), expr, Sense::Eq, 0.0);
                }
            }
        }
    }
}
