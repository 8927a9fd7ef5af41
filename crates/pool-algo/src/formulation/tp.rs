//! Total-flow (TP) base formulation.

use pool_core::{Cube, NetworkModel, PipeFlows, Table};
use pool_solver::{LinearExpr, MilpModel, Sense, SolveResponse, VarId};

use super::{add_spec_rows, path_vars, pipe_vars};

/// Variables of the TP form.
#[derive(Debug, Clone)]
pub struct TpVars {
    /// `FL(s,p)`
    pub fl_sp: Table<VarId>,
    /// `FL(s,d)`
    pub fl_sd: Table<VarId>,
    /// `FL_PR(s,p,d)`
    pub fl_pr: Cube<VarId>,
    /// `PR(p,d)`: share of the outflow of `p` sent to `d`
    pub pr: Table<VarId>,
}

/// Add the TP variables, rows and objective to `model`.
pub fn build(network: &NetworkModel, model: &mut MilpModel) -> TpVars {
    let (n_s, n_p, n_d) = (
        network.num_sources(),
        network.num_pools(),
        network.num_demands(),
    );
    let pd = network.pool_demand();

    let fl_sp = pipe_vars(model, "FL_SP", network.source_pool());
    let fl_sd = pipe_vars(model, "FL_SD", network.source_demand());
    let fl_pr = path_vars(model, network);
    let pr = Table::from_fn(n_p, n_d, |p, d| {
        let var = model.add_continuous("PR", &[p, d], 0.0, 1.0);
        if !pd.exists(p, d) {
            model.fix(var, 0.0);
        }
        var
    });

    for s in 0..n_s {
        let out: LinearExpr = (0..n_p)
            .map(|p| (fl_sp.at(s, p), 1.0))
            .chain((0..n_d).map(|d| (fl_sd.at(s, d), 1.0)))
            .collect();
        model.add_row(format!("cap_source[{}]", s), out, Sense::Le, network.sources()[s].capacity);
    }
    for p in 0..n_p {
        let inflow: LinearExpr = (0..n_s).map(|s| (fl_sp.at(s, p), 1.0)).collect();
        model.add_row(format!("cap_pool[{}]", p), inflow, Sense::Le, network.pools()[p].capacity);
    }
    for d in 0..n_d {
        let mut inflow: LinearExpr = (0..n_s).map(|s| (fl_sd.at(s, d), 1.0)).collect();
        for s in 0..n_s {
            for p in 0..n_p {
                inflow.add_term(fl_pr.at(s, p, d), 1.0);
            }
        }
        model.add_row(format!("cap_demand[{}]", d), inflow, Sense::Le, network.demands()[d].capacity);
    }
    for p in 0..n_p {
        for d in 0..n_d {
            let through: LinearExpr = (0..n_s).map(|s| (fl_pr.at(s, p, d), 1.0)).collect();
            model.add_row(format!("cap_pipe[{},{}]", p, d), through, Sense::Le, pd.capacity(p, d));
        }
    }

    for p in 0..n_p {
        if network.has_outlet(p) {
            let shares: LinearExpr = (0..n_d).map(|d| (pr.at(p, d), 1.0)).collect();
            model.add_row(format!("pr_sum[{}]", p), shares, Sense::Eq, 1.0);
        }
    }

    add_spec_rows(model, network, |s, d| {
        let mut delivered = LinearExpr::new().term(fl_sd.at(s, d), 1.0);
        for p in 0..n_p {
            delivered.add_term(fl_pr.at(s, p, d), 1.0);
        }
        delivered
    });

    // valid inequalities
    for s in 0..n_s {
        for p in 0..n_p {
            let mut split: LinearExpr = (0..n_d).map(|d| (fl_pr.at(s, p, d), 1.0)).collect();
            split.add_term(fl_sp.at(s, p), -1.0);
            model.add_row(format!("path_split[{},{}]", s, p), split, Sense::Eq, 0.0);
        }
    }
    for p in 0..n_p {
        let cap = network.pools()[p].capacity;
        for d in 0..n_d {
            let mut share: LinearExpr = (0..n_s).map(|s| (fl_pr.at(s, p, d), 1.0)).collect();
            share.add_term(pr.at(p, d), -cap);
            model.add_row(format!("pr_cap[{},{}]", p, d), share, Sense::Le, 0.0);
        }
    }

    let sp_cost = network.source_pool();
    let sd_cost = network.source_demand();
    let mut objective: LinearExpr = fl_sd
        .iter()
        .map(|((s, d), var)| (*var, sd_cost.cost(s, d)))
        .collect();
    for s in 0..n_s {
        for p in 0..n_p {
            for d in 0..n_d {
                objective.add_term(fl_pr.at(s, p, d), sp_cost.cost(s, p) + pd.cost(p, d));
            }
        }
    }
    model.set_objective(objective);

    TpVars {
        fl_sp,
        fl_sd,
        fl_pr,
        pr,
    }
}

impl TpVars {
    /// Pool to demand flow is the sum of the path flows through the pool.
    pub fn extract_flows(&self, network: &NetworkModel, response: &SolveResponse) -> PipeFlows {
        let n_s = network.num_sources();
        let mut flows = PipeFlows::zeros(network);
        flows.source_pool = self.fl_sp.map(|v| response.value(*v));
        flows.source_demand = self.fl_sd.map(|v| response.value(*v));
        flows.pool_demand = Table::from_fn(network.num_pools(), network.num_demands(), |p, d| {
            (0..n_s).map(|s| response.value(self.fl_pr.at(s, p, d))).sum()
        });
        flows
    }
}
