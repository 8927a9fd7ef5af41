//! Flow discretization of the TP form.
//!
//! `FL(s,p)` takes one breakpoint of its grid over `[0, FL_MAX(s,p)]`. The
//! proportions of the pool are disaggregated per breakpoint, `PR_DISC ≤ CHI`,
//! which turns `FL_PR = FL(s,p)·PR(p,d)` into `Σ_j FL_DISC(s,p,j)·PR_DISC(p,d,s,j)`.

use std::time::Duration;

use pool_core::{NetworkModel, PoolResult, Table};
use pool_solver::{LinearExpr, MilpModel, Sense, Solver, VarId};
use tracing::debug;

use super::{first_selected, submit, DiscretizedProblem, IntervalGrid, SchemeSettings, SolveOutcome};
use crate::formulation::tp;

pub struct FlowScheme<'a> {
    network: &'a NetworkModel,
    settings: SchemeSettings,
    grids: Table<IntervalGrid>,
    selection: Table<Option<usize>>,
}

impl<'a> FlowScheme<'a> {
    pub fn new(network: &'a NetworkModel, settings: SchemeSettings) -> Self {
        let mut scheme = Self {
            network,
            settings,
            grids: Table::filled(0, 0, IntervalGrid::new(2, 0.0)),
            selection: Table::filled(0, 0, None),
        };
        scheme.initialize();
        scheme
    }

    pub fn grid(&self, s: usize, p: usize) -> &IntervalGrid {
        self.grids.get(s, p)
    }

    fn build_model(&self) -> (MilpModel, tp::TpVars, Table<Vec<VarId>>) {
        let network = self.network;
        let sp = network.source_pool();
        let pd = network.pool_demand();
        let k = self.settings.disc_size;

        let mut model = MilpModel::new(format!("{}-tp-flow", network.name()));
        let base = tp::build(network, &mut model);

        let chi = Table::from_fn(network.num_sources(), network.num_pools(), |s, p| {
            let grid = self.grids.get(s, p);
            let chi: Vec<VarId> = (0..k)
                .map(|j| model.add_binary("CHI", &[s, p, j]))
                .collect();

            if !sp.exists(s, p) {
                for (j, &var) in chi.iter().enumerate() {
                    model.fix(var, if j == 0 { 1.0 } else { 0.0 });
                }
            } else if let Some(start) = grid.start() {
                for (j, &var) in chi.iter().enumerate() {
                    model.set_start(var, if j == start { 1.0 } else { 0.0 });
                }
            }

            let mut fl_value = LinearExpr::new().term(base.fl_sp.at(s, p), 1.0);
            for (j, &var) in chi.iter().enumerate() {
                fl_value.add_term(var, -grid.breakpoint(j));
            }
            model.add_row(format!("fl_disc[{},{}]", s, p), fl_value, Sense::Eq, 0.0);
            let choose: LinearExpr = chi.iter().map(|&var| (var, 1.0)).collect();
            model.add_row(format!("chi_sum[{},{}]", s, p), choose, Sense::Eq, 1.0);

            for d in 0..network.num_demands() {
                let pr_disc: Vec<VarId> = (0..k)
                    .map(|j| {
                        let var = model.add_continuous("PR_DISC", &[p, d, s, j], 0.0, 1.0);
                        if !pd.exists(p, d) || (!sp.exists(s, p) && j > 0) {
                            model.fix(var, 0.0);
                        }
                        var
                    })
                    .collect();

                let mut split: LinearExpr = pr_disc.iter().map(|&var| (var, 1.0)).collect();
                split.add_term(base.pr.at(p, d), -1.0);
                model.add_row(format!("pr_disc_sum[{},{},{}]", p, d, s), split, Sense::Eq, 0.0);

                for j in 0..k {
                    let bound = LinearExpr::new().term(pr_disc[j], 1.0).term(chi[j], -1.0);
                    model.add_row(
                        format!("pr_disc_cap[{},{},{},{}]", p, d, s, j),
                        bound,
                        Sense::Le,
                        0.0,
                    );
                }

                let mut path = LinearExpr::new().term(base.fl_pr.at(s, p, d), 1.0);
                for (j, &var) in pr_disc.iter().enumerate() {
                    path.add_term(var, -grid.breakpoint(j));
                }
                model.add_row(format!("fl_pr_disc[{},{},{}]", s, p, d), path, Sense::Eq, 0.0);
            }
            chi
        });

        (model, base, chi)
    }
}

impl DiscretizedProblem for FlowScheme<'_> {
    fn name(&self) -> String {
        "tp-flow".to_string()
    }

    fn initialize(&mut self) {
        let sp = self.network.source_pool();
        let k = self.settings.disc_size;
        self.grids = Table::from_fn(sp.rows(), sp.cols(), |s, p| {
            IntervalGrid::new(k, sp.capacity(s, p))
        });
        self.selection = Table::filled(sp.rows(), sp.cols(), None);
    }

    fn solve(
        &mut self,
        solver: &dyn Solver,
        time_limit: Duration,
        gap: f64,
    ) -> PoolResult<SolveOutcome> {
        let (model, base, chi) = self.build_model();
        let response = submit(solver, &model, time_limit, gap)?;

        if !(response.status.is_solved() && response.has_solution()) {
            self.selection = self.selection.map(|_| None);
            return Ok(SolveOutcome::not_solved(response.status));
        }

        let tolerance = self.settings.integer_tolerance;
        self.selection = chi.map(|vars| first_selected(&response, vars.iter().copied(), tolerance));
        Ok(SolveOutcome {
            status: response.status,
            objective: response.objective,
            flows: Some(base.extract_flows(self.network, &response)),
        })
    }

    fn adapt(&mut self) {
        let sp = self.network.source_pool();
        let tolerance = self.settings.feasibility_tolerance;
        let mut refined = 0;
        for ((s, p), selected) in self.selection.iter() {
            if let (true, Some(c)) = (sp.exists(s, p), *selected) {
                self.grids.get_mut(s, p).refine(c, tolerance);
                refined += 1;
            }
        }
        debug!(refined, "flow grids refined");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::test_support::haverly1;

    fn settings() -> SchemeSettings {
        SchemeSettings {
            disc_size: 3,
            feasibility_tolerance: 1e-6,
            integer_tolerance: 1e-5,
            iterative: true,
        }
    }

    #[test]
    fn grids_span_pipe_capacity() {
        let net = haverly1();
        let scheme = FlowScheme::new(&net, settings());
        let bps: Vec<f64> = scheme.grid(1, 0).breakpoints().collect();
        assert_eq!(bps, vec![0.0, 150.0, 300.0]);
        // s3 -> p1 is not a pipe
        assert_eq!(scheme.grid(2, 0).upper(), 0.0);
    }

    #[test]
    fn missing_pipe_pins_first_breakpoint() {
        let net = haverly1();
        let scheme = FlowScheme::new(&net, settings());
        let (model, _, chi) = scheme.build_model();
        let pinned = chi.get(2, 0);
        assert_eq!(model.spec(pinned[0]).lower, 1.0);
        assert!(pinned[1..].iter().all(|&v| model.spec(v).upper == 0.0));
        assert!(chi.get(0, 0).iter().all(|&v| !model.spec(v).is_fixed()));
    }

    #[test]
    fn model_accepts_on_grid_solution() {
        let net = haverly1();
        let scheme = FlowScheme::new(&net, settings());
        let (model, base, chi) = scheme.build_model();

        // s2 -> p1 at breakpoint 150, all of it to d2, plus s3 -> d2 at 50
        let mut levels = vec![0.0; model.num_vars()];
        levels[base.fl_sp.at(1, 0).index()] = 150.0;
        levels[base.fl_pr.at(1, 0, 1).index()] = 150.0;
        levels[base.fl_sd.at(2, 1).index()] = 50.0;
        levels[base.pr.at(0, 1).index()] = 1.0;
        levels[chi.get(0, 0)[0].index()] = 1.0;
        levels[chi.get(1, 0)[1].index()] = 1.0;
        levels[chi.get(2, 0)[0].index()] = 1.0;
        // PR_DISC(p1,d2,s,j) carries PR(p1,d2) = 1 on the selected breakpoint
        for (s, j) in [(0, 0), (1, 1), (2, 0)] {
            let var = model.var("PR_DISC", &[0, 1, s, j]).unwrap();
            levels[var.index()] = 1.0;
        }

        assert!(model.max_violation(&levels) < 1e-9);
        assert!((model.objective().evaluate(&levels) - 100.0).abs() < 1e-9);
    }
}
