//! Proportion discretization of the TP form.
//!
//! `PR(p,d)` takes one of the breakpoints of its grid, chosen by the binaries
//! `CHI(p,d,j)`. The flow of every source into the pool is copied into one
//! disaggregated flow per breakpoint, so the path flow becomes
//! `Σ_j PR_DISC(p,d,j)·FL_DISC(s,p,d,j)`.

use std::time::Duration;

use pool_core::{NetworkModel, PoolResult, Table};
use pool_solver::{LinearExpr, MilpModel, Sense, Solver, VarId};
use tracing::debug;

use super::{first_selected, submit, DiscretizedProblem, IntervalGrid, SchemeSettings, SolveOutcome};
use crate::formulation::tp;

pub struct ProportionScheme<'a> {
    network: &'a NetworkModel,
    settings: SchemeSettings,
    grids: Table<IntervalGrid>,
    /// Breakpoint chosen per pool/demand pair by the last solve
    selection: Table<Option<usize>>,
}

impl<'a> ProportionScheme<'a> {
    pub fn new(network: &'a NetworkModel, settings: SchemeSettings) -> Self {
        let mut scheme = Self {
            network,
            settings,
            grids: Table::filled(0, 0, IntervalGrid::new(2, 1.0)),
            selection: Table::filled(0, 0, None),
        };
        scheme.initialize();
        scheme
    }

    pub fn grid(&self, p: usize, d: usize) -> &IntervalGrid {
        self.grids.get(p, d)
    }

    pub fn selection(&self, p: usize, d: usize) -> Option<usize> {
        self.selection.at(p, d)
    }

    fn build_model(&self) -> (MilpModel, tp::TpVars, Table<Vec<VarId>>) {
        let network = self.network;
        let sp = network.source_pool();
        let pd = network.pool_demand();
        let k = self.settings.disc_size;

        let mut model = MilpModel::new(format!("{}-tp-proportion", network.name()));
        let base = tp::build(network, &mut model);

        let chi = Table::from_fn(network.num_pools(), network.num_demands(), |p, d| {
            let grid = self.grids.get(p, d);
            let chi: Vec<VarId> = (0..k)
                .map(|j| model.add_binary("CHI", &[p, d, j]))
                .collect();

            if !pd.exists(p, d) {
                for (j, &var) in chi.iter().enumerate() {
                    model.fix(var, if j == 0 { 1.0 } else { 0.0 });
                }
            } else if let Some(start) = grid.start() {
                for (j, &var) in chi.iter().enumerate() {
                    model.set_start(var, if j == start { 1.0 } else { 0.0 });
                }
            }

            let mut pr_value = LinearExpr::new().term(base.pr.at(p, d), 1.0);
            for (j, &var) in chi.iter().enumerate() {
                pr_value.add_term(var, -grid.breakpoint(j));
            }
            model.add_row(format!("pr_disc[{},{}]", p, d), pr_value, Sense::Eq, 0.0);
            let choose: LinearExpr = chi.iter().map(|&var| (var, 1.0)).collect();
            model.add_row(format!("chi_sum[{},{}]", p, d), choose, Sense::Eq, 1.0);

            for s in 0..network.num_sources() {
                let cap = sp.capacity(s, p);
                let fl_disc: Vec<VarId> = (0..k)
                    .map(|j| {
                        let var = model.add_continuous("FL_DISC", &[s, p, d, j], 0.0, cap);
                        if !sp.exists(s, p) || (!pd.exists(p, d) && j > 0) {
                            model.fix(var, 0.0);
                        }
                        var
                    })
                    .collect();

                let mut split: LinearExpr = fl_disc.iter().map(|&var| (var, 1.0)).collect();
                split.add_term(base.fl_sp.at(s, p), -1.0);
                model.add_row(format!("fl_disc_sum[{},{},{}]", s, p, d), split, Sense::Eq, 0.0);

                for j in 0..k {
                    let bound = LinearExpr::new()
                        .term(fl_disc[j], 1.0)
                        .term(chi[j], -cap);
                    model.add_row(
                        format!("fl_disc_cap[{},{},{},{}]", s, p, d, j),
                        bound,
                        Sense::Le,
                        0.0,
                    );
                }

                let mut path = LinearExpr::new().term(base.fl_pr.at(s, p, d), 1.0);
                for (j, &var) in fl_disc.iter().enumerate() {
                    path.add_term(var, -grid.breakpoint(j));
                }
                model.add_row(format!("fl_pr_disc[{},{},{}]", s, p, d), path, Sense::Eq, 0.0);
            }
            chi
        });

        (model, base, chi)
    }
}

impl DiscretizedProblem for ProportionScheme<'_> {
    fn name(&self) -> String {
        "tp-proportion".to_string()
    }

    fn initialize(&mut self) {
        let (n_p, n_d) = (self.network.num_pools(), self.network.num_demands());
        let k = self.settings.disc_size;
        self.grids = Table::from_fn(n_p, n_d, |_, _| IntervalGrid::new(k, 1.0));
        self.selection = Table::filled(n_p, n_d, None);
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
        let pd = self.network.pool_demand();
        let tolerance = self.settings.feasibility_tolerance;
        let mut refined = 0;
        for ((p, d), selected) in self.selection.iter() {
            if let (true, Some(c)) = (pd.exists(p, d), *selected) {
                self.grids.get_mut(p, d).refine(c, tolerance);
                refined += 1;
            }
        }
        debug!(refined, "proportion grids refined");
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
    fn missing_source_pipes_fix_disaggregated_flows() {
        let net = haverly1();
        let scheme = ProportionScheme::new(&net, settings());
        let (model, _, chi) = scheme.build_model();
        // every pool/demand pipe exists, so no binary is fixed
        assert!(chi.iter().all(|(_, vars)| vars.iter().all(|&v| !model.spec(v).is_fixed())));
        // s3 has no pipe into p1
        for j in 0..3 {
            let var = model.var("FL_DISC", &[2, 0, 1, j]).unwrap();
            assert!(model.spec(var).is_fixed());
        }
        let open = model.var("FL_DISC", &[0, 0, 1, 2]).unwrap();
        assert_eq!(model.spec(open).upper, 300.0);
    }

    #[test]
    fn model_reproduces_known_solution() {
        let net = haverly1();
        let scheme = ProportionScheme::new(&net, settings());
        let (model, base, chi) = scheme.build_model();

        // PR(p1,d2) = 1 is the last breakpoint, PR(p1,d1) = 0 the first
        let mut levels = vec![0.0; model.num_vars()];
        levels[base.fl_sp.at(1, 0).index()] = 100.0;
        levels[base.fl_pr.at(1, 0, 1).index()] = 100.0;
        levels[base.fl_sd.at(2, 1).index()] = 100.0;
        levels[base.pr.at(0, 1).index()] = 1.0;
        levels[chi.get(0, 0)[0].index()] = 1.0;
        levels[chi.get(0, 1)[2].index()] = 1.0;
        let fl_disc = |s: usize, d: usize, j: usize| model.var("FL_DISC", &[s, 0, d, j]).unwrap();
        levels[fl_disc(1, 0, 0).index()] = 100.0;
        levels[fl_disc(1, 1, 2).index()] = 100.0;

        assert!(model.max_violation(&levels) < 1e-9);
        assert!((model.objective().evaluate(&levels) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn adapt_refines_only_selected_pairs() {
        let net = haverly1();
        let mut scheme = ProportionScheme::new(&net, settings());
        scheme.selection.set(0, 1, Some(1));
        scheme.adapt();
        assert_eq!(scheme.grid(0, 1).length(), 0.5);
        assert_eq!(scheme.grid(0, 1).start(), Some(1));
        assert_eq!(scheme.grid(0, 0).length(), 1.0);
        assert_eq!(scheme.grid(0, 0).start(), None);

        scheme.initialize();
        assert_eq!(scheme.grid(0, 1).length(), 1.0);
        assert_eq!(scheme.selection(0, 1), None);
    }
}
