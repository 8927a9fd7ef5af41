//! Pool discretization, for both base forms.
//!
//! The inflow of every pool is split into weighted slots `FRAC(p,j)`, and
//! each slot is routed to exactly one outgoing demand by `CHI(p,j,d)`. The
//! path flows are then sums of the slot flows `FL_PR_DISC(s,p,j,d)`, which
//! are bounded by `FRAC·FL_MAX(s,p)·CHI`.

use std::time::Duration;

use pool_core::{Cube, NetworkModel, PoolResult};
use pool_solver::{LinearExpr, MilpModel, Sense, SolveResponse, Solver, VarId};
use tracing::debug;

use super::{
    first_selected, submit, DiscretizedProblem, PoolSlots, SchemeSettings, SlotChange, SlotUse,
    SolveOutcome,
};
use crate::config::Formulation;
use crate::formulation::BaseVars;

pub struct PoolScheme<'a> {
    network: &'a NetworkModel,
    formulation: Formulation,
    settings: SchemeSettings,
    slots: Vec<PoolSlots>,
    /// Slot assignments of the last solve, per pool
    uses: Vec<Vec<Option<SlotUse>>>,
}

/// Binaries and slot flows of one built model.
struct SlotVars {
    /// `CHI(p,j,d)`
    chi: Cube<VarId>,
    /// `FL_PR_DISC(s,p,j,d)`, indexed `[s]` then `(p,j,d)`
    flows: Vec<Cube<VarId>>,
}

impl<'a> PoolScheme<'a> {
    pub fn new(network: &'a NetworkModel, formulation: Formulation, settings: SchemeSettings) -> Self {
        let mut scheme = Self {
            network,
            formulation,
            settings,
            slots: Vec::new(),
            uses: Vec::new(),
        };
        scheme.initialize();
        scheme
    }

    pub fn slots(&self, p: usize) -> &PoolSlots {
        &self.slots[p]
    }

    fn build_model(&self) -> (MilpModel, BaseVars, SlotVars) {
        let network = self.network;
        let sp = network.source_pool();
        let pd = network.pool_demand();
        let (n_s, n_p, n_d) = (
            network.num_sources(),
            network.num_pools(),
            network.num_demands(),
        );
        let k = self.settings.disc_size;

        let mut model = MilpModel::new(format!("{}-{}", network.name(), self.name()));
        let base = BaseVars::build(network, self.formulation, &mut model);

        let chi = Cube::from_fn(n_p, k, n_d, |p, j, d| model.add_binary("CHI", &[p, j, d]));
        let flows: Vec<Cube<VarId>> = (0..n_s)
            .map(|s| {
                Cube::from_fn(n_p, k, n_d, |p, j, d| {
                    model.add_continuous("FL_PR_DISC", &[s, p, j, d], 0.0, sp.capacity(s, p))
                })
            })
            .collect();

        for (p, slots) in self.slots.iter().enumerate() {
            let outlet = network.first_outlet(p);

            for j in 0..k {
                if j >= slots.size() {
                    for d in 0..n_d {
                        model.fix(chi.at(p, j, d), if Some(d) == outlet { 1.0 } else { 0.0 });
                        for slot_flows in &flows {
                            model.fix(slot_flows.at(p, j, d), 0.0);
                        }
                    }
                } else if let Some(start) = slots.start(j) {
                    for d in 0..n_d {
                        model.set_start(chi.at(p, j, d), if d == start { 1.0 } else { 0.0 });
                    }
                }
                for d in (0..n_d).filter(|&d| !pd.exists(p, d)) {
                    model.fix(chi.at(p, j, d), 0.0);
                    for slot_flows in &flows {
                        model.fix(slot_flows.at(p, j, d), 0.0);
                    }
                }

                if outlet.is_some() {
                    let choose: LinearExpr = (0..n_d).map(|d| (chi.at(p, j, d), 1.0)).collect();
                    model.add_row(format!("chi_sum[{},{}]", p, j), choose, Sense::Eq, 1.0);
                }

                let frac = slots.fraction(j);
                for (s, slot_flows) in flows.iter().enumerate() {
                    let mut share: LinearExpr =
                        (0..n_d).map(|d| (slot_flows.at(p, j, d), 1.0)).collect();
                    share.add_scaled(&base.pool_inflow(s, p), -frac);
                    model.add_row(format!("slot_share[{},{},{}]", s, p, j), share, Sense::Eq, 0.0);

                    let bound = frac * sp.capacity(s, p);
                    for d in 0..n_d {
                        let cap = LinearExpr::new()
                            .term(slot_flows.at(p, j, d), 1.0)
                            .term(chi.at(p, j, d), -bound);
                        model.add_row(
                            format!("slot_cap[{},{},{},{}]", s, p, j, d),
                            cap,
                            Sense::Le,
                            0.0,
                        );
                    }
                }
            }

            for d in 0..n_d {
                for (s, slot_flows) in flows.iter().enumerate() {
                    let mut path = LinearExpr::new().term(base.fl_pr().at(s, p, d), 1.0);
                    for j in 0..k {
                        path.add_term(slot_flows.at(p, j, d), -1.0);
                    }
                    model.add_row(format!("slot_path[{},{},{}]", s, p, d), path, Sense::Eq, 0.0);
                }

                if let BaseVars::Tp(vars) = &base {
                    let mut pr = LinearExpr::new().term(vars.pr.at(p, d), 1.0);
                    for j in 0..k {
                        pr.add_term(chi.at(p, j, d), -slots.fraction(j));
                    }
                    model.add_row(format!("slot_pr[{},{}]", p, d), pr, Sense::Eq, 0.0);
                }
            }
        }

        (model, base, SlotVars { chi, flows })
    }

    fn record_uses(&mut self, response: &SolveResponse, vars: &SlotVars) {
        let tolerance = self.settings.integer_tolerance;
        let n_d = self.network.num_demands();
        self.uses = self
            .slots
            .iter()
            .enumerate()
            .map(|(p, slots)| {
                (0..slots.size())
                    .map(|j| {
                        let chi = (0..n_d).map(|d| vars.chi.at(p, j, d));
                        first_selected(response, chi, tolerance).map(|demand| SlotUse {
                            demand,
                            flow: vars
                                .flows
                                .iter()
                                .map(|f| response.value(f.at(p, j, demand)))
                                .sum(),
                        })
                    })
                    .collect()
            })
            .collect();
    }
}

impl DiscretizedProblem for PoolScheme<'_> {
    fn name(&self) -> String {
        format!("{}-pool", self.formulation)
    }

    fn initialize(&mut self) {
        let k = self.settings.disc_size;
        let n_p = self.network.num_pools();
        self.slots = (0..n_p)
            .map(|_| {
                if self.settings.iterative {
                    PoolSlots::single(k)
                } else {
                    PoolSlots::uniform(k)
                }
            })
            .collect();
        self.uses = vec![Vec::new(); n_p];
    }

    fn solve(
        &mut self,
        solver: &dyn Solver,
        time_limit: Duration,
        gap: f64,
    ) -> PoolResult<SolveOutcome> {
        let (model, base, vars) = self.build_model();
        let response = submit(solver, &model, time_limit, gap)?;

        if !(response.status.is_solved() && response.has_solution()) {
            self.uses = vec![Vec::new(); self.slots.len()];
            return Ok(SolveOutcome::not_solved(response.status));
        }

        self.record_uses(&response, &vars);
        Ok(SolveOutcome {
            status: response.status,
            objective: response.objective,
            flows: Some(base.extract_flows(self.network, &response)),
        })
    }

    fn adapt(&mut self) {
        let tolerance = self.settings.feasibility_tolerance;
        for (p, (slots, uses)) in self.slots.iter_mut().zip(&self.uses).enumerate() {
            let change = slots.adapt(uses, tolerance);
            if change != SlotChange::Unchanged {
                debug!(pool = p, ?change, size = slots.size(), "pool slots adapted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::test_support::haverly1;

    fn settings(iterative: bool) -> SchemeSettings {
        SchemeSettings {
            disc_size: 3,
            feasibility_tolerance: 1e-6,
            integer_tolerance: 1e-5,
            iterative,
        }
    }

    #[test]
    fn adaptive_run_starts_with_one_slot() {
        let net = haverly1();
        let scheme = PoolScheme::new(&net, Formulation::Tp, settings(true));
        assert_eq!(scheme.slots(0).size(), 1);
        assert_eq!(scheme.slots(0).fractions(), &[1.0, 0.0, 0.0]);

        let scheme = PoolScheme::new(&net, Formulation::Pq, settings(false));
        assert_eq!(scheme.slots(0).size(), 3);
    }

    #[test]
    fn unused_slots_are_pinned_to_first_outlet() {
        let net = haverly1();
        let scheme = PoolScheme::new(&net, Formulation::Tp, settings(true));
        let (model, _, vars) = scheme.build_model();
        for j in 1..3 {
            assert_eq!(model.spec(vars.chi.at(0, j, 0)).lower, 1.0);
            assert_eq!(model.spec(vars.chi.at(0, j, 1)).upper, 0.0);
            assert!(model.spec(vars.flows[0].at(0, j, 0)).is_fixed());
        }
        assert!(!model.spec(vars.chi.at(0, 0, 1)).is_fixed());
    }

    fn known_solution(formulation: Formulation) {
        let net = haverly1();
        let scheme = PoolScheme::new(&net, formulation, settings(true));
        let (model, base, vars) = scheme.build_model();

        let mut levels = vec![0.0; model.num_vars()];
        match &base {
            BaseVars::Tp(tp) => {
                levels[tp.fl_sp.at(1, 0).index()] = 100.0;
                levels[tp.fl_sd.at(2, 1).index()] = 100.0;
                levels[tp.pr.at(0, 1).index()] = 1.0;
            }
            BaseVars::Pq(pq) => {
                levels[pq.fl_pd.at(0, 1).index()] = 100.0;
                levels[pq.fl_sd.at(2, 1).index()] = 100.0;
                levels[pq.pr.at(1, 0).index()] = 1.0;
            }
        }
        levels[base.fl_pr().at(1, 0, 1).index()] = 100.0;
        levels[vars.chi.at(0, 0, 1).index()] = 1.0;
        levels[vars.chi.at(0, 1, 0).index()] = 1.0;
        levels[vars.chi.at(0, 2, 0).index()] = 1.0;
        levels[vars.flows[1].at(0, 0, 1).index()] = 100.0;

        assert!(model.max_violation(&levels) < 1e-9, "{}", formulation);
        assert!((model.objective().evaluate(&levels) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn tp_model_reproduces_known_solution() {
        known_solution(Formulation::Tp);
    }

    #[test]
    fn pq_model_reproduces_known_solution() {
        known_solution(Formulation::Pq);
    }

    #[test]
    fn adapt_splits_the_busy_slot() {
        let net = haverly1();
        let mut scheme = PoolScheme::new(&net, Formulation::Pq, settings(true));
        scheme.uses = vec![vec![Some(SlotUse {
            demand: 1,
            flow: 100.0,
        })]];
        scheme.adapt();
        assert_eq!(scheme.slots(0).size(), 2);
        assert_eq!(scheme.slots(0).start(1), Some(1));
    }
}
