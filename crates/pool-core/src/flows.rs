//! Pipe flow snapshots.
//!
//! A [`PipeFlows`] is the candidate solution handed from a discretization
//! scheme to the refinement loop and on to the feasibility checker.

use serde::{Deserialize, Serialize};

use crate::network::NetworkModel;
use crate::table::Table;

/// Flow on every source→pool, source→demand and pool→demand pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeFlows {
    pub source_pool: Table<f64>,
    pub source_demand: Table<f64>,
    pub pool_demand: Table<f64>,
}

/// One positive pipe flow, addressed by unit names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEntry {
    pub from: String,
    pub to: String,
    pub flow: f64,
}

impl PipeFlows {
    pub fn zeros(network: &NetworkModel) -> Self {
        let (n_s, n_p, n_d) = (
            network.num_sources(),
            network.num_pools(),
            network.num_demands(),
        );
        Self {
            source_pool: Table::filled(n_s, n_p, 0.0),
            source_demand: Table::filled(n_s, n_d, 0.0),
            pool_demand: Table::filled(n_p, n_d, 0.0),
        }
    }

    /// Profit of the flows, `Σ cost·FL` over all pipes.
    pub fn objective(&self, network: &NetworkModel) -> f64 {
        let weigh = |flows: &Table<f64>, pipes: &crate::PipeTable| -> f64 {
            flows
                .iter()
                .map(|((r, c), f)| pipes.cost(r, c) * f)
                .sum::<f64>()
        };
        weigh(&self.source_pool, network.source_pool())
            + weigh(&self.source_demand, network.source_demand())
            + weigh(&self.pool_demand, network.pool_demand())
    }

    pub fn pool_inflow(&self, p: usize) -> f64 {
        (0..self.source_pool.rows())
            .map(|s| self.source_pool.at(s, p))
            .sum()
    }

    pub fn pool_outflow(&self, p: usize) -> f64 {
        self.pool_demand.row(p).iter().sum()
    }

    /// Total flow leaving source `s` towards pools and demands.
    pub fn source_outflow(&self, s: usize) -> f64 {
        self.source_pool.row(s).iter().sum::<f64>() + self.source_demand.row(s).iter().sum::<f64>()
    }

    pub fn demand_inflow(&self, d: usize) -> f64 {
        let direct: f64 = (0..self.source_demand.rows())
            .map(|s| self.source_demand.at(s, d))
            .sum();
        let pooled: f64 = (0..self.pool_demand.rows())
            .map(|p| self.pool_demand.at(p, d))
            .sum();
        direct + pooled
    }

    /// Flows strictly above `threshold`, sources first, then pools.
    pub fn positive(&self, network: &NetworkModel, threshold: f64) -> Vec<FlowEntry> {
        let mut entries = Vec::new();
        let mut push = |from: &str, to: &str, flow: f64| {
            if flow > threshold {
                entries.push(FlowEntry {
                    from: from.to_string(),
                    to: to.to_string(),
                    flow,
                });
            }
        };

        for (s, source) in network.sources().iter().enumerate() {
            for (p, pool) in network.pools().iter().enumerate() {
                push(&source.name, &pool.name, self.source_pool.at(s, p));
            }
            for (d, demand) in network.demands().iter().enumerate() {
                push(&source.name, &demand.name, self.source_demand.at(s, d));
            }
        }
        for (p, pool) in network.pools().iter().enumerate() {
            for (d, demand) in network.demands().iter().enumerate() {
                push(&pool.name, &demand.name, self.pool_demand.at(p, d));
            }
        }
        entries
    }
}
