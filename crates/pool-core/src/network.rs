//! Validated pooling network with derived pipe and unit data.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::{PoolError, PoolResult};
use crate::instance::RawInstance;
use crate::table::Table;
use crate::{DemandId, InUnit, OutUnit, PoolId, SourceId, UnitRole};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub name: String,
    /// Capacity after tightening by the attached pipes
    pub capacity: f64,
    /// Capacity as given by the instance
    pub raw_capacity: f64,
    pub cost: f64,
    pub quality: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pool {
    pub name: String,
    pub capacity: f64,
    pub raw_capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demand {
    pub name: String,
    pub capacity: f64,
    pub raw_capacity: f64,
    pub revenue: f64,
    pub min_quality: Vec<f64>,
    pub max_quality: Vec<f64>,
    pub active_min: Vec<bool>,
    pub active_max: Vec<bool>,
}

/// Existence, maximum flow and unit profit of every pipe between two roles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipeTable {
    exists: Table<bool>,
    capacity: Table<f64>,
    cost: Table<f64>,
}

impl PipeTable {
    fn build(
        exists: Table<bool>,
        out_caps: &[f64],
        in_caps: &[f64],
        cost: impl Fn(usize, usize) -> f64,
    ) -> Self {
        let capacity = Table::from_fn(exists.rows(), exists.cols(), |r, c| {
            if exists.at(r, c) {
                out_caps[r].min(in_caps[c])
            } else {
                0.0
            }
        });
        let cost = Table::from_fn(exists.rows(), exists.cols(), |r, c| {
            if exists.at(r, c) {
                cost(r, c)
            } else {
                0.0
            }
        });
        Self {
            exists,
            capacity,
            cost,
        }
    }

    #[inline]
    pub fn exists(&self, r: usize, c: usize) -> bool {
        self.exists.at(r, c)
    }

    /// Maximum flow; 0 for a missing pipe.
    #[inline]
    pub fn capacity(&self, r: usize, c: usize) -> f64 {
        self.capacity.at(r, c)
    }

    /// Profit per unit of flow; 0 for a missing pipe.
    #[inline]
    pub fn cost(&self, r: usize, c: usize) -> f64 {
        self.cost.at(r, c)
    }

    pub fn rows(&self) -> usize {
        self.exists.rows()
    }

    pub fn cols(&self) -> usize {
        self.exists.cols()
    }

    pub fn count(&self) -> usize {
        self.exists.iter().filter(|(_, e)| **e).count()
    }

    fn row_capacity(&self, r: usize) -> f64 {
        self.capacity.row(r).iter().sum()
    }

    fn col_capacity(&self, c: usize) -> f64 {
        (0..self.rows()).map(|r| self.capacity(r, c)).sum()
    }
}

/// Counts reported by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub name: String,
    pub sources: usize,
    pub pools: usize,
    pub demands: usize,
    pub contaminants: usize,
    pub source_pool_pipes: usize,
    pub source_demand_pipes: usize,
    pub pool_demand_pipes: usize,
}

/// The pooling network used by every formulation.
///
/// Built once from a [`RawInstance`]; all derived data is fixed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkModel {
    name: String,
    contaminants: Vec<String>,
    sources: Vec<Source>,
    pools: Vec<Pool>,
    demands: Vec<Demand>,
    source_pool: PipeTable,
    source_demand: PipeTable,
    pool_demand: PipeTable,
}

impl NetworkModel {
    /// Validate a raw instance and derive pipe capacities, costs and
    /// tightened unit capacities.
    pub fn from_raw(raw: &RawInstance) -> PoolResult<Self> {
        let diag = validate_raw(raw);
        for issue in diag.warnings() {
            debug!(%issue, "instance warning");
        }
        if diag.has_errors() {
            return Err(PoolError::Validation(diag.error_messages()));
        }

        let n_co = raw.contaminants.len();
        let s_index = index_of(raw.sources.iter().map(|s| s.name.as_str()));
        let p_index = index_of(raw.pools.iter().map(|p| p.name.as_str()));
        let d_index = index_of(raw.demands.iter().map(|d| d.name.as_str()));

        let mut sp = Table::filled(raw.sources.len(), raw.pools.len(), false);
        let mut sd = Table::filled(raw.sources.len(), raw.demands.len(), false);
        let mut pd = Table::filled(raw.pools.len(), raw.demands.len(), false);
        for (from, to) in &raw.pipes {
            let from = from.as_str();
            let to = to.as_str();
            if let (Some(&s), Some(&p)) = (s_index.get(from), p_index.get(to)) {
                sp.set(s, p, true);
            } else if let (Some(&s), Some(&d)) = (s_index.get(from), d_index.get(to)) {
                sd.set(s, d, true);
            } else if let (Some(&p), Some(&d)) = (p_index.get(from), d_index.get(to)) {
                pd.set(p, d, true);
            }
        }

        let s_caps: Vec<f64> = raw.sources.iter().map(|s| s.capacity).collect();
        let p_caps: Vec<f64> = raw.pools.iter().map(|p| p.capacity).collect();
        let d_caps: Vec<f64> = raw.demands.iter().map(|d| d.capacity).collect();

        let source_pool = PipeTable::build(sp, &s_caps, &p_caps, |s, _| -raw.sources[s].cost);
        let source_demand = PipeTable::build(sd, &s_caps, &d_caps, |s, d| {
            raw.demands[d].revenue - raw.sources[s].cost
        });
        let pool_demand = PipeTable::build(pd, &p_caps, &d_caps, |_, d| raw.demands[d].revenue);

        let mut sources: Vec<Source> = raw
            .sources
            .iter()
            .map(|s| Source {
                name: s.name.clone(),
                capacity: s.capacity,
                raw_capacity: s.capacity,
                cost: s.cost,
                quality: s.quality.clone(),
            })
            .collect();
        let mut pools: Vec<Pool> = raw
            .pools
            .iter()
            .map(|p| Pool {
                name: p.name.clone(),
                capacity: p.capacity,
                raw_capacity: p.capacity,
            })
            .collect();
        let mut demands: Vec<Demand> = raw
            .demands
            .iter()
            .map(|d| Demand {
                name: d.name.clone(),
                capacity: d.capacity,
                raw_capacity: d.capacity,
                revenue: d.revenue,
                min_quality: d.min_quality.clone(),
                max_quality: d.max_quality.clone(),
                active_min: d.active_min.clone().unwrap_or_else(|| vec![true; n_co]),
                active_max: d.active_max.clone().unwrap_or_else(|| vec![true; n_co]),
            })
            .collect();

        // outgoing pipes first, then incoming
        for (s, source) in sources.iter_mut().enumerate() {
            let outgoing = source_pool.row_capacity(s) + source_demand.row_capacity(s);
            source.capacity = source.capacity.min(outgoing);
        }
        for (p, pool) in pools.iter_mut().enumerate() {
            pool.capacity = pool.capacity.min(pool_demand.row_capacity(p));
        }
        for (p, pool) in pools.iter_mut().enumerate() {
            pool.capacity = pool.capacity.min(source_pool.col_capacity(p));
        }
        for (d, demand) in demands.iter_mut().enumerate() {
            let incoming = source_demand.col_capacity(d) + pool_demand.col_capacity(d);
            demand.capacity = demand.capacity.min(incoming);
        }

        let network = Self {
            name: raw.name.clone(),
            contaminants: raw.contaminants.clone(),
            sources,
            pools,
            demands,
            source_pool,
            source_demand,
            pool_demand,
        };
        debug!(
            name = %network.name,
            sources = network.num_sources(),
            pools = network.num_pools(),
            demands = network.num_demands(),
            pipes = network.num_pipes(),
            "built network model"
        );
        Ok(network)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contaminants(&self) -> &[String] {
        &self.contaminants
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn num_pools(&self) -> usize {
        self.pools.len()
    }

    pub fn num_demands(&self) -> usize {
        self.demands.len()
    }

    pub fn num_contaminants(&self) -> usize {
        self.contaminants.len()
    }

    pub fn num_pipes(&self) -> usize {
        self.source_pool.count() + self.source_demand.count() + self.pool_demand.count()
    }

    pub fn source(&self, id: SourceId) -> &Source {
        &self.sources[id.value()]
    }

    pub fn pool(&self, id: PoolId) -> &Pool {
        &self.pools[id.value()]
    }

    pub fn demand(&self, id: DemandId) -> &Demand {
        &self.demands[id.value()]
    }

    pub fn source_pool(&self) -> &PipeTable {
        &self.source_pool
    }

    pub fn source_demand(&self) -> &PipeTable {
        &self.source_demand
    }

    pub fn pool_demand(&self) -> &PipeTable {
        &self.pool_demand
    }

    fn table(&self, from: OutUnit, to: InUnit) -> Option<(&PipeTable, usize, usize)> {
        match (from, to) {
            (OutUnit::Source(s), InUnit::Pool(p)) => Some((&self.source_pool, s.value(), p.value())),
            (OutUnit::Source(s), InUnit::Demand(d)) => {
                Some((&self.source_demand, s.value(), d.value()))
            }
            (OutUnit::Pool(p), InUnit::Demand(d)) => Some((&self.pool_demand, p.value(), d.value())),
            (OutUnit::Pool(_), InUnit::Pool(_)) => None,
        }
    }

    /// Pool to pool pipes are never present.
    pub fn pipe_exists(&self, from: OutUnit, to: InUnit) -> bool {
        self.table(from, to)
            .map(|(t, r, c)| t.exists(r, c))
            .unwrap_or(false)
    }

    pub fn pipe_capacity(&self, from: OutUnit, to: InUnit) -> f64 {
        self.table(from, to)
            .map(|(t, r, c)| t.capacity(r, c))
            .unwrap_or(0.0)
    }

    pub fn pipe_cost(&self, from: OutUnit, to: InUnit) -> f64 {
        self.table(from, to)
            .map(|(t, r, c)| t.cost(r, c))
            .unwrap_or(0.0)
    }

    /// Tightened capacity of a unit on the outgoing side.
    pub fn out_capacity(&self, unit: OutUnit) -> f64 {
        match unit {
            OutUnit::Source(s) => self.source(s).capacity,
            OutUnit::Pool(p) => self.pool(p).capacity,
        }
    }

    pub fn in_capacity(&self, unit: InUnit) -> f64 {
        match unit {
            InUnit::Pool(p) => self.pool(p).capacity,
            InUnit::Demand(d) => self.demand(d).capacity,
        }
    }

    pub fn out_name(&self, unit: OutUnit) -> &str {
        match unit {
            OutUnit::Source(s) => &self.source(s).name,
            OutUnit::Pool(p) => &self.pool(p).name,
        }
    }

    pub fn in_name(&self, unit: InUnit) -> &str {
        match unit {
            InUnit::Pool(p) => &self.pool(p).name,
            InUnit::Demand(d) => &self.demand(d).name,
        }
    }

    /// Sources followed by pools.
    pub fn out_units(&self) -> impl Iterator<Item = OutUnit> + '_ {
        (0..self.num_sources())
            .map(|s| OutUnit::Source(SourceId::new(s)))
            .chain((0..self.num_pools()).map(|p| OutUnit::Pool(PoolId::new(p))))
    }

    /// Pools followed by demands.
    pub fn in_units(&self) -> impl Iterator<Item = InUnit> + '_ {
        (0..self.num_pools())
            .map(|p| InUnit::Pool(PoolId::new(p)))
            .chain((0..self.num_demands()).map(|d| InUnit::Demand(DemandId::new(d))))
    }

    /// Whether pool `p` has at least one pipe to a demand.
    pub fn has_outlet(&self, p: usize) -> bool {
        (0..self.num_demands()).any(|d| self.pool_demand.exists(p, d))
    }

    /// Whether pool `p` has at least one pipe from a source.
    pub fn has_inlet(&self, p: usize) -> bool {
        (0..self.num_sources()).any(|s| self.source_pool.exists(s, p))
    }

    /// First demand reachable from pool `p`.
    pub fn first_outlet(&self, p: usize) -> Option<usize> {
        (0..self.num_demands()).find(|&d| self.pool_demand.exists(p, d))
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            name: self.name.clone(),
            sources: self.num_sources(),
            pools: self.num_pools(),
            demands: self.num_demands(),
            contaminants: self.num_contaminants(),
            source_pool_pipes: self.source_pool.count(),
            source_demand_pipes: self.source_demand.count(),
            pool_demand_pipes: self.pool_demand.count(),
        }
    }
}

fn index_of<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    names.enumerate().map(|(i, n)| (n, i)).collect()
}

/// Check a raw instance and collect every problem found.
pub fn validate_raw(raw: &RawInstance) -> Diagnostics {
    let mut diag = Diagnostics::new();
    let n_co = raw.contaminants.len();

    if raw.sources.is_empty() {
        diag.add_error("instance", "instance has no sources");
    }
    if raw.pools.is_empty() {
        diag.add_error("instance", "instance has no pools");
    }
    if raw.demands.is_empty() {
        diag.add_error("instance", "instance has no demands");
    }

    let mut roles: HashMap<&str, UnitRole> = HashMap::new();
    let units = raw
        .sources
        .iter()
        .map(|s| (s.name.as_str(), UnitRole::Source, s.capacity))
        .chain(raw.pools.iter().map(|p| (p.name.as_str(), UnitRole::Pool, p.capacity)))
        .chain(
            raw.demands
                .iter()
                .map(|d| (d.name.as_str(), UnitRole::Demand, d.capacity)),
        );
    for (name, role, capacity) in units {
        if roles.contains_key(name) {
            diag.add_error_with_entity("instance", "duplicate unit name", name);
        } else {
            roles.insert(name, role);
        }
        if !(capacity >= 0.0) {
            diag.add_error_with_entity("capacity", "capacity must be non-negative", name);
        }
    }

    let mut seen_contaminants = HashSet::new();
    for k in &raw.contaminants {
        if !seen_contaminants.insert(k.as_str()) {
            diag.add_error_with_entity("instance", "duplicate contaminant name", k);
        }
    }

    for s in &raw.sources {
        if s.quality.len() != n_co {
            diag.add_error_with_entity(
                "quality",
                &format!("expected {} quality values, found {}", n_co, s.quality.len()),
                &s.name,
            );
        }
    }
    for d in &raw.demands {
        for (label, len) in [
            ("min_quality", Some(d.min_quality.len())),
            ("max_quality", Some(d.max_quality.len())),
            ("active_min", d.active_min.as_ref().map(Vec::len)),
            ("active_max", d.active_max.as_ref().map(Vec::len)),
        ] {
            if let Some(len) = len {
                if len != n_co {
                    diag.add_error_with_entity(
                        "quality",
                        &format!("expected {} {} values, found {}", n_co, label, len),
                        &d.name,
                    );
                }
            }
        }
        for (k, (lo, hi)) in d.min_quality.iter().zip(&d.max_quality).enumerate() {
            if lo > hi {
                let entity = format!("{} {}", d.name, raw.contaminants.get(k).map_or("?", |c| c));
                diag.add_warning_with_entity("quality", "minimum bound exceeds maximum", &entity);
            }
        }
    }

    let mut seen_pipes = HashSet::new();
    for (from, to) in &raw.pipes {
        let entity = format!("{} -> {}", from, to);
        match (roles.get(from.as_str()), roles.get(to.as_str())) {
            (None, _) | (_, None) => {
                diag.add_error_with_entity("pipe", "pipe endpoint is not a known unit", &entity);
            }
            (Some(UnitRole::Source), Some(UnitRole::Pool))
            | (Some(UnitRole::Source), Some(UnitRole::Demand))
            | (Some(UnitRole::Pool), Some(UnitRole::Demand)) => {
                if !seen_pipes.insert((from.as_str(), to.as_str())) {
                    diag.add_warning_with_entity("pipe", "duplicate pipe", &entity);
                }
            }
            (Some(a), Some(b)) => {
                diag.add_error_with_entity(
                    "pipe",
                    &format!("pipes from a {} to a {} are not allowed", a, b),
                    &entity,
                );
            }
        }
    }

    diag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{RawDemand, RawPool, RawSource};

    fn haverly() -> RawInstance {
        RawInstance {
            name: "haverly1".to_string(),
            contaminants: vec!["q1".to_string()],
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
            pipes: [
                ("s1", "p1"),
                ("s2", "p1"),
                ("p1", "d1"),
                ("p1", "d2"),
                ("s3", "d1"),
                ("s3", "d2"),
            ]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
        }
    }

    #[test]
    fn derives_pipe_costs() {
        let net = NetworkModel::from_raw(&haverly()).unwrap();
        assert_eq!(net.source_pool().cost(1, 0), -16.0);
        assert_eq!(net.source_demand().cost(2, 1), 5.0);
        assert_eq!(net.pool_demand().cost(0, 0), 9.0);
        // s1 -> d1 does not exist
        assert_eq!(net.source_demand().cost(0, 0), 0.0);
        assert!(!net.source_demand().exists(0, 0));
    }

    #[test]
    fn tightens_capacities() {
        let net = NetworkModel::from_raw(&haverly()).unwrap();
        // p1 -> d1 and p1 -> d2 carry at most 100 + 200
        assert_eq!(net.pools()[0].capacity, 300.0);
        assert_eq!(net.pool_demand().capacity(0, 0), 100.0);
        // s3 can push at most 100 + 200 but is capped at 300 anyway
        assert_eq!(net.sources()[2].capacity, 300.0);
        assert_eq!(net.demands()[0].capacity, 100.0);
        assert_eq!(net.num_pipes(), 6);
    }

    #[test]
    fn isolated_source_gets_zero_capacity() {
        let mut raw = haverly();
        raw.sources.push(RawSource::new("s4", 50.0, 1.0, vec![0.0]));
        let net = NetworkModel::from_raw(&raw).unwrap();
        assert_eq!(net.sources()[3].capacity, 0.0);
        assert_eq!(net.sources()[3].raw_capacity, 50.0);
    }

    #[test]
    fn pool_without_inlet_is_tightened_to_zero() {
        let mut raw = haverly();
        raw.pools.push(RawPool::new("p2", 100.0));
        raw.pipes.push(("p2".to_string(), "d1".to_string()));
        let net = NetworkModel::from_raw(&raw).unwrap();
        assert!(net.has_outlet(1));
        assert!(!net.has_inlet(1));
        assert_eq!(net.pools()[1].capacity, 0.0);
        // pipe capacity is not recomputed
        assert_eq!(net.pool_demand().capacity(1, 0), 100.0);
    }

    #[test]
    fn unit_lookups_dispatch_by_role() {
        let net = NetworkModel::from_raw(&haverly()).unwrap();
        let s3 = OutUnit::Source(SourceId::new(2));
        let d2 = InUnit::Demand(DemandId::new(1));
        assert!(net.pipe_exists(s3, d2));
        assert_eq!(net.pipe_capacity(s3, d2), 200.0);
        assert_eq!(net.out_name(s3), "s3");
        assert_eq!(net.in_name(d2), "d2");
        assert!(!net.pipe_exists(OutUnit::Pool(PoolId::new(0)), InUnit::Pool(PoolId::new(0))));
        assert_eq!(net.out_units().count(), 4);
        assert_eq!(net.in_units().count(), 3);
        assert_eq!(net.first_outlet(0), Some(0));
    }

    #[test]
    fn activity_defaults_to_true() {
        let net = NetworkModel::from_raw(&haverly()).unwrap();
        assert_eq!(net.demands()[0].active_min, vec![true]);
        assert_eq!(net.demands()[1].active_max, vec![true]);
    }

    #[test]
    fn rejects_bad_instances() {
        let mut raw = haverly();
        raw.pools.push(RawPool::new("s1", 10.0));
        raw.sources[1].quality = vec![];
        raw.demands[0].capacity = -1.0;
        raw.pipes.push(("d1".to_string(), "p1".to_string()));
        raw.pipes.push(("s1".to_string(), "nowhere".to_string()));

        let diag = validate_raw(&raw);
        assert_eq!(diag.error_count(), 5);

        let err = NetworkModel::from_raw(&raw).unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
        assert!(err.to_string().contains("duplicate unit name"));
        assert!(err.to_string().contains("pipes from a demand to a pool"));
    }

    #[test]
    fn empty_roles_are_errors() {
        let raw = RawInstance {
            name: "empty".to_string(),
            contaminants: vec![],
            sources: vec![],
            pools: vec![],
            demands: vec![],
            pipes: vec![],
        };
        assert_eq!(validate_raw(&raw).error_count(), 3);
    }
}
