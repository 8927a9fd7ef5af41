//! # pool-core: Pooling Network Model
//!
//! Data structures for the pooling problem: a blending network of water
//! sources, pools and water demands connected by directed pipes.
//!
//! ## Design Philosophy
//!
//! Units are split by role and addressed with **typed indices**:
//! - **Sources** ([`SourceId`]): supply only, carry a concentration per contaminant
//! - **Pools** ([`PoolId`]): blend their inflow, have inflow and outflow
//! - **Demands** ([`DemandId`]): sinks with min/max blended concentration bounds
//!
//! Only source→pool, source→demand and pool→demand pipes are representable,
//! which is why pipe data lives in three dense tables instead of one graph.
//! Derived quantities (pipe capacities, tightened unit capacities, pipe costs)
//! are computed once when the [`NetworkModel`] is built and never change.
//!
//! ## Quick Start
//!
//! ```rust
//! use pool_core::instance::{RawDemand, RawInstance, RawPool, RawSource};
//! use pool_core::NetworkModel;
//!
//! let raw = RawInstance {
//!     name: "tiny".to_string(),
//!     contaminants: vec!["sulfur".to_string()],
//!     sources: vec![RawSource::new("s1", 100.0, 6.0, vec![3.0])],
//!     pools: vec![RawPool::new("p1", 80.0)],
//!     demands: vec![RawDemand::new("d1", 50.0, 9.0, vec![0.0], vec![4.0])],
//!     pipes: vec![
//!         ("s1".to_string(), "p1".to_string()),
//!         ("p1".to_string(), "d1".to_string()),
//!     ],
//! };
//!
//! let network = NetworkModel::from_raw(&raw).unwrap();
//! assert_eq!(network.num_sources(), 1);
//! // pipe capacity is the smaller endpoint capacity
//! assert_eq!(network.pool_demand().capacity(0, 0), 50.0);
//! ```
//!
//! ## Modules
//!
//! - [`network`] - The derived network model
//! - [`instance`] - Raw instance records and the JSON loader
//! - [`dat`] - Reader for the whitespace `.dat` instance format
//! - [`flows`] - Pipe flow snapshots (candidate solutions)
//! - [`table`] - Dense index tables used across the workspace
//! - [`diagnostics`] - Validation issue collection
//! - [`error`] - The [`PoolError`] type

use serde::{Deserialize, Serialize};

pub mod dat;
pub mod diagnostics;
pub mod error;
pub mod flows;
pub mod instance;
pub mod network;
pub mod table;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{PoolError, PoolResult};
pub use flows::PipeFlows;
pub use instance::RawInstance;
pub use network::{Demand, NetworkModel, PipeTable, Pool, Source};
pub use table::{Cube, Table};

// Newtype wrappers for unit indices for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContaminantId(usize);

impl SourceId {
    #[inline]
    pub fn new(value: usize) -> Self {
        SourceId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl PoolId {
    #[inline]
    pub fn new(value: usize) -> Self {
        PoolId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl DemandId {
    #[inline]
    pub fn new(value: usize) -> Self {
        DemandId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl ContaminantId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ContaminantId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Role of a unit in the blending network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRole {
    Source,
    Pool,
    Demand,
}

impl std::fmt::Display for UnitRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitRole::Source => write!(f, "source"),
            UnitRole::Pool => write!(f, "pool"),
            UnitRole::Demand => write!(f, "demand"),
        }
    }
}

/// Unit that can be the tail of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutUnit {
    Source(SourceId),
    Pool(PoolId),
}

/// Unit that can be the head of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InUnit {
    Pool(PoolId),
    Demand(DemandId),
}
