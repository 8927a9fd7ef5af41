use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::backend::GoodLpSolver;
use crate::error::{SolverError, SolverResult};
use crate::solver::Solver;

/// Registry of MILP backends.
///
/// Both kinds always parse; [`SolverKind::build_solver`] fails for a backend
/// whose Cargo feature is off so configuration validation can report it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SolverKind {
    #[default]
    Microlp,
    Highs,
}

const KNOWN_SOLVERS: &[&str] = &["microlp", "highs"];

const AVAILABLE_SOLVERS: &[&str] = &[
    #[cfg(feature = "solver-microlp")]
    "microlp",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl SolverKind {
    /// Backends compiled into this build.
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Microlp => "microlp",
            SolverKind::Highs => "highs",
        }
    }

    fn feature(&self) -> &'static str {
        match self {
            SolverKind::Microlp => "solver-microlp",
            SolverKind::Highs => "solver-highs",
        }
    }

    pub fn is_compiled(&self) -> bool {
        Self::available().contains(&self.as_str())
    }

    pub fn build_solver(self) -> SolverResult<Arc<dyn Solver>> {
        if !self.is_compiled() {
            return Err(SolverError::Unavailable {
                solver: self.as_str(),
                feature: self.feature(),
            });
        }
        Ok(Arc::new(GoodLpSolver::new(self)))
    }
}

impl FromStr for SolverKind {
    type Err = SolverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "microlp" | "default" => Ok(SolverKind::Microlp),
            "highs" => Ok(SolverKind::Highs),
            other => Err(SolverError::UnknownSolver {
                name: other.to_string(),
                supported: KNOWN_SOLVERS.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SolverKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SolverKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
