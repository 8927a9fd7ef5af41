//! Error types for model construction and solver calls.

use pool_core::PoolError;
use thiserror::Error;

/// Errors that can occur while building or solving a model.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Unknown backend name.
    #[error("unknown solver '{name}'; supported values: {supported}")]
    UnknownSolver { name: String, supported: String },

    /// Backend exists but was not compiled into this build.
    #[error("solver '{solver}' is not available; rebuild with the `{feature}` feature")]
    Unavailable {
        solver: &'static str,
        feature: &'static str,
    },

    /// The model itself is malformed (bad bounds, NaN coefficients).
    #[error("invalid model '{model}': {message}")]
    InvalidModel { model: String, message: String },

    /// The backend failed for a reason other than infeasibility.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type alias for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for PoolError {
    fn from(err: SolverError) -> Self {
        PoolError::Solver(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_into_pool_error() {
        let err: PoolError = SolverError::Unavailable {
            solver: "highs",
            feature: "solver-highs",
        }
        .into();
        assert!(matches!(err, PoolError::Solver(_)));
        assert!(err.to_string().contains("solver-highs"));
    }
}
