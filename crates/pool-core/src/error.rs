//! Unified error type for the pooling workspace
//!
//! [`PoolError`] is what every library crate returns at its API boundary.
//! Solver-specific failures are converted into it by `pool-solver`.
//!
//! # Example
//!
//! ```ignore
//! use pool_core::{PoolError, PoolResult};
//!
//! fn load_and_check(path: &str) -> PoolResult<()> {
//!     let raw = pool_core::instance::load_instance(path)?;
//!     let _network = pool_core::NetworkModel::from_raw(&raw)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all pooling operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Instance parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Instance data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver backend errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Run configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using PoolError.
pub type PoolResult<T> = Result<T, PoolError>;

impl PoolError {
    /// Parse error annotated with the 1-based line it came from.
    pub fn parse_at(line: usize, message: impl std::fmt::Display) -> Self {
        PoolError::Parse(format!("line {}: {}", line, message))
    }
}

impl From<anyhow::Error> for PoolError {
    fn from(err: anyhow::Error) -> Self {
        PoolError::Other(err.to_string())
    }
}

impl From<String> for PoolError {
    fn from(s: String) -> Self {
        PoolError::Other(s)
    }
}

impl From<&str> for PoolError {
    fn from(s: &str) -> Self {
        PoolError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(err: serde_json::Error) -> Self {
        PoolError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoolError::Solver("backend crashed".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("backend crashed"));
    }

    #[test]
    fn test_parse_at_mentions_line() {
        let err = PoolError::parse_at(12, "expected a number");
        assert_eq!(err.to_string(), "Parse error: line 12: expected a number");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PoolError = io_err.into();
        assert!(matches!(err, PoolError::Io(_)));
    }

    #[test]
    fn test_json_error_is_parse() {
        let json_err = serde_json::from_str::<Vec<f64>>("[1, oops]").unwrap_err();
        let err: PoolError = json_err.into();
        assert!(matches!(err, PoolError::Parse(_)));
    }
}
