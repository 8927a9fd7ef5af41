//! Run configuration.
//!
//! A [`RunConfig`] can be read from TOML; unspecified fields keep their
//! defaults, so a file only needs the settings it changes:
//!
//! ```toml
//! formulation = "pq"
//! variant = "pool"
//! disc_size = 4
//! time_limit = 600.0
//! ```

use std::path::Path;
use std::time::Duration;

use pool_core::{Diagnostics, PoolError, PoolResult};
use pool_solver::SolverKind;
use serde::{Deserialize, Serialize};

/// Algebraic form of the pooling problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formulation {
    /// Path flows with source proportions per pool
    Pq,
    /// Total flows with demand proportions per pool
    #[default]
    Tp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscType {
    #[default]
    Adaptive,
    NonIterative,
}

/// Which nonlinear quantity is discretized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscVariant {
    #[default]
    Proportion,
    Flow,
    Pool,
}

impl Formulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Formulation::Pq => "pq",
            Formulation::Tp => "tp",
        }
    }
}

impl DiscType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscType::Adaptive => "adaptive",
            DiscType::NonIterative => "non-iterative",
        }
    }
}

impl DiscVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscVariant::Proportion => "proportion",
            DiscVariant::Flow => "flow",
            DiscVariant::Pool => "pool",
        }
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $what:literal, [$($name:literal => $variant:expr),+ $(,)?]) => {
        impl std::str::FromStr for $ty {
            type Err = PoolError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(PoolError::Config(format!(
                        concat!("unknown ", $what, " '{}'; supported values: {}"),
                        other,
                        [$($name),+].join(", ")
                    ))),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_from_str!(Formulation, "formulation", ["pq" => Formulation::Pq, "tp" => Formulation::Tp]);
impl_from_str!(DiscType, "discretization type", [
    "adaptive" => DiscType::Adaptive,
    "non-iterative" => DiscType::NonIterative,
]);
impl_from_str!(DiscVariant, "discretization variant", [
    "proportion" => DiscVariant::Proportion,
    "flow" => DiscVariant::Flow,
    "pool" => DiscVariant::Pool,
]);

/// Settings of one adaptive discretization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub formulation: Formulation,
    pub disc_type: DiscType,
    pub variant: DiscVariant,
    pub solver: SolverKind,

    /// Breakpoints per discretized entity (slots per pool for the pool variant)
    pub disc_size: usize,

    /// Wall-clock budget of the whole refinement loop, in seconds
    pub time_limit: f64,
    /// Budget of a single MILP solve, in seconds
    pub iteration_limit: f64,
    /// Budget of the resolve check, in seconds
    pub checker_time_limit: f64,

    /// Relative MIP gap passed to the backend
    pub gap: f64,
    pub feasibility_tolerance: f64,
    /// Binary levels at or above `1 - integer_tolerance` count as selected
    pub integer_tolerance: f64,
    pub checker_tolerance: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            formulation: Formulation::default(),
            disc_type: DiscType::default(),
            variant: DiscVariant::default(),
            solver: SolverKind::default(),
            disc_size: 3,
            time_limit: 3600.0,
            iteration_limit: 1200.0,
            checker_time_limit: 60.0,
            gap: 1e-4,
            feasibility_tolerance: 1e-6,
            integer_tolerance: 1e-5,
            checker_tolerance: 1e-4,
        }
    }
}

impl RunConfig {
    /// Load a configuration file; missing fields use the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| PoolError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Iteration budget actually used by the loop.
    ///
    /// Non-iterative runs give their single solve the whole budget.
    pub fn effective_iteration_limit(&self) -> f64 {
        match self.disc_type {
            DiscType::Adaptive => self.iteration_limit,
            DiscType::NonIterative => self.time_limit,
        }
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit.max(0.0))
    }

    pub fn checker_duration(&self) -> Duration {
        Duration::from_secs_f64(self.checker_time_limit.max(0.0))
    }

    /// Check every setting and report all problems at once.
    pub fn validate(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();

        if self.formulation == Formulation::Pq && self.variant != DiscVariant::Pool {
            diag.add_error_with_entity(
                "config",
                &format!(
                    "the pq formulation supports only the pool variant, not '{}'",
                    self.variant
                ),
                "variant",
            );
        }

        let min_size = match self.variant {
            DiscVariant::Pool => 1,
            DiscVariant::Proportion | DiscVariant::Flow => 2,
        };
        if self.disc_size < min_size {
            diag.add_error_with_entity(
                "config",
                &format!(
                    "the {} variant needs a discretization size of at least {}",
                    self.variant, min_size
                ),
                "disc_size",
            );
        }

        for (field, value) in [
            ("time_limit", self.time_limit),
            ("iteration_limit", self.iteration_limit),
            ("checker_time_limit", self.checker_time_limit),
        ] {
            if !(value.is_finite() && value > 0.0) {
                diag.add_error_with_entity("config", "time limit must be positive", field);
            }
        }
        if self.iteration_limit > self.time_limit {
            diag.add_error_with_entity(
                "config",
                "iteration limit cannot exceed the total time limit",
                "iteration_limit",
            );
        }
        if self.time_limit.is_finite() && self.time_limit <= 10.0 {
            diag.add_warning_with_entity(
                "config",
                "total time limit leaves no room for an iteration",
                "time_limit",
            );
        }

        for (field, value) in [
            ("gap", self.gap),
            ("feasibility_tolerance", self.feasibility_tolerance),
            ("integer_tolerance", self.integer_tolerance),
            ("checker_tolerance", self.checker_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                diag.add_error_with_entity("config", "tolerance must be non-negative", field);
            }
        }

        if !self.solver.is_compiled() {
            diag.add_error_with_entity(
                "config",
                &format!(
                    "solver '{}' is not compiled in; available: {}",
                    self.solver,
                    SolverKind::available().join(", ")
                ),
                "solver",
            );
        }

        diag
    }

    /// Fail with a single error listing every problem.
    pub fn ensure_valid(&self) -> PoolResult<()> {
        let diag = self.validate();
        if diag.has_errors() {
            return Err(PoolError::Config(diag.error_messages()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = RunConfig::default();
        assert_eq!(config.formulation, Formulation::Tp);
        assert_eq!(config.variant, DiscVariant::Proportion);
        assert_eq!(config.disc_size, 3);
        assert_eq!(config.time_limit, 3600.0);
        assert_eq!(config.iteration_limit, 1200.0);
        assert_eq!(config.integer_tolerance, 1e-5);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RunConfig = toml::from_str(
            r#"
            formulation = "pq"
            variant = "pool"
            disc_type = "non-iterative"
            disc_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.formulation, Formulation::Pq);
        assert_eq!(config.disc_type, DiscType::NonIterative);
        assert_eq!(config.disc_size, 5);
        assert_eq!(config.gap, 1e-4);
        assert_eq!(config.effective_iteration_limit(), 3600.0);
    }

    #[test]
    fn load_from_reports_path_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "disc_size = \"three\"").unwrap();
        let err = RunConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn validate_collects_every_violation() {
        let config = RunConfig {
            formulation: Formulation::Pq,
            variant: DiscVariant::Flow,
            disc_size: 1,
            iteration_limit: 5000.0,
            feasibility_tolerance: -1.0,
            ..RunConfig::default()
        };
        let diag = config.validate();
        assert_eq!(diag.error_count(), 4);
        let messages = diag.error_messages();
        assert!(messages.contains("pq formulation supports only the pool variant"));
        assert!(messages.contains("at least 2"));
        assert!(messages.contains("iteration limit cannot exceed"));
        assert!(messages.contains("feasibility_tolerance"));
    }

    #[test]
    fn pool_variant_accepts_single_slot() {
        let config = RunConfig {
            variant: DiscVariant::Pool,
            disc_size: 1,
            ..RunConfig::default()
        };
        assert!(!config.validate().has_errors());
    }

    #[test]
    fn short_budget_is_only_a_warning() {
        let config = RunConfig {
            time_limit: 5.0,
            iteration_limit: 5.0,
            ..RunConfig::default()
        };
        let diag = config.validate();
        assert!(!diag.has_errors());
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn enum_names_parse() {
        assert_eq!("TP".parse::<Formulation>().unwrap(), Formulation::Tp);
        assert_eq!(
            "non-iterative".parse::<DiscType>().unwrap(),
            DiscType::NonIterative
        );
        let err = "grid".parse::<DiscVariant>().unwrap_err();
        assert!(err.to_string().contains("proportion, flow, pool"));
    }
}
