use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};
use pool_algo::{DiscType, DiscVariant, Formulation, RunConfig};
use pool_solver::SolverKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve an instance by adaptive discretization
    Solve(SolveArgs),
    /// Load an instance and report its derived statistics
    Validate {
        /// Instance file (.json or .dat)
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
    },
    /// Print every pipe with its derived capacity and cost
    Inspect {
        /// Instance file (.json or .dat)
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    /// Instance file (.json or .dat)
    #[arg(value_hint = ValueHint::FilePath)]
    pub instance: PathBuf,

    /// TOML run configuration; flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Base formulation (tp, pq)
    #[arg(long)]
    pub formulation: Option<Formulation>,

    /// Discretization type (adaptive, non-iterative)
    #[arg(long)]
    pub disc_type: Option<DiscType>,

    /// Discretization variant (proportion, flow, pool)
    #[arg(long)]
    pub variant: Option<DiscVariant>,

    /// MILP backend (microlp, highs)
    #[arg(long)]
    pub solver: Option<SolverKind>,

    /// Breakpoints or slots per discretized quantity
    #[arg(long)]
    pub disc_size: Option<usize>,

    /// Total time limit in seconds
    #[arg(long)]
    pub time_limit: Option<f64>,

    /// Per-iteration time limit in seconds
    #[arg(long)]
    pub iteration_limit: Option<f64>,

    /// Write the run report as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    /// Write positive pipe flows, one `out<TAB>in<TAB>flow` line each
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub solution: Option<PathBuf>,

    /// Append a row to a results CSV, creating it with a header if needed
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub results: Option<PathBuf>,
}

impl SolveArgs {
    /// Apply the command line overrides on top of `config`.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(formulation) = self.formulation {
            config.formulation = formulation;
        }
        if let Some(disc_type) = self.disc_type {
            config.disc_type = disc_type;
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(solver) = self.solver {
            config.solver = solver;
        }
        if let Some(disc_size) = self.disc_size {
            config.disc_size = disc_size;
        }
        if let Some(time_limit) = self.time_limit {
            config.time_limit = time_limit;
        }
        if let Some(iteration_limit) = self.iteration_limit {
            config.iteration_limit = iteration_limit;
        }
    }
}
