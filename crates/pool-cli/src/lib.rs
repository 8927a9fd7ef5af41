pub mod cli;
pub mod output;

pub use cli::{Cli, Commands, SolveArgs};
