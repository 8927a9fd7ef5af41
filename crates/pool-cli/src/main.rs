use clap::Parser;
use pool_cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }

    let result = match &cli.command {
        Commands::Solve(args) => commands::solve::handle(args),
        Commands::Validate { instance } => commands::validate::handle(instance),
        Commands::Inspect { instance, json } => commands::inspect::handle(instance, *json),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
