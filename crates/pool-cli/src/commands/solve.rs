use anyhow::{bail, Context, Result};
use pool_algo::{run, RunConfig, RunReport};
use pool_cli::output::{append_result, write_report, write_solution};
use pool_cli::SolveArgs;
use tracing::info;

use super::load_network;

fn resolve_config(args: &SolveArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load_from(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    args.apply(&mut config);

    let diag = config.validate();
    if diag.has_errors() {
        bail!("invalid configuration: {}", diag.error_messages());
    }
    Ok(config)
}

fn print_summary(report: &RunReport) {
    println!("Instance: {}", report.instance);
    println!(
        "Scheme: {} {} {} (size {})",
        report.config.formulation,
        report.config.disc_type,
        report.config.variant,
        report.config.disc_size
    );
    println!("Status: {}", report.status);
    match report.objective {
        Some(objective) => println!("Objective: {:.6}", objective),
        None => println!("Objective: none"),
    }
    println!("Iterations: {}", report.iterations);
    println!("Time: {:.3}s", report.elapsed_seconds);
    for message in &report.checker_messages {
        println!("  {}", message);
    }
}

pub fn handle(args: &SolveArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let network = load_network(&args.instance)?;
    info!(summary = ?network.summary(), "instance loaded");

    let report = run(&network, &config).context("solve failed")?;
    print_summary(&report);

    if let Some(path) = &args.out {
        write_report(&report, path)?;
        info!(path = %path.display(), "report written");
    }
    if let Some(path) = &args.solution {
        write_solution(&report, path)?;
        info!(path = %path.display(), "solution written");
    }
    if let Some(path) = &args.results {
        append_result(&report, path)?;
        info!(path = %path.display(), "results row appended");
    }
    Ok(())
}
