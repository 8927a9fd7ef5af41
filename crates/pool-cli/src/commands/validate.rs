use std::path::Path;

use anyhow::{bail, Context, Result};
use pool_core::instance::load_instance;
use pool_core::network::validate_raw;
use pool_core::NetworkModel;

pub fn handle(instance: &Path) -> Result<()> {
    let raw = load_instance(instance)
        .with_context(|| format!("loading instance {}", instance.display()))?;

    let diag = validate_raw(&raw);
    if diag.warning_count() > 0 || diag.has_errors() {
        print!("{}", diag);
    }
    if diag.has_errors() {
        bail!("{}: {}", instance.display(), diag.summary());
    }

    let network = NetworkModel::from_raw(&raw)?;
    let summary = network.summary();
    println!("Instance {} is valid", summary.name);
    println!("  Sources: {}", summary.sources);
    println!("  Pools: {}", summary.pools);
    println!("  Demands: {}", summary.demands);
    println!("  Contaminants: {}", summary.contaminants);
    println!(
        "  Pipes: {} source-pool, {} source-demand, {} pool-demand",
        summary.source_pool_pipes, summary.source_demand_pipes, summary.pool_demand_pipes
    );
    Ok(())
}
