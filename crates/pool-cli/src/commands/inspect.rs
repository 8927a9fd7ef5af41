use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use pool_core::NetworkModel;
use serde::Serialize;
use tabwriter::TabWriter;

use super::load_network;

#[derive(Debug, Serialize)]
struct PipeInfo<'a> {
    from: &'a str,
    to: &'a str,
    capacity: f64,
    cost: f64,
}

fn pipes(network: &NetworkModel) -> Vec<PipeInfo<'_>> {
    let mut rows = Vec::with_capacity(network.num_pipes());
    for from in network.out_units() {
        for to in network.in_units() {
            if network.pipe_exists(from, to) {
                rows.push(PipeInfo {
                    from: network.out_name(from),
                    to: network.in_name(to),
                    capacity: network.pipe_capacity(from, to),
                    cost: network.pipe_cost(from, to),
                });
            }
        }
    }
    rows
}

pub fn handle(instance: &Path, json: bool) -> Result<()> {
    let network = load_network(instance)?;
    let rows = pipes(&network);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{}: {} sources, {} pools, {} demands, {} pipes",
        network.name(),
        network.num_sources(),
        network.num_pools(),
        network.num_demands(),
        rows.len()
    );
    let mut tw = TabWriter::new(io::stdout());
    writeln!(tw, "From\tTo\tCapacity\tCost")?;
    for row in &rows {
        writeln!(tw, "{}\t{}\t{}\t{}", row.from, row.to, row.capacity, row.cost)?;
    }
    tw.flush()?;
    Ok(())
}
