//! Report, solution and results files written by `solve`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use pool_algo::RunReport;
use serde::Serialize;

/// Column value for the algorithm that produced a run.
const ALGORITHM: &str = "Discretization";

/// One row of the results CSV.
#[derive(Debug, Serialize)]
pub struct ResultRow {
    #[serde(rename = "Instance")]
    pub instance: String,
    #[serde(rename = "Formulation")]
    pub formulation: String,
    #[serde(rename = "Algorithm")]
    pub algorithm: String,
    #[serde(rename = "Disc type")]
    pub disc_type: String,
    #[serde(rename = "Disc variant")]
    pub disc_variant: String,
    #[serde(rename = "Disc size")]
    pub disc_size: usize,
    #[serde(rename = "Iterations")]
    pub iterations: usize,
    #[serde(rename = "Solved")]
    pub solved: String,
    #[serde(rename = "Objective")]
    pub objective: Option<f64>,
    #[serde(rename = "Time")]
    pub time: f64,
}

impl From<&RunReport> for ResultRow {
    fn from(report: &RunReport) -> Self {
        Self {
            instance: report.instance.clone(),
            formulation: report.config.formulation.to_string(),
            algorithm: ALGORITHM.to_string(),
            disc_type: report.config.disc_type.to_string(),
            disc_variant: report.config.variant.to_string(),
            disc_size: report.config.disc_size,
            iterations: report.iterations,
            solved: report.status.to_string(),
            objective: report.objective,
            time: report.elapsed_seconds,
        }
    }
}

pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating report file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("writing report to {}", path.display()))?;
    Ok(())
}

/// Write one `out<TAB>in<TAB>flow` line per positive pipe flow.
pub fn write_solution(report: &RunReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating solution file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for entry in &report.flows {
        writeln!(writer, "{}\t{}\t{}", entry.from, entry.to, entry.flow)
            .context("writing solution line")?;
    }
    writer.flush().context("flushing solution file")?;
    Ok(())
}

/// Append the run to `path`; the header is written only for a new or empty file.
pub fn append_result(report: &RunReport, path: &Path) -> Result<()> {
    let needs_header = std::fs::metadata(path)
        .map(|meta| meta.len() == 0)
        .unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening results file {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer
        .serialize(ResultRow::from(report))
        .context("writing results row")?;
    writer.flush().context("flushing results file")?;
    Ok(())
}
