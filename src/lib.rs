pub mod clap_args;
pub mod config;
pub mod metrics;
pub mod process_control;
pub mod report;
pub mod sweep_runner;

use anyhow::Context;
use colored::*;
use config::Config;
use report::SweepReport;
use std::{path::Path, time::Duration};
use term_table::{row::Row, table_cell::TableCell, Table, TableStyle};
use tracing::warn;

/// Run the whole pipeline: start the server-under-test, give it its
/// readiness delay, sweep the configured concurrency levels, stop the
/// server, then persist and summarise the report.
///
/// The server handle owns teardown: if the sweep errors or panics, dropping
/// the handle still stops the server. A server spawn failure is the only
/// fatal error; per-level failures are absorbed into the report as zeroed,
/// flagged rows.
pub async fn run(config: &Config) -> anyhow::Result<SweepReport> {
    config.validate()?;

    println!("> starting process {}", config.server.name.green());
    let mut server = process_control::start(&config.server)?;
    server
        .await_ready(Duration::from_secs(config.server.startup_delay))
        .await;

    let report = sweep_runner::run_sweep(&config.benchmark, &config.target).await;

    // Stop the server before persisting; a teardown failure must not
    // discard the collected results.
    if let Err(err) = server.stop() {
        warn!("{}", err);
    }

    if report.all_failed() {
        warn!("Every level in the sweep failed metric extraction; the report is all zeroes");
    }

    report
        .persist(Path::new(&config.benchmark.output))
        .context(format!(
            "Failed to write results to {}",
            config.benchmark.output
        ))?;

    print_summary(&report);
    println!("\nResults saved to {}", config.benchmark.output);

    Ok(report)
}

fn print_summary(report: &SweepReport) {
    println!("\n{}", " Summary ".reversed().green());

    let mut rows = vec![Row::new(vec![
        TableCell::builder("Concurrency".bold()).build(),
        TableCell::builder("RPS".bold()).build(),
        TableCell::builder("Avg Latency (ms)".bold()).build(),
    ])];

    for (level, result) in report.entries() {
        let level = if result.failed {
            format!("{} (failed)", level).red().to_string()
        } else {
            level.to_string()
        };
        rows.push(Row::new(vec![
            TableCell::new(level),
            TableCell::new(format!("{:.2}", result.rps)),
            TableCell::new(format!("{:.2}", result.avg_latency_ms)),
        ]));
    }

    let table = Table::builder().rows(rows).style(TableStyle::rounded()).build();
    println!("{}", table.render());
}
