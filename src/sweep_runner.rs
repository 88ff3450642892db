use crate::{
    config::{Benchmark, Target},
    metrics::{self, RunResult},
    report::SweepReport,
};
use anyhow::Context;
use colored::*;
use tracing::{info, warn};

/// One load generator run: the program plus the positional arguments it is
/// invoked with. Consumed once; only its RunResult outlives it.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkInvocation {
    pub program: String,
    pub host: String,
    pub port: u16,
    pub concurrency: u32,
    pub duration: u64,
}

impl BenchmarkInvocation {
    pub fn new(bench: &Benchmark, target: &Target, concurrency: u32) -> Self {
        BenchmarkInvocation {
            program: bench.command.clone(),
            host: target.host.clone(),
            port: target.port,
            concurrency,
            duration: bench.duration,
        }
    }

    /// The positional argument contract with the load generator:
    /// `<host> <port> <concurrency> <duration-seconds>`.
    fn positional_args(&self) -> [String; 4] {
        [
            self.host.clone(),
            self.port.to_string(),
            self.concurrency.to_string(),
            self.duration.to_string(),
        ]
    }
}

/// Run one invocation to completion and extract its metrics. Blocks for the
/// full duration of the run; the load generator terminates on its own once
/// its duration has elapsed.
async fn run_invocation(invocation: &BenchmarkInvocation) -> anyhow::Result<RunResult> {
    // Split the benchmark command into a vector
    let command_parts = shlex::split(&invocation.program)
        .context("Benchmark command is not POSIX compliant.")?;
    let command = command_parts
        .first()
        .ok_or_else(|| anyhow::anyhow!("Empty benchmark command"))?;
    let args = &command_parts[1..];

    let output = tokio::process::Command::new(command)
        .args(args)
        .args(invocation.positional_args())
        .kill_on_drop(true)
        .output()
        .await
        .context(format!("Failed to run benchmark command {command}"))?;
    info!(
        "Ran benchmark {} at concurrency {}",
        invocation.program, invocation.concurrency
    );

    if !output.status.success() {
        let error_message = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(anyhow::anyhow!(
            "Benchmark run failed: {}. Command: {}",
            error_message,
            invocation.program
        ));
    }

    // The metric lines may land on either stream.
    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(metrics::parse_run_output(&combined))
}

/// Drive the load generator through every configured concurrency level, in
/// input order, one blocking invocation at a time. Levels are never run
/// concurrently with each other: overlapping runs would contend for the same
/// server and the rows of the report would stop being comparable.
///
/// A failed or metric-less invocation becomes a zeroed, flagged row and the
/// sweep moves on; nothing is retried (retrying a load test changes its
/// meaning). Each row is printed as it lands so long sweeps show progress.
pub async fn run_sweep(bench: &Benchmark, target: &Target) -> SweepReport {
    let mut report = SweepReport::new();

    println!("{}", SweepReport::header().bold());

    for &level in &bench.levels {
        info!("Running benchmark with concurrency {}", level);

        let invocation = BenchmarkInvocation::new(bench, target, level);
        let result = match run_invocation(&invocation).await {
            Ok(result) => {
                if result.failed {
                    warn!(
                        "No metrics found in benchmark output at concurrency {}",
                        level
                    );
                }
                result
            }
            Err(err) => {
                warn!("Benchmark run at concurrency {} failed: {}", level, err);
                RunResult::failed()
            }
        };

        println!("{}", SweepReport::format_row(level, &result));
        report.record(level, result);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench(command: &str) -> Benchmark {
        Benchmark {
            command: command.to_string(),
            levels: vec![10],
            duration: 1,
            output: "benchmark_results.csv".to_string(),
        }
    }

    fn target() -> Target {
        Target {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }

    #[test]
    fn invocation_follows_the_positional_argument_contract() {
        let invocation = BenchmarkInvocation::new(&bench("./build/benchmark"), &target(), 50);

        assert_eq!(
            invocation.positional_args(),
            ["127.0.0.1", "8080", "50", "1"]
        );
    }

    #[tokio::test]
    async fn missing_load_generator_yields_an_error() {
        let invocation = BenchmarkInvocation::new(&bench("./does/not/exist"), &target(), 10);

        assert!(run_invocation(&invocation).await.is_err());
    }
}
