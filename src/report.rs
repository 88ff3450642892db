/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::metrics::RunResult;
use anyhow::Context;
use std::{fs::File, io::Write, path::Path};

/// One row per completed invocation, in the order the invocations were
/// issued. Grows as the sweep progresses and is persisted exactly once,
/// after the sweep completes.
#[derive(Debug, Default)]
pub struct SweepReport {
    entries: Vec<(u32, RunResult)>,
}

impl SweepReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one (level, result) pair, preserving invocation order.
    pub fn record(&mut self, level: u32, result: RunResult) {
        self.entries.push((level, result));
    }

    pub fn entries(&self) -> &[(u32, RunResult)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every recorded row failed metric extraction. An all-zero
    /// report usually means the load generator is misconfigured.
    pub fn all_failed(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|(_, result)| result.failed)
    }

    pub fn header() -> String {
        format!(
            "{:<15} {:<15} {:<20}",
            "Concurrency", "RPS", "Avg Latency (ms)"
        )
    }

    pub fn format_row(level: u32, result: &RunResult) -> String {
        format!(
            "{:<15} {:<15.2} {:<20.2}",
            level, result.rps, result.avg_latency_ms
        )
    }

    /// Fixed-width columnar rendering of the full report, header first. The
    /// output is stable so runs can be diffed against each other.
    pub fn render(&self) -> String {
        let mut lines = vec![Self::header()];
        for (level, result) in &self.entries {
            lines.push(Self::format_row(*level, result));
        }
        lines.join("\n")
    }

    /// Writes the report as CSV, one data row per level in sweep order,
    /// overwriting any previous file at `path`.
    pub fn persist(&self, path: &Path) -> anyhow::Result<()> {
        let mut file =
            File::create(path).context(format!("Failed to create results file {:?}", path))?;

        writeln!(file, "Concurrency,RPS,Avg Latency (ms)")?;
        for (level, result) in &self.entries {
            writeln!(
                file,
                "{},{:.2},{:.2}",
                level, result.rps, result.avg_latency_ms
            )?;
        }

        Ok(())
    }
}
