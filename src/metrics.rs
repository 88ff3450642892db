/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use regex::Regex;

/// The labels the load generator is required to print. Anything else in its
/// output is ignored.
const RPS_PATTERN: &str = r"RPS: ([\d\.]+)";
const LATENCY_PATTERN: &str = r"Avg Latency \(ms\): ([\d\.]+)";

/// The outcome of one load generator run. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub rps: f64,
    pub avg_latency_ms: f64,
    pub failed: bool,
}

impl RunResult {
    /// A zeroed, flagged result recording a run that produced no usable
    /// metrics (failed to spawn, exited abnormally, or printed nothing
    /// matching the extraction labels).
    pub fn failed() -> Self {
        RunResult {
            rps: 0.0,
            avg_latency_ms: 0.0,
            failed: true,
        }
    }
}

/// Scan the load generator's combined output for the two labelled metric
/// lines. A missing or malformed field zeroes the corresponding value and
/// flags the result; the caller decides whether that voids the sweep (it
/// doesn't, a flagged row is recorded as-is).
pub fn parse_run_output(output: &str) -> RunResult {
    let rps = extract(output, RPS_PATTERN);
    let latency = extract(output, LATENCY_PATTERN);

    RunResult {
        rps: rps.unwrap_or(0.0),
        avg_latency_ms: latency.unwrap_or(0.0),
        failed: rps.is_none() || latency.is_none(),
    }
}

fn extract(output: &str, pattern: &str) -> Option<f64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(output)?.get(1)?.as_str().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_metrics() {
        let output = "Total Requests: 1000\nRPS: 123.45\nAvg Latency (ms): 6.78\n";
        let result = parse_run_output(output);

        assert_eq!(result.rps, 123.45);
        assert_eq!(result.avg_latency_ms, 6.78);
        assert!(!result.failed);
    }

    #[test]
    fn missing_labels_zero_the_result_and_flag_it() {
        let result = parse_run_output("the load generator crashed before reporting\n");

        assert_eq!(result, RunResult::failed());
    }

    #[test]
    fn one_missing_field_still_flags_the_result() {
        let result = parse_run_output("RPS: 99.0\n");

        assert_eq!(result.rps, 99.0);
        assert_eq!(result.avg_latency_ms, 0.0);
        assert!(result.failed);
    }

    #[test]
    fn malformed_number_is_treated_as_missing() {
        let result = parse_run_output("RPS: ...\nAvg Latency (ms): 1.5\n");

        assert_eq!(result.rps, 0.0);
        assert_eq!(result.avg_latency_ms, 1.5);
        assert!(result.failed);
    }

    #[test]
    fn labels_can_appear_anywhere_in_the_output() {
        let output = "noise\nmore noise RPS: 10 trailing\nAvg Latency (ms): 2.5 ok\n";
        let result = parse_run_output(output);

        assert_eq!(result.rps, 10.0);
        assert_eq!(result.avg_latency_ms, 2.5);
        assert!(!result.failed);
    }

    #[test]
    fn extra_metric_lines_are_ignored() {
        let output = "RPS: 500.25\nAvg Latency (ms): 1.20\nP99 Latency (ms): 9.99\n";
        let result = parse_run_output(output);

        assert_eq!(result.rps, 500.25);
        assert_eq!(result.avg_latency_ms, 1.2);
        assert!(!result.failed);
    }
}
