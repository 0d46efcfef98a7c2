//! Scenario execution engine.

use std::time::Instant;

use serde_json::json;
use syncshim_abi::counters::result_counters;
use syncshim_core::config::runtime_config;

use crate::error::HarnessError;
use crate::report::{CaseResult, ConformanceReport, ConformanceSummary};
use crate::scenarios::{self, SCENARIOS, Scenario};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, now_utc};

/// Runs scenarios and records each one in the structured log.
pub struct ScenarioRunner {
    /// Identifier stamped on the report; also the log's trace prefix.
    pub run_id: String,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// All scenarios, or the single one named by `filter`.
    pub fn select(filter: Option<&str>) -> Result<Vec<&'static Scenario>, HarnessError> {
        match filter {
            None => Ok(SCENARIOS.iter().collect()),
            Some(name) => scenarios::find(name)
                .map(|s| vec![s])
                .ok_or_else(|| HarnessError::UnknownScenario(name.to_string())),
        }
    }

    /// Run `selected` in order, logging a start and end line for each.
    pub fn run(
        &self,
        selected: &[&Scenario],
        emitter: &mut LogEmitter,
    ) -> Result<Vec<CaseResult>, HarnessError> {
        let config = runtime_config();
        emitter.emit_entry(
            LogEntry::new("", LogLevel::Info, "run_start").with_details(json!({
                "backend": syncshim_core::BACKEND,
                "scenarios": selected.len(),
                "thread_stack_size": config.thread_stack_size,
                "thread_name_prefix": config.thread_name_prefix,
            })),
        )?;

        let counters_before = result_counters();
        let mut results = Vec::with_capacity(selected.len());
        for scenario in selected {
            emitter.emit_entry(
                LogEntry::new("", LogLevel::Debug, "scenario_start")
                    .with_scenario(scenario.name)
                    .with_symbol(scenario.symbol),
            )?;

            let calls_before = result_counters();
            let started = Instant::now();
            let check = scenario.run();
            let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            let calls = result_counters().since(&calls_before);

            let passed = check.passed();
            let (level, outcome) = if passed {
                (LogLevel::Info, Outcome::Pass)
            } else {
                (LogLevel::Error, Outcome::Fail)
            };
            emitter.emit_entry(
                LogEntry::new("", level, "scenario_end")
                    .with_scenario(scenario.name)
                    .with_symbol(scenario.symbol)
                    .with_outcome(outcome)
                    .with_result_code(check.result_code)
                    .with_latency_ns(latency_ns)
                    .with_details(json!({
                        "expected": check.expected,
                        "actual": check.actual,
                        "abi_calls": calls.calls,
                        "abi_errors": calls.error,
                        "abi_busy": calls.busy,
                        "abi_timed_out": calls.timed_out,
                    })),
            )?;

            results.push(CaseResult {
                scenario: scenario.name.to_string(),
                symbol: scenario.symbol.to_string(),
                passed,
                expected: check.expected,
                actual: check.actual,
                result_code: check.result_code,
                latency_ns,
            });
        }

        let summary_counters = result_counters().since(&counters_before);
        let failed = results.iter().filter(|r| !r.passed).count();
        let level = if failed == 0 {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        emitter.emit_entry(
            LogEntry::new("", level, "run_end").with_details(json!({
                "total": results.len(),
                "failed": failed,
                "abi_calls": summary_counters.calls,
                "abi_no_mem": summary_counters.no_mem,
            })),
        )?;
        emitter.flush()?;
        Ok(results)
    }

    /// Wrap `results` in a report for this run.
    #[must_use]
    pub fn report(&self, results: Vec<CaseResult>) -> ConformanceReport {
        ConformanceReport {
            title: String::from("syncshim Conformance Report"),
            backend: syncshim_core::BACKEND.to_string(),
            timestamp: now_utc(),
            run_id: self.run_id.clone(),
            summary: ConformanceSummary::from_results(results),
        }
    }
}
