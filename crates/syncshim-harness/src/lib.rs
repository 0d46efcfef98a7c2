//! Conformance harness for syncshim.
//!
//! This crate provides:
//! - Scenarios: the observable threading contract, driven through the C ABI
//! - Runner: executes scenarios and records each one as structured log lines
//! - Report generation: markdown + JSON conformance reports
//! - Log validation for the JSONL evidence stream

#![deny(unsafe_code)]

pub mod error;
pub mod report;
pub mod runner;
#[allow(unsafe_code)]
pub mod scenarios;
pub mod structured_log;

pub use error::HarnessError;
pub use report::{CaseResult, ConformanceReport, ConformanceSummary};
pub use runner::ScenarioRunner;
pub use scenarios::{SCENARIOS, Scenario};
